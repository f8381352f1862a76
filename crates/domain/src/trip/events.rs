//! Trip domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, DriverId, PassengerId, TenantId, TripId};
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

use super::{CancelActor, CancellationFee, FareId, GeoPoint, PaymentId};

/// Events that can occur on a trip aggregate.
///
/// Every variant's data struct carries the `trip_id` it concerns, so the
/// aggregate id of an event is always a typed field access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TripEvent {
    /// A passenger requested a trip.
    TripRequested(TripRequestedData),

    /// A driver accepted the trip.
    DriverAssigned(DriverAssignedData),

    /// The passenger boarded and the trip started.
    TripStarted(TripStartedData),

    /// The trip finished with fare and payment references.
    TripCompleted(TripCompletedData),

    /// The trip was cancelled before starting.
    TripCancelled(TripCancelledData),
}

impl DomainEvent for TripEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TripEvent::TripRequested(_) => "TripRequested",
            TripEvent::DriverAssigned(_) => "DriverAssigned",
            TripEvent::TripStarted(_) => "TripStarted",
            TripEvent::TripCompleted(_) => "TripCompleted",
            TripEvent::TripCancelled(_) => "TripCancelled",
        }
    }

    fn aggregate_id(&self) -> AggregateId {
        let trip_id = match self {
            TripEvent::TripRequested(data) => data.trip_id,
            TripEvent::DriverAssigned(data) => data.trip_id,
            TripEvent::TripStarted(data) => data.trip_id,
            TripEvent::TripCompleted(data) => data.trip_id,
            TripEvent::TripCancelled(data) => data.trip_id,
        };
        AggregateId::from(trip_id)
    }
}

/// Data for the TripRequested event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequestedData {
    /// The trip this event concerns.
    pub trip_id: TripId,

    /// Tenant the trip belongs to.
    pub tenant_id: TenantId,

    /// The requesting passenger.
    pub passenger_id: PassengerId,

    /// Pickup location.
    pub origin: GeoPoint,

    /// Drop-off location.
    pub destination: GeoPoint,

    /// When the trip was requested.
    pub requested_at: DateTime<Utc>,
}

/// Data for the DriverAssigned event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAssignedData {
    /// The trip this event concerns.
    pub trip_id: TripId,

    /// The driver who accepted the trip.
    pub driver_id: DriverId,

    /// When the assignment happened.
    pub assigned_at: DateTime<Utc>,
}

/// Data for the TripStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripStartedData {
    /// The trip this event concerns.
    pub trip_id: TripId,

    /// When the passenger boarded.
    pub started_at: DateTime<Utc>,
}

/// Data for the TripCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripCompletedData {
    /// The trip this event concerns.
    pub trip_id: TripId,

    /// The fare computed for the trip.
    pub fare_id: FareId,

    /// The payment created for the fare.
    pub payment_id: PaymentId,

    /// When the trip completed.
    pub completed_at: DateTime<Utc>,
}

/// Data for the TripCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripCancelledData {
    /// The trip this event concerns.
    pub trip_id: TripId,

    /// Who cancelled.
    pub actor: CancelActor,

    /// Free-form cancellation reason.
    pub reason: String,

    /// When the cancellation happened.
    pub cancelled_at: DateTime<Utc>,

    /// The fee computed by the cancellation policy.
    pub fee: CancellationFee,

    /// The driver released by this cancellation, if one was assigned.
    pub released_driver_id: Option<DriverId>,
}
