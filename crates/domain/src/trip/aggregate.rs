//! Trip aggregate implementation.

use chrono::{DateTime, Utc};
use common::{DriverId, PassengerId, TenantId, TripId, Version};
use serde::{Deserialize, Serialize};

use crate::event::EventContext;

use super::{
    CancelActor, CancellationFee, FareId, GeoPoint, PaymentId, PaymentStatus, TripError, TripEvent,
    TripStatus, calculate_fee,
    events::{
        DriverAssignedData, TripCancelledData, TripCompletedData, TripRequestedData,
        TripStartedData,
    },
};

/// Trip aggregate root.
///
/// Holds the full lifecycle of a ride from request to completion or
/// cancellation. All invariants are enforced through the transition
/// methods; the aggregate itself performs no I/O. Every transition records
/// exactly one domain event into the [`EventContext`] of the current unit
/// of work.
///
/// The `version` field is the optimistic concurrency token. The aggregate
/// never advances it; the store does, on each successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    /// Unique trip identifier.
    id: TripId,

    /// Tenant the trip belongs to.
    tenant_id: TenantId,

    /// The requesting passenger.
    passenger_id: PassengerId,

    /// The assigned driver, empty until assignment.
    driver_id: Option<DriverId>,

    /// Pickup location.
    origin: GeoPoint,

    /// Drop-off location.
    destination: GeoPoint,

    /// Current lifecycle status.
    status: TripStatus,

    /// When the trip was requested.
    requested_at: DateTime<Utc>,

    /// When a driver was assigned.
    assigned_at: Option<DateTime<Utc>>,

    /// When the passenger boarded.
    started_at: Option<DateTime<Utc>>,

    /// When the trip finished.
    completed_at: Option<DateTime<Utc>>,

    /// Fare reference, set on completion.
    fare_id: Option<FareId>,

    /// Payment reference, set on completion.
    payment_id: Option<PaymentId>,

    /// Payment status, set on completion.
    payment_status: Option<PaymentStatus>,

    /// Optimistic concurrency token, owned by the store.
    #[serde(default)]
    version: Version,
}

// Query methods
impl Trip {
    /// Returns the trip id.
    pub fn id(&self) -> TripId {
        self.id
    }

    /// Returns the tenant id.
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the passenger id.
    pub fn passenger_id(&self) -> PassengerId {
        self.passenger_id
    }

    /// Returns the assigned driver, if any.
    pub fn driver_id(&self) -> Option<DriverId> {
        self.driver_id
    }

    /// Returns the pickup location.
    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Returns the drop-off location.
    pub fn destination(&self) -> GeoPoint {
        self.destination
    }

    /// Returns the current status.
    pub fn status(&self) -> TripStatus {
        self.status
    }

    /// Returns when the trip was requested.
    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// Returns when a driver was assigned, if one was.
    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    /// Returns when the trip started, if it did.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the trip completed, if it did.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the fare reference, if set.
    pub fn fare_id(&self) -> Option<FareId> {
        self.fare_id
    }

    /// Returns the payment reference, if set.
    pub fn payment_id(&self) -> Option<PaymentId> {
        self.payment_id
    }

    /// Returns the payment status, if set.
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.payment_status
    }

    /// Returns the concurrency token the trip was loaded at.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns true if the trip is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Transition methods
impl Trip {
    /// Creates a new trip in `Requested` status and records `TripRequested`.
    pub fn request(
        id: TripId,
        tenant_id: TenantId,
        passenger_id: PassengerId,
        origin: GeoPoint,
        destination: GeoPoint,
        requested_at: DateTime<Utc>,
        events: &mut EventContext<TripEvent>,
    ) -> Self {
        let trip = Self {
            id,
            tenant_id,
            passenger_id,
            driver_id: None,
            origin,
            destination,
            status: TripStatus::Requested,
            requested_at,
            assigned_at: None,
            started_at: None,
            completed_at: None,
            fare_id: None,
            payment_id: None,
            payment_status: None,
            version: Version::initial(),
        };

        events.record(TripEvent::TripRequested(TripRequestedData {
            trip_id: id,
            tenant_id,
            passenger_id,
            origin,
            destination,
            requested_at,
        }));

        trip
    }

    /// Assigns a driver to a `Requested` trip and records `DriverAssigned`.
    ///
    /// A trip has at most one driver; `driver_id` only ever transitions from
    /// empty to set.
    pub fn assign_driver(
        &mut self,
        driver_id: DriverId,
        at: DateTime<Utc>,
        events: &mut EventContext<TripEvent>,
    ) -> Result<(), TripError> {
        if !self.status.can_assign_driver() {
            return Err(TripError::InvalidStateTransition {
                current_status: self.status,
                action: "assign driver",
            });
        }
        if self.driver_id.is_some() {
            return Err(TripError::DriverAlreadyAssigned);
        }

        self.driver_id = Some(driver_id);
        self.assigned_at = Some(at);
        self.status = TripStatus::DriverAssigned;

        events.record(TripEvent::DriverAssigned(DriverAssignedData {
            trip_id: self.id,
            driver_id,
            assigned_at: at,
        }));

        Ok(())
    }

    /// Starts a `DriverAssigned` trip and records `TripStarted`.
    pub fn start(
        &mut self,
        at: DateTime<Utc>,
        events: &mut EventContext<TripEvent>,
    ) -> Result<(), TripError> {
        if !self.status.can_start() {
            return Err(TripError::InvalidStateTransition {
                current_status: self.status,
                action: "start",
            });
        }

        self.started_at = Some(at);
        self.status = TripStatus::InProgress;

        events.record(TripEvent::TripStarted(TripStartedData {
            trip_id: self.id,
            started_at: at,
        }));

        Ok(())
    }

    /// Completes an `InProgress` trip with fare and payment references and
    /// records `TripCompleted`.
    pub fn complete(
        &mut self,
        fare_id: FareId,
        payment_id: PaymentId,
        payment_status: PaymentStatus,
        at: DateTime<Utc>,
        events: &mut EventContext<TripEvent>,
    ) -> Result<(), TripError> {
        if !self.status.can_complete() {
            return Err(TripError::InvalidStateTransition {
                current_status: self.status,
                action: "complete",
            });
        }
        if self.driver_id.is_none() {
            return Err(TripError::NoDriverAssigned);
        }
        if self.started_at.is_none() {
            return Err(TripError::NotStarted);
        }

        self.fare_id = Some(fare_id);
        self.payment_id = Some(payment_id);
        self.payment_status = Some(payment_status);
        self.completed_at = Some(at);
        self.status = TripStatus::Completed;

        events.record(TripEvent::TripCompleted(TripCompletedData {
            trip_id: self.id,
            fare_id,
            payment_id,
            completed_at: at,
        }));

        Ok(())
    }

    /// Cancels a trip and records `TripCancelled`.
    ///
    /// Only reachable from `Requested` and `DriverAssigned`. The fee is
    /// computed by the cancellation policy against the pre-cancellation
    /// state and embedded in the event; a previously assigned driver is
    /// released.
    pub fn cancel(
        &mut self,
        actor: CancelActor,
        reason: impl Into<String>,
        at: DateTime<Utc>,
        events: &mut EventContext<TripEvent>,
    ) -> Result<CancellationFee, TripError> {
        if !self.status.can_cancel() {
            return Err(TripError::InvalidStateTransition {
                current_status: self.status,
                action: "cancel",
            });
        }

        let fee = calculate_fee(self, actor, at);
        let released_driver_id = self.driver_id.take();
        self.status = TripStatus::Cancelled;

        events.record(TripEvent::TripCancelled(TripCancelledData {
            trip_id: self.id,
            actor,
            reason: reason.into(),
            cancelled_at: at,
            fee: fee.clone(),
            released_driver_id,
        }));

        Ok(fee)
    }
}

// Store-facing reconstruction
impl Trip {
    /// Rebuilds a trip from a flat record, as loaded by a store.
    pub fn from_record(record: TripRecord) -> Self {
        Self {
            id: record.id,
            tenant_id: record.tenant_id,
            passenger_id: record.passenger_id,
            driver_id: record.driver_id,
            origin: record.origin,
            destination: record.destination,
            status: record.status,
            requested_at: record.requested_at,
            assigned_at: record.assigned_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            fare_id: record.fare_id,
            payment_id: record.payment_id,
            payment_status: record.payment_status,
            version: record.version,
        }
    }

    /// Returns the trip as a flat record, for a store to persist.
    pub fn to_record(&self) -> TripRecord {
        TripRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            passenger_id: self.passenger_id,
            driver_id: self.driver_id,
            origin: self.origin,
            destination: self.destination,
            status: self.status,
            requested_at: self.requested_at,
            assigned_at: self.assigned_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            fare_id: self.fare_id,
            payment_id: self.payment_id,
            payment_status: self.payment_status,
            version: self.version,
        }
    }

    /// Sets the concurrency token. Called by stores after load/save.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

/// Flat row shape of a trip, used at the persistence boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: TripId,
    pub tenant_id: TenantId,
    pub passenger_id: PassengerId,
    pub driver_id: Option<DriverId>,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub status: TripStatus,
    pub requested_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub fare_id: Option<FareId>,
    pub payment_id: Option<PaymentId>,
    pub payment_status: Option<PaymentStatus>,
    pub version: Version,
}
