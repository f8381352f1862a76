//! Trip aggregate and related types.

mod aggregate;
mod events;
mod policy;
mod state;
mod value_objects;

pub use aggregate::{Trip, TripRecord};
pub use events::{
    DriverAssignedData, TripCancelledData, TripCompletedData, TripEvent, TripRequestedData,
    TripStartedData,
};
pub use policy::{
    ASSIGNED_CANCELLATION_FEE, ASSIGNED_FREE_WINDOW_SECS, REQUESTED_CANCELLATION_FEE,
    REQUESTED_FREE_WINDOW_SECS, calculate_fee,
};
pub use state::TripStatus;
pub use value_objects::{
    CancelActor, CancellationFee, FareId, GeoPoint, Money, PaymentId, PaymentStatus,
};

use thiserror::Error;

/// Errors that can occur during trip operations.
///
/// These are caller errors: the operation was attempted against a trip that
/// is not in the required status. They are never retried.
#[derive(Debug, Error)]
pub enum TripError {
    /// Trip is not in the expected status for this operation.
    #[error("invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: TripStatus,
        action: &'static str,
    },

    /// A driver is already assigned to the trip.
    #[error("trip already has an assigned driver")]
    DriverAlreadyAssigned,

    /// Completion requires an assigned driver.
    #[error("trip has no assigned driver")]
    NoDriverAssigned,

    /// Completion requires the trip to have been started.
    #[error("trip was never started")]
    NotStarted,
}
