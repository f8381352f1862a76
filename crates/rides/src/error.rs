use common::{DriverId, TripId};
use domain::TripError;
use outbox::StoreError;
use thiserror::Error;

/// Errors surfaced by the trip lifecycle services.
#[derive(Debug, Error)]
pub enum RideError {
    /// The trip does not exist.
    #[error("trip not found: {0}")]
    TripNotFound(TripId),

    /// The driver does not exist.
    #[error("driver not found: {0}")]
    DriverNotFound(DriverId),

    /// The driver cannot take rides right now.
    #[error("driver {driver_id} unavailable: {reason}")]
    DriverUnavailable {
        driver_id: DriverId,
        reason: &'static str,
    },

    /// Another driver won the assignment race for this trip.
    #[error("trip {0} already has a driver assigned")]
    AlreadyAssigned(TripId),

    /// The trip refused the transition.
    #[error(transparent)]
    Trip(#[from] TripError),

    /// The persistence layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for ride operations.
pub type Result<T> = std::result::Result<T, RideError>;
