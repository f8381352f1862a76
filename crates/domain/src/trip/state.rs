//! Trip status state machine.

use serde::{Deserialize, Serialize};

/// The status of a trip in its lifecycle.
///
/// Status transitions:
/// ```text
/// Requested ──► DriverAssigned ──► InProgress ──► Completed
///     │               │
///     └───────────────┴──► Cancelled
/// ```
///
/// Transitions are strictly forward; cancellation is only reachable from
/// `Requested` and `DriverAssigned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TripStatus {
    /// Trip has been requested by a passenger, no driver yet.
    #[default]
    Requested,

    /// A driver accepted the trip and is on the way.
    DriverAssigned,

    /// The passenger is on board.
    InProgress,

    /// The trip finished and fare/payment references are set (terminal).
    Completed,

    /// The trip was cancelled before starting (terminal).
    Cancelled,
}

impl TripStatus {
    /// Returns true if a driver can be assigned in this status.
    pub fn can_assign_driver(&self) -> bool {
        matches!(self, TripStatus::Requested)
    }

    /// Returns true if the trip can start in this status.
    pub fn can_start(&self) -> bool {
        matches!(self, TripStatus::DriverAssigned)
    }

    /// Returns true if the trip can be completed in this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, TripStatus::InProgress)
    }

    /// Returns true if the trip can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, TripStatus::Requested | TripStatus::DriverAssigned)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TripStatus::Requested => "Requested",
            TripStatus::DriverAssigned => "DriverAssigned",
            TripStatus::InProgress => "InProgress",
            TripStatus::Completed => "Completed",
            TripStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", s)
    }
}
