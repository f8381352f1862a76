//! Driver entity used by the assignment preconditions.

use common::DriverId;
use serde::{Deserialize, Serialize};

use crate::trip::GeoPoint;

/// Availability status of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DriverStatus {
    /// Online and free to take a ride.
    #[default]
    Available,

    /// Currently serving a trip.
    Busy,

    /// Not accepting rides.
    Offline,
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DriverStatus::Available => "Available",
            DriverStatus::Busy => "Busy",
            DriverStatus::Offline => "Offline",
        };
        write!(f, "{}", s)
    }
}

/// A driver as seen by the assignment flow.
///
/// Assignment requires the driver to be active, located, and credentialed;
/// `availability_problem` reports the first failing precondition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    id: DriverId,
    status: DriverStatus,
    location: Option<GeoPoint>,
    license_valid: bool,
}

impl Driver {
    /// Creates a driver with the given availability attributes.
    pub fn new(
        id: DriverId,
        status: DriverStatus,
        location: Option<GeoPoint>,
        license_valid: bool,
    ) -> Self {
        Self {
            id,
            status,
            location,
            license_valid,
        }
    }

    /// Creates a driver that qualifies for assignment.
    pub fn available_at(id: DriverId, location: GeoPoint) -> Self {
        Self::new(id, DriverStatus::Available, Some(location), true)
    }

    /// Returns the driver id.
    pub fn id(&self) -> DriverId {
        self.id
    }

    /// Returns the availability status.
    pub fn status(&self) -> DriverStatus {
        self.status
    }

    /// Returns the last known location, if any.
    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    /// Returns true if the driver qualifies for assignment.
    pub fn is_available_for_rides(&self) -> bool {
        self.availability_problem().is_none()
    }

    /// Returns the first failing assignment precondition, if any.
    pub fn availability_problem(&self) -> Option<&'static str> {
        if self.status != DriverStatus::Available {
            return Some("driver is not available");
        }
        if self.location.is_none() {
            return Some("driver has no known location");
        }
        if !self.license_valid {
            return Some("driver credentials are invalid");
        }
        None
    }

    /// Marks the driver busy for the duration of a trip.
    pub fn mark_busy(&mut self) {
        self.status = DriverStatus::Busy;
    }

    /// Returns the driver to the available pool.
    pub fn mark_available(&mut self) {
        self.status = DriverStatus::Available;
    }
}
