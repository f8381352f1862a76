//! Application services for the trip lifecycle.
//!
//! [`TripService`] drives the non-contended lifecycle operations (request,
//! start, complete, cancel) and [`AssignmentCoordinator`] arbitrates the
//! one genuinely contended operation: several drivers racing to accept the
//! same trip. Every mutation goes through the transactional outbox, so the
//! events describing it are persisted atomically with the trip row.

pub mod coordinator;
pub mod drivers;
pub mod error;
pub mod service;

pub use coordinator::AssignmentCoordinator;
pub use drivers::{DriverAvailabilityQuery, DriverStore, InMemoryDriverStore};
pub use error::{Result, RideError};
pub use service::TripService;
