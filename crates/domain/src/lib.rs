//! Domain layer for the trip-lifecycle core.
//!
//! This crate provides:
//! - The `Trip` aggregate and its status state machine
//! - Domain events with compile-time-checked aggregate id accessors
//! - The per-unit-of-work `EventContext` buffer
//! - The pure cancellation fee policy
//! - The `Driver` entity used by assignment preconditions

pub mod driver;
pub mod event;
pub mod trip;

pub use driver::{Driver, DriverStatus};
pub use event::{DomainEvent, EventContext};
pub use trip::{
    CancelActor, CancellationFee, FareId, GeoPoint, Money, PaymentId, PaymentStatus, Trip,
    TripError, TripEvent, TripRecord, TripStatus, calculate_fee,
};
