//! Shared types used across the ride-hailing core.

pub mod types;

pub use types::{AggregateId, DriverId, PassengerId, TenantId, TripId, Version};
