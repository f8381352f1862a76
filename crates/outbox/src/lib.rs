//! Transactional outbox and trip persistence boundary.
//!
//! This crate owns the two halves of the outbox pattern's write side:
//! - [`TripStore`]: optimistic-token-checked trip writes that insert the
//!   unit of work's [`OutboxRecord`]s in the same atomic operation
//! - [`OutboxStore`]: claim-and-skip dequeue plus status bookkeeping used
//!   by the dispatcher
//!
//! Two implementations are provided: [`InMemoryStore`] for tests and
//! [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use record::{OutboxRecord, OutboxStatus, RecordId, TraceContext};
pub use store::{OutboxStore, TripStore, drain_to_records};
