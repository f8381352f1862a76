//! Background delivery of outbox records to an external transport.
//!
//! The [`Dispatcher`] polls the outbox for due pending records, hands each
//! to an [`ExternalTransport`], and books the outcome back: `Sent` on
//! success, a scheduled retry with exponential backoff on failure, and a
//! terminal `Failed` once the retry budget is exhausted. Delivery is
//! at-least-once; downstream consumers must deduplicate by record id.

pub mod dispatcher;
pub mod error;
pub mod retry;
pub mod transport;

pub use dispatcher::{CycleStats, Dispatcher, DispatcherConfig};
pub use error::{DispatchError, TransportError};
pub use retry::RetryPolicy;
pub use transport::ExternalTransport;
