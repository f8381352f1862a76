use outbox::StoreError;
use thiserror::Error;

/// Errors surfaced by a delivery attempt against the external transport.
///
/// Transport errors are per-record: they cost the record an attempt but
/// never abort the batch.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport refused the record.
    #[error("transport rejected record: {0}")]
    Rejected(String),

    /// The transport could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort a dispatcher cycle.
///
/// Only bookkeeping failures land here. A record that cannot be delivered
/// is retried or dead-lettered, not propagated.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The outbox store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
