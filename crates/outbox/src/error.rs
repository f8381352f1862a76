use common::{TripId, Version};
use thiserror::Error;

use crate::record::RecordId;

/// Errors that can occur at the persistence boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The optimistic token check failed: another writer advanced the trip
    /// between our load and our save.
    #[error("concurrency conflict for trip {trip_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        trip_id: TripId,
        expected: Version,
        actual: Version,
    },

    /// The trip row does not exist.
    #[error("trip not found: {0}")]
    TripNotFound(TripId),

    /// A trip with this id already exists.
    #[error("trip already exists: {0}")]
    TripAlreadyExists(TripId),

    /// The outbox record does not exist.
    #[error("outbox record not found: {0}")]
    RecordNotFound(RecordId),

    /// A stored column could not be mapped back to a domain value.
    #[error("invalid stored value: {0}")]
    InvalidColumn(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An event body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
