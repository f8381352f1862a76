//! Persistence boundary traits and the outbox writer.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{TripId, Version};
use domain::{DomainEvent, EventContext, Trip};

use crate::record::{OutboxRecord, OutboxStatus, RecordId, TraceContext};
use crate::{Result, StoreError};

/// Drains an event context into pending outbox records.
///
/// Every event is serialized before any storage call is made, so a
/// serialization failure aborts the whole unit of work with nothing
/// persisted. This is the writer half of the outbox pattern; the atomic
/// insert itself happens inside [`TripStore::save`]/[`TripStore::insert`].
pub fn drain_to_records<E: DomainEvent>(
    events: &mut EventContext<E>,
    trace: Option<&TraceContext>,
) -> Result<Vec<OutboxRecord>> {
    events
        .drain()
        .iter()
        .map(|event| OutboxRecord::from_event(event, trace).map_err(StoreError::Serialization))
        .collect()
}

/// Storage boundary for the trip aggregate.
///
/// Implementations must guarantee that a save is atomic across the trip
/// row and all outbox records: either the new trip state and every record
/// are durable, or none of them are.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Loads a trip by id, including its current concurrency token.
    async fn load(&self, id: TripId) -> Result<Option<Trip>>;

    /// Inserts a brand-new trip together with its outbox records.
    ///
    /// Fails with [`StoreError::TripAlreadyExists`] if the row is present.
    /// Returns the version the row was written at.
    async fn insert(&self, trip: &Trip, records: Vec<OutboxRecord>) -> Result<Version>;

    /// Saves a mutated trip together with its outbox records.
    ///
    /// The trip's own `version` is the expected token: the write fails with
    /// [`StoreError::ConcurrencyConflict`] if the row has moved past it,
    /// and with [`StoreError::TripNotFound`] if the row is gone. Returns
    /// the advanced version on success.
    async fn save(&self, trip: &Trip, records: Vec<OutboxRecord>) -> Result<Version>;
}

/// Storage boundary for the outbox delivery side.
///
/// Claiming uses claim-and-skip semantics: a batch claim leases the
/// returned records by pushing `next_attempt_at` past now, so concurrent
/// workers observe disjoint batches without blocking on each other. A
/// worker that crashes mid-batch simply lets its lease expire, after which
/// the records become claimable again (at-least-once delivery).
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Claims up to `limit` due pending records, leasing them for `lease`.
    ///
    /// Records are returned oldest first, with their pre-claim attempt
    /// counts.
    async fn claim_batch(&self, limit: usize, lease: Duration) -> Result<Vec<OutboxRecord>>;

    /// Marks a record delivered at `at`.
    ///
    /// Idempotent: marking an already-sent record succeeds without moving
    /// `sent_at`.
    async fn mark_sent(&self, id: RecordId, at: DateTime<Utc>) -> Result<()>;

    /// Records a failed attempt and schedules the next one.
    ///
    /// Increments the attempt counter, stores the error, and makes the
    /// record claimable again at `retry_at`.
    async fn schedule_retry(
        &self,
        id: RecordId,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Records a final failed attempt and dead-letters the record.
    ///
    /// The record becomes terminal `Failed` and is never again returned by
    /// [`OutboxStore::claim_batch`].
    async fn mark_failed(&self, id: RecordId, error: &str) -> Result<()>;

    /// Fetches a single record by id.
    async fn get_record(&self, id: RecordId) -> Result<Option<OutboxRecord>>;

    /// Counts records with the given status.
    async fn count_with_status(&self, status: OutboxStatus) -> Result<usize>;
}
