//! In-memory store implementation for testing.
//!
//! Provides the same interface and conflict semantics as the PostgreSQL
//! implementation. Trip state and outbox records live behind a single lock
//! so that a save is trivially atomic across both.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, TripId, Version};
use domain::{Trip, TripRecord};
use tokio::sync::RwLock;

use crate::record::{OutboxRecord, OutboxStatus, RecordId};
use crate::store::{OutboxStore, TripStore};
use crate::{Result, StoreError};

#[derive(Default)]
struct Inner {
    trips: HashMap<TripId, TripRecord>,
    records: Vec<OutboxRecord>,
}

/// In-memory trip and outbox store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of outbox records.
    pub async fn record_count(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Returns all records for one aggregate, oldest first.
    pub async fn records_for_aggregate(&self, aggregate_id: AggregateId) -> Vec<OutboxRecord> {
        self.inner
            .read()
            .await
            .records
            .iter()
            .filter(|r| r.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    /// Clears all trips and records.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.trips.clear();
        inner.records.clear();
    }
}

#[async_trait]
impl TripStore for InMemoryStore {
    async fn load(&self, id: TripId) -> Result<Option<Trip>> {
        let inner = self.inner.read().await;
        Ok(inner.trips.get(&id).cloned().map(Trip::from_record))
    }

    async fn insert(&self, trip: &Trip, records: Vec<OutboxRecord>) -> Result<Version> {
        let mut inner = self.inner.write().await;

        if inner.trips.contains_key(&trip.id()) {
            return Err(StoreError::TripAlreadyExists(trip.id()));
        }

        let new_version = Version::initial().next();
        let mut row = trip.to_record();
        row.version = new_version;
        inner.trips.insert(trip.id(), row);
        inner.records.extend(records);

        Ok(new_version)
    }

    async fn save(&self, trip: &Trip, records: Vec<OutboxRecord>) -> Result<Version> {
        let mut inner = self.inner.write().await;

        let expected = trip.version();
        let actual = match inner.trips.get(&trip.id()) {
            Some(row) => row.version,
            None => return Err(StoreError::TripNotFound(trip.id())),
        };

        if actual != expected {
            return Err(StoreError::ConcurrencyConflict {
                trip_id: trip.id(),
                expected,
                actual,
            });
        }

        let new_version = expected.next();
        let mut row = trip.to_record();
        row.version = new_version;
        inner.trips.insert(trip.id(), row);
        inner.records.extend(records);

        Ok(new_version)
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn claim_batch(&self, limit: usize, lease: Duration) -> Result<Vec<OutboxRecord>> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let lease_until = now + lease;

        let mut claimed = Vec::new();
        for record in inner.records.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if record.is_due(now) {
                record.next_attempt_at = Some(lease_until);
                claimed.push(record.clone());
            }
        }

        Ok(claimed)
    }

    async fn mark_sent(&self, id: RecordId, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RecordNotFound(id))?;
        record.mark_sent(at);
        Ok(())
    }

    async fn schedule_retry(
        &self,
        id: RecordId,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RecordNotFound(id))?;
        record.schedule_retry(error, retry_at);
        Ok(())
    }

    async fn mark_failed(&self, id: RecordId, error: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RecordNotFound(id))?;
        record.mark_failed(error);
        Ok(())
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<OutboxRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().find(|r| r.id == id).cloned())
    }

    async fn count_with_status(&self, status: OutboxStatus) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().filter(|r| r.status == status).count())
    }
}
