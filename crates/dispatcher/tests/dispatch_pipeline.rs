//! End-to-end delivery pipeline tests over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{PassengerId, TenantId, TripId};
use dispatcher::{
    Dispatcher, DispatcherConfig, ExternalTransport, RetryPolicy, TransportError,
};
use domain::{EventContext, GeoPoint, Trip, TripEvent};
use outbox::{InMemoryStore, OutboxRecord, OutboxStatus, OutboxStore, RecordId, TripStore,
    drain_to_records};
use tokio::sync::Mutex;
use tokio::sync::watch;

/// Transport that records everything it is handed.
#[derive(Default)]
struct RecordingTransport {
    delivered: Mutex<Vec<RecordId>>,
}

impl RecordingTransport {
    async fn delivered(&self) -> Vec<RecordId> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl ExternalTransport for RecordingTransport {
    async fn dispatch(&self, record: &OutboxRecord) -> Result<(), TransportError> {
        self.delivered.lock().await.push(record.id);
        Ok(())
    }
}

/// Transport that rejects the first `failures` calls, then succeeds.
struct FlakyTransport {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyTransport {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalTransport for FlakyTransport {
    async fn dispatch(&self, _record: &OutboxRecord) -> Result<(), TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(TransportError::Unavailable("broker unreachable".into()))
        } else {
            Ok(())
        }
    }
}

/// Transport that never answers within any reasonable timeout.
struct StuckTransport;

#[async_trait]
impl ExternalTransport for StuckTransport {
    async fn dispatch(&self, _record: &OutboxRecord) -> Result<(), TransportError> {
        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        Ok(())
    }
}

async fn store_with_requested_trip(store: &InMemoryStore) -> Trip {
    let mut ctx: EventContext<TripEvent> = EventContext::new();
    let mut trip = Trip::request(
        TripId::new(),
        TenantId::new(),
        PassengerId::new(),
        GeoPoint::new(52.5, 13.4),
        GeoPoint::new(52.6, 13.5),
        Utc::now(),
        &mut ctx,
    );
    let records = drain_to_records(&mut ctx, None).unwrap();
    let version = store.insert(&trip, records).await.unwrap();
    trip.set_version(version);
    trip
}

/// Retry policy whose backoff is immediate, so a retried record is due on
/// the very next cycle.
fn eager_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::zero(),
        max_delay: Duration::zero(),
    }
}

#[tokio::test]
async fn happy_path_delivers_and_marks_sent() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(RecordingTransport::default());
    store_with_requested_trip(&store).await;

    let worker = Dispatcher::new(store.clone(), transport.clone());
    let stats = worker.run_cycle().await.unwrap();

    assert_eq!(stats.sent, 1);
    assert_eq!(stats.retried, 0);
    assert_eq!(transport.delivered().await.len(), 1);
    assert_eq!(
        store.count_with_status(OutboxStatus::Sent).await.unwrap(),
        1
    );
    assert_eq!(
        store
            .count_with_status(OutboxStatus::Pending)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn failed_delivery_is_retried_until_it_succeeds() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(FlakyTransport::new(2));
    store_with_requested_trip(&store).await;

    let config = DispatcherConfig::default().with_retry(eager_retry(5));
    let worker = Dispatcher::with_config(store.clone(), transport.clone(), config);

    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.retried, 1);

    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.retried, 1);

    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.sent, 1);

    assert_eq!(transport.call_count(), 3);
    let sent = store.count_with_status(OutboxStatus::Sent).await.unwrap();
    assert_eq!(sent, 1);
}

#[tokio::test]
async fn retry_budget_exhaustion_dead_letters() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(FlakyTransport::new(usize::MAX));
    let trip = store_with_requested_trip(&store).await;

    let config = DispatcherConfig::default().with_retry(eager_retry(3));
    let worker = Dispatcher::with_config(store.clone(), transport.clone(), config);

    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.retried, 1);
    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.retried, 1);
    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.dead_lettered, 1);

    // Terminal: further cycles see nothing.
    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.processed(), 0);
    assert_eq!(
        store.count_with_status(OutboxStatus::Failed).await.unwrap(),
        1
    );

    let records = store
        .records_for_aggregate(common::AggregateId::from(trip.id()))
        .await;
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].status, OutboxStatus::Failed);
    assert!(records[0].last_error.is_some());
}

#[tokio::test]
async fn timed_out_delivery_counts_as_a_failed_attempt() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(StuckTransport);
    store_with_requested_trip(&store).await;

    let config = DispatcherConfig {
        dispatch_timeout: StdDuration::from_millis(20),
        retry: eager_retry(5),
        ..DispatcherConfig::default()
    };
    let worker = Dispatcher::with_config(store.clone(), transport, config);

    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.retried, 1);
}

#[tokio::test]
async fn run_drains_and_stops_on_shutdown() {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(RecordingTransport::default());
    store_with_requested_trip(&store).await;
    store_with_requested_trip(&store).await;

    let config = DispatcherConfig::default()
        .with_poll_interval(StdDuration::from_millis(10));
    let worker = Dispatcher::with_config(store.clone(), transport.clone(), config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    tokio::time::sleep(StdDuration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();

    handle.await.unwrap().unwrap();
    assert_eq!(
        store.count_with_status(OutboxStatus::Sent).await.unwrap(),
        2
    );
}
