//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and require a running
//! Docker daemon, so they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p outbox --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{DriverId, PassengerId, TenantId, TripId, Version};
use domain::{EventContext, GeoPoint, Trip, TripStatus};
use outbox::{
    OutboxStatus, OutboxStore, PostgresStore, StoreError, TripStore, drain_to_records,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE trips, outbox_records")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn request_trip(ctx: &mut EventContext<domain::TripEvent>) -> Trip {
    Trip::request(
        TripId::new(),
        TenantId::new(),
        PassengerId::new(),
        GeoPoint::new(52.5, 13.4),
        GeoPoint::new(52.6, 13.5),
        Utc::now(),
        ctx,
    )
}

async fn insert_trip(store: &PostgresStore) -> Trip {
    let mut ctx = EventContext::new();
    let mut trip = request_trip(&mut ctx);
    let records = drain_to_records(&mut ctx, None).unwrap();
    let version = store.insert(&trip, records).await.unwrap();
    trip.set_version(version);
    trip
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn insert_and_load_roundtrip() {
    let store = get_test_store().await;
    let trip = insert_trip(&store).await;

    let loaded = store.load(trip.id()).await.unwrap().unwrap();
    assert_eq!(loaded.id(), trip.id());
    assert_eq!(loaded.status(), TripStatus::Requested);
    assert_eq!(loaded.version(), Version::new(1));
    assert_eq!(loaded.origin(), trip.origin());

    let pending = store
        .count_with_status(OutboxStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn insert_duplicate_id_fails() {
    let store = get_test_store().await;
    let trip = insert_trip(&store).await;

    let result = store.insert(&trip, vec![]).await;
    assert!(matches!(result, Err(StoreError::TripAlreadyExists(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn stale_save_conflicts_and_writes_nothing() {
    let store = get_test_store().await;
    let trip = insert_trip(&store).await;

    let mut winner = store.load(trip.id()).await.unwrap().unwrap();
    let mut loser = store.load(trip.id()).await.unwrap().unwrap();

    let mut ctx = EventContext::new();
    winner
        .assign_driver(DriverId::new(), Utc::now(), &mut ctx)
        .unwrap();
    store
        .save(&winner, drain_to_records(&mut ctx, None).unwrap())
        .await
        .unwrap();

    let mut ctx = EventContext::new();
    loser
        .assign_driver(DriverId::new(), Utc::now(), &mut ctx)
        .unwrap();
    let result = store
        .save(&loser, drain_to_records(&mut ctx, None).unwrap())
        .await;

    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { expected, actual, .. })
            if expected == Version::new(1) && actual == Version::new(2)
    ));

    // Only the winner's DriverAssigned record landed next to TripRequested.
    let pending = store
        .count_with_status(OutboxStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending, 2);

    let stored = store.load(trip.id()).await.unwrap().unwrap();
    assert_eq!(stored.driver_id(), winner.driver_id());
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn save_missing_trip_reports_not_found() {
    let store = get_test_store().await;
    let mut ctx = EventContext::new();
    let trip = request_trip(&mut ctx);

    let result = store.save(&trip, vec![]).await;
    assert!(matches!(result, Err(StoreError::TripNotFound(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn claim_leases_records_until_expiry() {
    let store = get_test_store().await;
    insert_trip(&store).await;

    let first = store.claim_batch(10, Duration::seconds(30)).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].attempts, 0);

    let second = store.claim_batch(10, Duration::seconds(30)).await.unwrap();
    assert!(second.is_empty());

    // An expired lease makes the record claimable again.
    store
        .schedule_retry(first[0].id, "worker crashed", Utc::now() - Duration::seconds(1))
        .await
        .unwrap();
    let third = store.claim_batch(10, Duration::seconds(30)).await.unwrap();
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].attempts, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn claim_returns_oldest_first_up_to_limit() {
    let store = get_test_store().await;
    for _ in 0..5 {
        insert_trip(&store).await;
    }

    let claimed = store.claim_batch(3, Duration::seconds(30)).await.unwrap();
    assert_eq!(claimed.len(), 3);
    assert!(claimed.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn mark_sent_is_idempotent() {
    let store = get_test_store().await;
    insert_trip(&store).await;
    let record = store.claim_batch(1, Duration::seconds(30)).await.unwrap()[0].clone();

    let first = Utc::now();
    store.mark_sent(record.id, first).await.unwrap();
    store
        .mark_sent(record.id, first + Duration::seconds(60))
        .await
        .unwrap();

    let stored = store.get_record(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Sent);
    let sent_at = stored.sent_at.unwrap();
    assert!((sent_at - first).num_milliseconds().abs() < 5);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn failed_record_leaves_the_claim_pool() {
    let store = get_test_store().await;
    insert_trip(&store).await;
    let record = store.claim_batch(1, Duration::seconds(30)).await.unwrap()[0].clone();

    store.mark_failed(record.id, "retry budget exhausted").await.unwrap();

    let stored = store.get_record(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Failed);
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.last_error.as_deref(), Some("retry budget exhausted"));

    store
        .schedule_retry(record.id, "should not matter", Utc::now() - Duration::seconds(1))
        .await
        .unwrap();
    // Status stays failed, so the claim scan still skips it.
    let claimed = store.claim_batch(10, Duration::seconds(30)).await.unwrap();
    assert!(claimed.is_empty());
}
