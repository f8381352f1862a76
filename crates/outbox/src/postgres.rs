//! PostgreSQL-backed store implementation.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, DriverId, PassengerId, TenantId, TripId, Version};
use domain::{FareId, GeoPoint, PaymentId, PaymentStatus, Trip, TripRecord, TripStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use async_trait::async_trait;

use crate::record::{OutboxRecord, OutboxStatus, RecordId};
use crate::store::{OutboxStore, TripStore};
use crate::{Result, StoreError};

/// PostgreSQL-backed trip and outbox store.
///
/// Saves write the trip row and its outbox records inside one transaction,
/// so the aggregate mutation and the events describing it commit or roll
/// back together. Claiming uses `FOR UPDATE SKIP LOCKED` so concurrent
/// dispatcher workers take disjoint batches.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_trip(row: PgRow) -> Result<TripRecord> {
        let status: String = row.try_get("status")?;
        let payment_status: Option<String> = row.try_get("payment_status")?;

        Ok(TripRecord {
            id: TripId::from_uuid(row.try_get::<Uuid, _>("id")?),
            tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
            passenger_id: PassengerId::from_uuid(row.try_get::<Uuid, _>("passenger_id")?),
            driver_id: row
                .try_get::<Option<Uuid>, _>("driver_id")?
                .map(DriverId::from_uuid),
            origin: GeoPoint::new(row.try_get("origin_lat")?, row.try_get("origin_lon")?),
            destination: GeoPoint::new(
                row.try_get("destination_lat")?,
                row.try_get("destination_lon")?,
            ),
            status: parse_trip_status(&status)?,
            requested_at: row.try_get("requested_at")?,
            assigned_at: row.try_get("assigned_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            fare_id: row
                .try_get::<Option<Uuid>, _>("fare_id")?
                .map(FareId::from_uuid),
            payment_id: row
                .try_get::<Option<Uuid>, _>("payment_id")?
                .map(PaymentId::from_uuid),
            payment_status: payment_status
                .as_deref()
                .map(parse_payment_status)
                .transpose()?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn row_to_record(row: PgRow) -> Result<OutboxRecord> {
        let status: String = row.try_get("status")?;

        Ok(OutboxRecord {
            id: RecordId::from_uuid(row.try_get::<Uuid, _>("id")?),
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            status: OutboxStatus::parse(&status)
                .ok_or_else(|| StoreError::InvalidColumn(format!("outbox status: {status}")))?,
            attempts: row.try_get("attempts")?,
            next_attempt_at: row.try_get("next_attempt_at")?,
            created_at: row.try_get("created_at")?,
            sent_at: row.try_get("sent_at")?,
            last_error: row.try_get("last_error")?,
            trace_id: row.try_get("trace_id")?,
            span_id: row.try_get("span_id")?,
        })
    }

    async fn insert_records(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        records: &[OutboxRecord],
    ) -> Result<()> {
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO outbox_records
                    (id, aggregate_id, event_type, payload, status, attempts,
                     next_attempt_at, created_at, sent_at, last_error, trace_id, span_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(record.id.as_uuid())
            .bind(record.aggregate_id.as_uuid())
            .bind(&record.event_type)
            .bind(&record.payload)
            .bind(record.status.as_str())
            .bind(record.attempts)
            .bind(record.next_attempt_at)
            .bind(record.created_at)
            .bind(record.sent_at)
            .bind(&record.last_error)
            .bind(&record.trace_id)
            .bind(&record.span_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

fn parse_trip_status(s: &str) -> Result<TripStatus> {
    match s {
        "Requested" => Ok(TripStatus::Requested),
        "DriverAssigned" => Ok(TripStatus::DriverAssigned),
        "InProgress" => Ok(TripStatus::InProgress),
        "Completed" => Ok(TripStatus::Completed),
        "Cancelled" => Ok(TripStatus::Cancelled),
        other => Err(StoreError::InvalidColumn(format!("trip status: {other}"))),
    }
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
    match s {
        "Pending" => Ok(PaymentStatus::Pending),
        "Captured" => Ok(PaymentStatus::Captured),
        "Failed" => Ok(PaymentStatus::Failed),
        other => Err(StoreError::InvalidColumn(format!(
            "payment status: {other}"
        ))),
    }
}

const TRIP_COLUMNS: &str = "id, tenant_id, passenger_id, driver_id, \
    origin_lat, origin_lon, destination_lat, destination_lon, status, \
    requested_at, assigned_at, started_at, completed_at, \
    fare_id, payment_id, payment_status, version";

const RECORD_COLUMNS: &str = "id, aggregate_id, event_type, payload, status, attempts, \
    next_attempt_at, created_at, sent_at, last_error, trace_id, span_id";

#[async_trait]
impl TripStore for PostgresStore {
    async fn load(&self, id: TripId) -> Result<Option<Trip>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(Trip::from_record(Self::row_to_trip(row)?))),
            None => Ok(None),
        }
    }

    async fn insert(&self, trip: &Trip, records: Vec<OutboxRecord>) -> Result<Version> {
        let record = trip.to_record();
        let new_version = Version::initial().next();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO trips
                (id, tenant_id, passenger_id, driver_id,
                 origin_lat, origin_lon, destination_lat, destination_lon, status,
                 requested_at, assigned_at, started_at, completed_at,
                 fare_id, payment_id, payment_status, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.tenant_id.as_uuid())
        .bind(record.passenger_id.as_uuid())
        .bind(record.driver_id.map(|d| d.as_uuid()))
        .bind(record.origin.lat)
        .bind(record.origin.lon)
        .bind(record.destination.lat)
        .bind(record.destination.lon)
        .bind(record.status.to_string())
        .bind(record.requested_at)
        .bind(record.assigned_at)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(record.fare_id.map(|f| f.as_uuid()))
        .bind(record.payment_id.map(|p| p.as_uuid()))
        .bind(record.payment_status.map(|s| s.to_string()))
        .bind(new_version.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::TripAlreadyExists(trip.id());
            }
            StoreError::Database(e)
        })?;

        Self::insert_records(&mut tx, &records).await?;

        tx.commit().await?;
        Ok(new_version)
    }

    async fn save(&self, trip: &Trip, records: Vec<OutboxRecord>) -> Result<Version> {
        let record = trip.to_record();
        let expected = trip.version();
        let new_version = expected.next();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE trips SET
                driver_id = $3,
                status = $4,
                assigned_at = $5,
                started_at = $6,
                completed_at = $7,
                fare_id = $8,
                payment_id = $9,
                payment_status = $10,
                version = $11
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(expected.as_i64())
        .bind(record.driver_id.map(|d| d.as_uuid()))
        .bind(record.status.to_string())
        .bind(record.assigned_at)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(record.fare_id.map(|f| f.as_uuid()))
        .bind(record.payment_id.map(|p| p.as_uuid()))
        .bind(record.payment_status.map(|s| s.to_string()))
        .bind(new_version.as_i64())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a lost race from a missing row.
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM trips WHERE id = $1")
                .bind(record.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

            return match actual {
                Some(actual) => Err(StoreError::ConcurrencyConflict {
                    trip_id: trip.id(),
                    expected,
                    actual: Version::new(actual),
                }),
                None => Err(StoreError::TripNotFound(trip.id())),
            };
        }

        Self::insert_records(&mut tx, &records).await?;

        tx.commit().await?;
        Ok(new_version)
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn claim_batch(&self, limit: usize, lease: Duration) -> Result<Vec<OutboxRecord>> {
        let now = Utc::now();
        let lease_until = now + lease;

        // The lease is the claim: pushing next_attempt_at forward makes the
        // rows invisible to other workers until it expires, while the
        // RETURNING clause hands back the pre-claim attempt counts.
        let rows = sqlx::query(
            r#"
            WITH due AS (
                SELECT id FROM outbox_records
                WHERE status = 'pending'
                  AND (next_attempt_at IS NULL OR next_attempt_at <= $1)
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE outbox_records o
            SET next_attempt_at = $3
            FROM due
            WHERE o.id = due.id
            RETURNING o.id, o.aggregate_id, o.event_type, o.payload, o.status, o.attempts,
                      o.next_attempt_at, o.created_at, o.sent_at, o.last_error, o.trace_id, o.span_id
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .bind(lease_until)
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<OutboxRecord> = rows
            .into_iter()
            .map(Self::row_to_record)
            .collect::<Result<_>>()?;

        // UPDATE ... FROM does not preserve the CTE's ordering.
        records.sort_by_key(|r| r.created_at);

        Ok(records)
    }

    async fn mark_sent(&self, id: RecordId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_records
            SET status = 'sent',
                sent_at = COALESCE(sent_at, $2),
                next_attempt_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn schedule_retry(
        &self,
        id: RecordId,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_records
            SET attempts = attempts + 1,
                next_attempt_at = $2,
                last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(retry_at)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: RecordId, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_records
            SET status = 'failed',
                attempts = attempts + 1,
                next_attempt_at = NULL,
                last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<OutboxRecord>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM outbox_records WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn count_with_status(&self, status: OutboxStatus) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox_records WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count as usize)
    }
}
