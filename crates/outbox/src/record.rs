//! The durable event envelope written alongside every aggregate mutation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::DomainEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an outbox record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a record ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery status of an outbox record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Written but not yet delivered; eligible for claiming once
    /// `next_attempt_at` has passed (or is unset).
    Pending,

    /// Delivered to the external transport (terminal).
    Sent,

    /// Retry budget exhausted; requires out-of-band remediation (terminal).
    Failed,
}

impl OutboxStatus {
    /// Returns the stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Sent => "sent",
            OutboxStatus::Failed => "failed",
        }
    }

    /// Parses the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxStatus::Pending),
            "sent" => Some(OutboxStatus::Sent),
            "failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Correlation fields propagated from the operation that raised the event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// Trace identifier of the originating request.
    pub trace_id: Option<String>,

    /// Span identifier of the originating request.
    pub span_id: Option<String>,
}

impl TraceContext {
    /// Creates a trace context with both fields set.
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            span_id: Some(span_id.into()),
        }
    }
}

/// A durable event record awaiting delivery.
///
/// Created `Pending` with zero attempts in the same atomic unit as the
/// aggregate mutation it describes. Transitions to `Sent` on delivery
/// (idempotently re-markable) or, after the retry budget is exhausted, to
/// `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Unique record identifier.
    pub id: RecordId,

    /// The aggregate the event concerns.
    pub aggregate_id: AggregateId,

    /// Event type tag, e.g. "DriverAssigned".
    pub event_type: String,

    /// Serialized event body.
    pub payload: serde_json::Value,

    /// Current delivery status.
    pub status: OutboxStatus,

    /// Number of delivery attempts made so far.
    pub attempts: i32,

    /// When the record next becomes eligible for claiming. `None` or a
    /// time at or before now means immediately eligible.
    pub next_attempt_at: Option<DateTime<Utc>>,

    /// When the record was written.
    pub created_at: DateTime<Utc>,

    /// When the record was delivered, set once.
    pub sent_at: Option<DateTime<Utc>>,

    /// Last delivery error, if any attempt failed.
    pub last_error: Option<String>,

    /// Trace correlation id of the originating operation.
    pub trace_id: Option<String>,

    /// Span correlation id of the originating operation.
    pub span_id: Option<String>,
}

impl OutboxRecord {
    /// Builds a pending record from a domain event.
    ///
    /// Serializes the event body; a serialization failure here must abort
    /// the whole unit of work, so the error is returned rather than
    /// producing a partial record.
    pub fn from_event<E: DomainEvent>(
        event: &E,
        trace: Option<&TraceContext>,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_value(event)?;
        Ok(Self {
            id: RecordId::new(),
            aggregate_id: event.aggregate_id(),
            event_type: event.event_type().to_string(),
            payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            next_attempt_at: None,
            created_at: Utc::now(),
            sent_at: None,
            last_error: None,
            trace_id: trace.and_then(|t| t.trace_id.clone()),
            span_id: trace.and_then(|t| t.span_id.clone()),
        })
    }

    /// Marks the record delivered.
    ///
    /// Idempotent: re-marking an already-sent record neither errors nor
    /// moves `sent_at`.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        if self.status == OutboxStatus::Sent {
            return;
        }
        self.status = OutboxStatus::Sent;
        self.sent_at = Some(at);
        self.next_attempt_at = None;
    }

    /// Records a failed attempt that will be retried at `retry_at`.
    pub fn schedule_retry(&mut self, error: impl Into<String>, retry_at: DateTime<Utc>) {
        self.attempts += 1;
        self.next_attempt_at = Some(retry_at);
        self.last_error = Some(error.into());
    }

    /// Records a failed attempt that exhausted the retry budget.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.status = OutboxStatus::Failed;
        self.next_attempt_at = None;
        self.last_error = Some(error.into());
    }

    /// Returns true if the record is eligible for claiming at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending
            && self.next_attempt_at.is_none_or(|at| at <= now)
    }
}
