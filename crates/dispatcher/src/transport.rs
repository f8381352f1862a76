//! The outbound delivery boundary.

use async_trait::async_trait;
use outbox::OutboxRecord;

use crate::error::TransportError;

/// Downstream system the dispatcher delivers records to, such as a message
/// broker or a webhook endpoint.
///
/// Implementations should be idempotent on the record id: the dispatcher
/// guarantees at-least-once delivery, so the same record may arrive more
/// than once after a crash or an expired claim lease.
#[async_trait]
pub trait ExternalTransport: Send + Sync {
    /// Delivers one record.
    async fn dispatch(&self, record: &OutboxRecord) -> Result<(), TransportError>;
}
