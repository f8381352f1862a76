//! The outbox polling loop.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use outbox::{OutboxRecord, OutboxStore};
use tokio::sync::watch;
use tokio::time;

use crate::error::{Result, TransportError};
use crate::retry::RetryPolicy;
use crate::transport::ExternalTransport;

/// Configuration for the dispatcher loop.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How often to poll for due records.
    pub poll_interval: StdDuration,

    /// Maximum records to claim per cycle.
    pub batch_size: usize,

    /// How long a claimed batch stays invisible to other workers. Must
    /// comfortably exceed `batch_size * dispatch_timeout`.
    pub claim_lease: Duration,

    /// Upper bound on a single delivery attempt.
    pub dispatch_timeout: StdDuration,

    /// Retry budget and backoff schedule.
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: StdDuration::from_millis(100),
            batch_size: 100,
            claim_lease: Duration::minutes(5),
            dispatch_timeout: StdDuration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    /// Overrides the poll interval.
    pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Overrides the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Outcome counts for one dispatcher cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Records delivered and marked sent.
    pub sent: usize,

    /// Records that failed and were scheduled for retry.
    pub retried: usize,

    /// Records that exhausted their retry budget.
    pub dead_lettered: usize,
}

impl CycleStats {
    /// Total records processed this cycle.
    pub fn processed(&self) -> usize {
        self.sent + self.retried + self.dead_lettered
    }
}

/// Background worker that drains the outbox into an external transport.
///
/// Multiple dispatchers may run against the same store: claiming leases
/// the batch, so workers observe disjoint records. A worker that dies
/// mid-batch lets its lease expire and another worker picks the records
/// up, which is where the at-least-once guarantee comes from.
pub struct Dispatcher {
    store: Arc<dyn OutboxStore>,
    transport: Arc<dyn ExternalTransport>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Creates a dispatcher with default configuration.
    pub fn new(store: Arc<dyn OutboxStore>, transport: Arc<dyn ExternalTransport>) -> Self {
        Self::with_config(store, transport, DispatcherConfig::default())
    }

    /// Creates a dispatcher with custom configuration.
    pub fn with_config(
        store: Arc<dyn OutboxStore>,
        transport: Arc<dyn ExternalTransport>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// Runs the polling loop until the shutdown signal flips to true.
    ///
    /// Processes one final cycle after the signal so records claimed just
    /// before shutdown are not left to wait out their lease.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut interval = time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.run_cycle().await?;
                        tracing::info!("dispatcher stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    let stats = self.run_cycle().await?;
                    if stats.processed() > 0 {
                        tracing::debug!(
                            sent = stats.sent,
                            retried = stats.retried,
                            dead_lettered = stats.dead_lettered,
                            "dispatch cycle finished"
                        );
                    }
                }
            }
        }
    }

    /// Claims and processes one batch of due records.
    ///
    /// Also the unit tests' entry point, so a single cycle can be driven
    /// without the loop.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let records = self
            .store
            .claim_batch(self.config.batch_size, self.config.claim_lease)
            .await?;

        let mut stats = CycleStats::default();
        for record in records {
            match self.dispatch_one(&record).await? {
                Outcome::Sent => stats.sent += 1,
                Outcome::Retried => stats.retried += 1,
                Outcome::DeadLettered => stats.dead_lettered += 1,
            }
        }

        Ok(stats)
    }

    #[tracing::instrument(
        skip(self, record),
        fields(record_id = %record.id, event_type = %record.event_type)
    )]
    async fn dispatch_one(&self, record: &OutboxRecord) -> Result<Outcome> {
        let started = std::time::Instant::now();
        let attempt = time::timeout(self.config.dispatch_timeout, self.transport.dispatch(record));

        let outcome = match attempt.await {
            Ok(Ok(())) => {
                self.store.mark_sent(record.id, Utc::now()).await?;
                metrics::counter!("dispatcher_records_sent").increment(1);
                tracing::debug!("record delivered");
                Outcome::Sent
            }
            Ok(Err(error)) => self.book_failure(record, &error.to_string()).await?,
            Err(_) => {
                let error = TransportError::Unavailable(format!(
                    "delivery exceeded {:?}",
                    self.config.dispatch_timeout
                ));
                self.book_failure(record, &error.to_string()).await?
            }
        };

        metrics::histogram!("dispatcher_dispatch_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    async fn book_failure(&self, record: &OutboxRecord, error: &str) -> Result<Outcome> {
        // The claim handed us the pre-claim count, so this failure is
        // attempt `attempts + 1`.
        let attempts_made = record.attempts as u32 + 1;

        if self.config.retry.is_exhausted(attempts_made) {
            self.store.mark_failed(record.id, error).await?;
            metrics::counter!("dispatcher_records_dead_lettered").increment(1);
            tracing::error!(attempts = attempts_made, %error, "record dead-lettered");
            return Ok(Outcome::DeadLettered);
        }

        let retry_at = Utc::now() + self.config.retry.backoff(attempts_made);
        self.store.schedule_retry(record.id, error, retry_at).await?;
        metrics::counter!("dispatcher_records_retried").increment(1);
        tracing::warn!(attempts = attempts_made, %retry_at, %error, "delivery failed, retrying");
        Ok(Outcome::Retried)
    }
}

enum Outcome {
    Sent,
    Retried,
    DeadLettered,
}
