//! Outbox delivery worker dispatching committed events to consumers.
//!
//! The worker is the only mutator of outbox rows after insertion. Each pass
//! atomically claims a batch of due pending events, routes every event to
//! the consumer registered for its type, and applies the resulting state
//! transition: `delivered` on success, `pending` with an exponential-backoff
//! eligibility time on failure, `dead_letter` once the retry budget is
//! exhausted, or `failed` when no consumer is registered for the type.
//!
//! Delivery is at-least-once: a consumer may see an event again after a
//! partial failure, so consumers must be idempotent on the event id.

mod config;

pub use config::{
    DELIVERY_BACKOFF_FACTOR_ENV, DELIVERY_BASE_DELAY_SECS_ENV, DELIVERY_BATCH_SIZE_ENV,
    DELIVERY_CAP_DELAY_SECS_ENV, DELIVERY_POLL_INTERVAL_SECS_ENV, DeliveryConfig,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{DeliveryMetrics, EventConsumer, OutboxRepository};
use crate::domain::{Error, EventType, OutboxEvent};

/// Async clock-independent sleeping abstraction for the poll pause.
#[async_trait]
pub trait DeliverySleeper: Send + Sync {
    /// Suspend execution for `duration`.
    ///
    /// ```rust,no_run
    /// use async_trait::async_trait;
    /// use backend::domain::delivery::DeliverySleeper;
    /// use std::sync::{Arc, Mutex};
    /// use std::time::Duration;
    /// #[derive(Default)]
    /// struct CountingSleeper {
    ///     calls: Arc<Mutex<u32>>,
    /// }
    /// #[async_trait]
    /// impl DeliverySleeper for CountingSleeper {
    ///     async fn sleep(&self, _duration: Duration) {
    ///         *self.calls.lock().expect("calls mutex") += 1;
    ///     }
    /// }
    /// # async fn demo() {
    /// let sleeper = CountingSleeper::default();
    /// sleeper.sleep(Duration::from_millis(25)).await;
    /// assert_eq!(*sleeper.calls.lock().expect("calls mutex"), 1);
    /// # }
    /// ```
    async fn sleep(&self, duration: Duration);
}

/// Tokio-based sleeper used in production wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl DeliverySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Port bundle required by the delivery worker.
pub struct DeliveryWorkerPorts {
    /// Outbox persistence adapter.
    pub repository: Arc<dyn OutboxRepository>,
    /// Delivery metrics adapter.
    pub metrics: Arc<dyn DeliveryMetrics>,
}

impl DeliveryWorkerPorts {
    /// Build a strongly-typed worker port bundle.
    pub fn new(repository: Arc<dyn OutboxRepository>, metrics: Arc<dyn DeliveryMetrics>) -> Self {
        Self {
            repository,
            metrics,
        }
    }
}

/// Counters describing a single delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryPass {
    /// Events claimed from the outbox this pass.
    pub claimed: usize,
    /// Events acknowledged by their consumer.
    pub delivered: usize,
    /// Events rescheduled with backoff.
    pub retried: usize,
    /// Events parked after exhausting their retry budget.
    pub dead_lettered: usize,
    /// Events parked because no consumer is registered for their type.
    pub unroutable: usize,
}

/// Background worker draining the outbox to registered consumers.
pub struct DeliveryWorker {
    repository: Arc<dyn OutboxRepository>,
    metrics: Arc<dyn DeliveryMetrics>,
    consumers: HashMap<EventType, Arc<dyn EventConsumer>>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn DeliverySleeper>,
    config: DeliveryConfig,
}

impl DeliveryWorker {
    /// Build a worker using the tokio sleeper.
    /// ```rust,ignore
    /// let _worker = DeliveryWorker::new(ports, clock, config);
    /// ```
    pub fn new(ports: DeliveryWorkerPorts, clock: Arc<dyn Clock>, config: DeliveryConfig) -> Self {
        Self::with_sleeper(ports, clock, Arc::new(TokioSleeper), config)
    }

    /// Build a worker with an injected sleeper.
    /// ```rust,ignore
    /// let _worker = DeliveryWorker::with_sleeper(ports, clock, sleeper, config);
    /// ```
    pub fn with_sleeper(
        ports: DeliveryWorkerPorts,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn DeliverySleeper>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            repository: ports.repository,
            metrics: ports.metrics,
            consumers: HashMap::new(),
            clock,
            sleeper,
            config,
        }
    }

    /// Register the consumer responsible for an event type.
    ///
    /// Re-registering a type replaces the previous consumer. Events whose
    /// type has no registration are parked as `failed` rather than burning
    /// their retry budget.
    #[must_use]
    pub fn register(mut self, event_type: EventType, consumer: Arc<dyn EventConsumer>) -> Self {
        self.consumers.insert(event_type, consumer);
        self
    }

    /// Run the poll loop until the task is dropped.
    ///
    /// Pass failures are logged and absorbed; the loop always reaches the
    /// next poll.
    pub async fn run(&self) {
        info!(
            poll_interval_secs = self.config.poll_interval().as_secs(),
            batch_size = self.config.batch_size(),
            "outbox delivery worker started"
        );
        loop {
            match self.process_batch().await {
                Ok(pass) if pass.claimed > 0 => {
                    debug!(
                        claimed = pass.claimed,
                        delivered = pass.delivered,
                        retried = pass.retried,
                        dead_lettered = pass.dead_lettered,
                        unroutable = pass.unroutable,
                        "delivery pass complete"
                    );
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(%error, "delivery pass failed; retrying next poll");
                }
            }
            self.sleeper.sleep(self.config.poll_interval()).await;
        }
    }

    /// Claim and dispatch one batch of due events.
    ///
    /// Claimed events are already marked `processing`, so two workers never
    /// dispatch the same event concurrently. Per-event transition failures
    /// are logged and absorbed; only the claim itself can fail the pass.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the outbox claim query fails.
    pub async fn process_batch(&self) -> Result<DeliveryPass, Error> {
        let now = self.clock.utc();
        let events = self
            .repository
            .claim_due(now, self.config.batch_size())
            .await
            .map_err(|error| Error::internal(format!("outbox claim failed: {error}")))?;

        let mut pass = DeliveryPass {
            claimed: events.len(),
            ..DeliveryPass::default()
        };
        for event in events {
            self.dispatch(&event, &mut pass).await;
        }
        Ok(pass)
    }

    async fn dispatch(&self, event: &OutboxEvent, pass: &mut DeliveryPass) {
        let Some(consumer) = self.consumers.get(&event.event_type) else {
            self.park_unroutable(event, pass).await;
            return;
        };

        match consumer.consume(event).await {
            Ok(()) => self.settle_delivered(event, pass).await,
            Err(error) => self.settle_failure(event, &error.to_string(), pass).await,
        }
    }

    async fn settle_delivered(&self, event: &OutboxEvent, pass: &mut DeliveryPass) {
        let processed_at = self.clock.utc();
        match self.repository.mark_delivered(event.id, processed_at).await {
            Ok(()) => {
                pass.delivered += 1;
                self.record_delivered().await;
                debug!(event_id = %event.id, event_type = %event.event_type.as_str(), "event delivered");
            }
            Err(error) => {
                // The row stays `processing`; operators spot it via the
                // stuck-row age rather than a retry storm.
                warn!(event_id = %event.id, %error, "failed to mark event delivered");
            }
        }
    }

    async fn settle_failure(&self, event: &OutboxEvent, reason: &str, pass: &mut DeliveryPass) {
        if event.exhausts_budget_on_failure() {
            match self.repository.mark_dead_letter(event.id, reason).await {
                Ok(()) => {
                    pass.dead_lettered += 1;
                    self.record_dead_lettered().await;
                    error!(
                        event_id = %event.id,
                        event_type = %event.event_type.as_str(),
                        retry_count = event.retry_count,
                        reason,
                        "event dead-lettered after exhausting its retry budget"
                    );
                }
                Err(error) => {
                    warn!(event_id = %event.id, %error, "failed to dead-letter event");
                }
            }
            return;
        }

        let retry_count = event.retry_count.saturating_add(1);
        let next_retry_at = self.next_retry_at(event.retry_count);
        match self
            .repository
            .mark_retry(event.id, retry_count, next_retry_at, reason)
            .await
        {
            Ok(()) => {
                pass.retried += 1;
                self.record_retried().await;
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type.as_str(),
                    retry_count,
                    next_retry_at = %next_retry_at,
                    reason,
                    "event delivery failed; rescheduled"
                );
            }
            Err(error) => {
                warn!(event_id = %event.id, %error, "failed to reschedule event");
            }
        }
    }

    async fn park_unroutable(&self, event: &OutboxEvent, pass: &mut DeliveryPass) {
        let reason = format!(
            "no consumer registered for event type {}",
            event.event_type.as_str()
        );
        match self.repository.mark_failed(event.id, &reason).await {
            Ok(()) => {
                pass.unroutable += 1;
                self.record_unroutable().await;
                error!(event_id = %event.id, event_type = %event.event_type.as_str(), "event unroutable");
            }
            Err(error) => {
                warn!(event_id = %event.id, %error, "failed to park unroutable event");
            }
        }
    }

    fn next_retry_at(&self, retry_count: i32) -> DateTime<Utc> {
        let delay = self.config.backoff_delay(retry_count);
        let delay_secs = i64::try_from(delay.as_secs()).unwrap_or(i64::MAX);
        self.clock.utc() + chrono::Duration::seconds(delay_secs)
    }

    // Metrics exporter errors never affect delivery throughput.
    async fn record_delivered(&self) {
        let _ = self.metrics.record_delivered().await;
    }

    async fn record_retried(&self) {
        let _ = self.metrics.record_retried().await;
    }

    async fn record_dead_lettered(&self) {
        let _ = self.metrics.record_dead_lettered().await;
    }

    async fn record_unroutable(&self) {
        let _ = self.metrics.record_unroutable().await;
    }
}
