//! Long-lived subscriber that feeds broker deliveries to a handler.
//!
//! Lifecycle:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Subscribed -> Consuming <-> HandlerError
//!       ^                                                                    |
//!       +---------------------------- disconnect() --------------------------+
//! ```
//!
//! Each subscribed topic gets one task that handles one message at a time.
//! A delivery is acked only after its handler returned `Ok`. Bodies that
//! are not JSON and handler failures are both rejected without requeue.

use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    broker::{BrokerError, BrokerResult, MessageBroker, Subscription},
    message::{Delivery, InboundMessage},
};

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Successful handling; the delivery will be acked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Handling failed and must not be retried; the delivery is dropped.
#[derive(Debug, thiserror::Error)]
pub enum PermanentFailure {
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Handler failed: {0}")]
    Handler(String),
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self, message: InboundMessage,
    ) -> Result<Ack, PermanentFailure>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Consuming,
    HandlerError,
}

#[derive(Default)]
pub struct ConsumerMetrics {
    pub received: AtomicU64,
    pub acked: AtomicU64,
    pub discarded_malformed: AtomicU64,
    pub discarded_failed: AtomicU64,
    pub broker_errors: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSnapshot {
    pub received: u64,
    pub acked: u64,
    pub discarded_malformed: u64,
    pub discarded_failed: u64,
    pub broker_errors: u64,
}

impl ConsumerMetrics {
    pub fn snapshot(&self) -> ConsumerSnapshot {
        ConsumerSnapshot {
            received: self.received.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            discarded_malformed: self
                .discarded_malformed
                .load(Ordering::Relaxed),
            discarded_failed: self.discarded_failed.load(Ordering::Relaxed),
            broker_errors: self.broker_errors.load(Ordering::Relaxed),
        }
    }
}

/// What a graceful stop had to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stopped: usize,
    pub aborted: usize,
}

pub struct EventConsumer {
    broker: Arc<dyn MessageBroker>,
    state: Arc<watch::Sender<ConsumerState>>,
    metrics: Arc<ConsumerMetrics>,
    stop: watch::Sender<bool>,
    workers: Vec<(String, JoinHandle<()>)>,
    grace: Duration,
}

impl EventConsumer {
    pub fn new(broker: Arc<dyn MessageBroker>, grace: Duration) -> Self {
        let (state, _) = watch::channel(ConsumerState::Disconnected);
        let (stop, _) = watch::channel(false);
        Self {
            broker,
            state: Arc::new(state),
            metrics: Arc::new(ConsumerMetrics::default()),
            stop,
            workers: Vec::new(),
            grace,
        }
    }

    pub fn state(&self) -> ConsumerState { *self.state.borrow() }

    /// Receiver for observing state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> ConsumerSnapshot { self.metrics.snapshot() }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|(topic, _)| topic.as_str())
    }

    /// Fails fast when the broker is unreachable; retrying is the caller's
    /// decision (see [`BrokerError::is_retryable`]).
    #[instrument(skip(self))]
    pub async fn connect(&mut self) -> BrokerResult<()> {
        self.state.send_replace(ConsumerState::Connecting);
        match self.broker.connect().await {
            Ok(()) => {
                // re-arm after a previous disconnect without waking workers
                self.stop.send_if_modified(|stop| std::mem::replace(stop, false));
                self.state.send_replace(ConsumerState::Connected);
                info!("Connected to broker");
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(ConsumerState::Disconnected);
                warn!(error = %e, "Broker connection failed");
                Err(e)
            }
        }
    }

    #[instrument(skip(self, handler))]
    pub async fn subscribe(
        &mut self, topic: &str, handler: Arc<dyn MessageHandler>,
    ) -> BrokerResult<()> {
        if self.state() == ConsumerState::Disconnected
            || self.state() == ConsumerState::Connecting
        {
            return Err(BrokerError::NotConnected);
        }
        let subscription = self.broker.subscribe(topic).await?;

        let worker = Worker {
            subscription,
            handler,
            state: self.state.clone(),
            metrics: self.metrics.clone(),
        };
        let stop = self.stop.subscribe();
        let handle = tokio::spawn(worker.run(stop));
        self.workers.push((topic.to_string(), handle));

        if self.state() == ConsumerState::Connected {
            self.state.send_replace(ConsumerState::Subscribed);
        }
        info!("Subscribed");
        Ok(())
    }

    /// Signals every worker to stop after its in-flight message, waits up
    /// to the grace period, then aborts whatever is still running.
    #[instrument(skip(self))]
    pub async fn disconnect(&mut self) -> ShutdownReport {
        self.stop.send_replace(true);
        let deadline = tokio::time::Instant::now() + self.grace;
        let mut report = ShutdownReport::default();

        for (topic, mut handle) in self.workers.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => report.stopped += 1,
                Err(_) => {
                    warn!(topic = %topic, "Grace period elapsed, aborting consumer");
                    handle.abort();
                    report.aborted += 1;
                }
            }
        }

        self.state.send_replace(ConsumerState::Disconnected);
        info!(
            stopped = report.stopped,
            aborted = report.aborted,
            "Disconnected from broker"
        );
        report
    }
}

struct Worker {
    subscription: Box<dyn Subscription>,
    handler: Arc<dyn MessageHandler>,
    state: Arc<watch::Sender<ConsumerState>>,
    metrics: Arc<ConsumerMetrics>,
}

impl Worker {
    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let topic = self.subscription.topic().to_string();
        loop {
            if *stop.borrow() {
                break;
            }
            let next = tokio::select! {
                biased;
                _ = stop.changed() => break,
                next = self.subscription.next() => next,
            };

            match next {
                Ok(Some(delivery)) => self.process(delivery).await,
                Ok(None) => {
                    debug!(topic = %topic, "Subscription closed by broker");
                    break;
                }
                Err(e) => {
                    self.metrics.broker_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(topic = %topic, error = %e, "Failed to receive message");
                    tokio::select! {
                        _ = stop.changed() => break,
                        _ = tokio::time::sleep(RETRY_BACKOFF) => {}
                    }
                }
            }
        }

        if let Err(e) = self.subscription.close().await {
            warn!(topic = %topic, error = %e, "Failed to close subscription");
        }
    }

    #[instrument(skip_all, fields(topic = %delivery.topic, tag = %delivery.tag))]
    async fn process(&mut self, delivery: Delivery) {
        self.metrics.received.fetch_add(1, Ordering::Relaxed);

        let payload = match serde_json::from_slice(&delivery.body) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Discarding message that is not valid JSON");
                self.settle(&delivery, false).await;
                self.metrics
                    .discarded_malformed
                    .fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        self.state.send_replace(ConsumerState::Consuming);
        let message = InboundMessage {
            topic: delivery.topic.clone(),
            tag: delivery.tag.clone(),
            payload,
            redelivered: delivery.redelivered,
        };
        let outcome = AssertUnwindSafe(self.handler.handle(message))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(PermanentFailure::Handler("handler panicked".into()))
            });

        match outcome {
            Ok(Ack) => {
                self.settle(&delivery, true).await;
                self.metrics.acked.fetch_add(1, Ordering::Relaxed);
            }
            Err(failure) => {
                error!(error = %failure, "Discarding message");
                let metrics = self.metrics.clone();
                let counter = match failure {
                    PermanentFailure::Malformed(_) => {
                        &metrics.discarded_malformed
                    }
                    PermanentFailure::Handler(_) => {
                        self.state.send_replace(ConsumerState::HandlerError);
                        &metrics.discarded_failed
                    }
                };
                self.settle(&delivery, false).await;
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn settle(&mut self, delivery: &Delivery, ack: bool) {
        let result = if ack {
            self.subscription.ack(delivery).await
        }
        else {
            self.subscription.reject(delivery, false).await
        };
        if let Err(e) = result {
            // the broker will redeliver it; handlers are idempotent
            self.metrics.broker_errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, ack, "Failed to settle delivery");
        }
    }
}
