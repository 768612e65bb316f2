use async_trait::async_trait;
use bytes::Bytes;

use crate::message::Delivery;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached. Worth retrying later.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),
    #[error("Consumer is not connected")]
    NotConnected,
    #[error("Subscription to {topic} is closed")]
    Closed { topic: String },
    #[error("Unknown delivery {tag} on {topic}")]
    UnknownDelivery { topic: String, tag: String },
    #[error("Broker error: {0}")]
    Other(String),
}

impl BrokerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::Unavailable(_))
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// At-least-once message broker with durable per-topic queues and manual
/// acknowledgment.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Verifies the broker is reachable.
    async fn connect(&self) -> BrokerResult<()>;

    /// Declares the durable queue for `topic` (if needed) and attaches to it.
    async fn subscribe(&self, topic: &str) -> BrokerResult<Box<dyn Subscription>>;

    async fn publish(&self, topic: &str, body: Bytes) -> BrokerResult<()>;
}

#[async_trait]
pub trait Subscription: Send {
    fn topic(&self) -> &str;

    /// Waits for the next delivery. `None` once the subscription can never
    /// yield again. Dropping the future must not lose a message.
    async fn next(&mut self) -> BrokerResult<Option<Delivery>>;

    async fn ack(&mut self, delivery: &Delivery) -> BrokerResult<()>;

    /// Negative acknowledgment. With `requeue == false` the message is
    /// dropped for good.
    async fn reject(
        &mut self, delivery: &Delivery, requeue: bool,
    ) -> BrokerResult<()>;

    async fn close(&mut self) -> BrokerResult<()>;
}
