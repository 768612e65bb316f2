//! Cross-service messaging: a broker abstraction with at-least-once,
//! manually acknowledged delivery, two backends, and the consumer loop that
//! drives handlers from it.

pub mod broker;
pub mod config;
pub mod consumer;
pub mod memory;
pub mod message;
pub mod redis_stream;

pub use broker::{BrokerError, BrokerResult, MessageBroker, Subscription};
pub use config::BrokerConfig;
pub use consumer::{
    Ack, ConsumerSnapshot, ConsumerState, EventConsumer, MessageHandler,
    PermanentFailure, ShutdownReport,
};
pub use memory::MemoryBroker;
pub use message::{Delivery, DeliveryTag, Envelope, InboundMessage};
pub use redis_stream::RedisStreamBroker;
