//! In-process broker on flume channels.
//!
//! Each topic is one durable queue: messages published before anyone
//! subscribes wait in the channel. A delivery stays in the topic's unacked
//! set until it is acked or rejected; [`MemoryBroker::recover`] pushes every
//! unacked delivery back onto the queue, which is what a broker does when
//! a consumer dies mid-message.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use flume::{Receiver, Sender};
use tracing::debug;

use crate::{
    broker::{BrokerError, BrokerResult, MessageBroker, Subscription},
    message::{Delivery, DeliveryTag},
};

#[derive(Debug, Clone)]
struct QueuedMessage {
    id: u64,
    body: Bytes,
    redelivered: bool,
}

struct TopicQueue {
    tx: Sender<QueuedMessage>,
    rx: Receiver<QueuedMessage>,
    unacked: BTreeMap<u64, QueuedMessage>,
}

impl TopicQueue {
    fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx,
            rx,
            unacked: BTreeMap::new(),
        }
    }

    fn push(&self, message: QueuedMessage) {
        // the queue owns a receiver, so the channel cannot be disconnected
        let _ = self.tx.send(message);
    }
}

struct Inner {
    topics: Mutex<HashMap<String, TopicQueue>>,
    reachable: AtomicBool,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self { Self::new() }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: Mutex::new(HashMap::new()),
                reachable: AtomicBool::new(true),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Simulates the broker going away (or coming back).
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Messages waiting to be delivered.
    pub fn queued(&self, topic: &str) -> usize {
        self.inner
            .topics()
            .ok()
            .and_then(|topics| topics.get(topic).map(|q| q.rx.len()))
            .unwrap_or(0)
    }

    /// Messages delivered but neither acked nor rejected.
    pub fn unacked(&self, topic: &str) -> usize {
        self.inner
            .topics()
            .ok()
            .and_then(|topics| topics.get(topic).map(|q| q.unacked.len()))
            .unwrap_or(0)
    }

    /// Requeues every unacked delivery of `topic`, flagged as redelivered.
    pub fn recover(&self, topic: &str) -> BrokerResult<usize> {
        let mut topics = self.inner.topics()?;
        let Some(queue) = topics.get_mut(topic)
        else {
            return Ok(0);
        };
        let unacked = std::mem::take(&mut queue.unacked);
        let count = unacked.len();
        for (_, mut message) in unacked {
            message.redelivered = true;
            queue.push(message);
        }
        debug!(topic, count, "Recovered unacked deliveries");
        Ok(count)
    }
}

impl Inner {
    fn topics(&self) -> BrokerResult<MutexGuard<'_, HashMap<String, TopicQueue>>> {
        self.topics
            .lock()
            .map_err(|_| BrokerError::Other("topic registry poisoned".into()))
    }

    fn ensure_reachable(&self) -> BrokerResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        }
        else {
            Err(BrokerError::Unavailable("memory broker offline".into()))
        }
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn connect(&self) -> BrokerResult<()> { self.inner.ensure_reachable() }

    async fn subscribe(&self, topic: &str) -> BrokerResult<Box<dyn Subscription>> {
        self.inner.ensure_reachable()?;
        let rx = {
            let mut topics = self.inner.topics()?;
            topics
                .entry(topic.to_string())
                .or_insert_with(TopicQueue::new)
                .rx
                .clone()
        };

        Ok(Box::new(MemorySubscription {
            topic: topic.to_string(),
            rx,
            inner: self.inner.clone(),
            closed: false,
        }))
    }

    async fn publish(&self, topic: &str, body: Bytes) -> BrokerResult<()> {
        self.inner.ensure_reachable()?;
        let message = QueuedMessage {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            body,
            redelivered: false,
        };
        let mut topics = self.inner.topics()?;
        topics
            .entry(topic.to_string())
            .or_insert_with(TopicQueue::new)
            .push(message);
        Ok(())
    }
}

pub struct MemorySubscription {
    topic: String,
    rx: Receiver<QueuedMessage>,
    inner: Arc<Inner>,
    closed: bool,
}

impl MemorySubscription {
    fn settle(&self, delivery: &Delivery) -> BrokerResult<QueuedMessage> {
        let unknown = || {
            BrokerError::UnknownDelivery {
                topic: self.topic.clone(),
                tag: delivery.tag.to_string(),
            }
        };
        let id: u64 = delivery.tag.as_str().parse().map_err(|_| unknown())?;
        let mut topics = self.inner.topics()?;
        topics
            .get_mut(&self.topic)
            .and_then(|queue| queue.unacked.remove(&id))
            .ok_or_else(unknown)
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    fn topic(&self) -> &str { &self.topic }

    async fn next(&mut self) -> BrokerResult<Option<Delivery>> {
        if self.closed {
            return Ok(None);
        }
        let Ok(message) = self.rx.recv_async().await
        else {
            return Ok(None);
        };

        // no await between receive and bookkeeping
        let mut topics = self.inner.topics()?;
        if let Some(queue) = topics.get_mut(&self.topic) {
            queue.unacked.insert(message.id, message.clone());
        }

        Ok(Some(Delivery {
            topic: self.topic.clone(),
            tag: DeliveryTag::new(message.id.to_string()),
            body: message.body,
            redelivered: message.redelivered,
        }))
    }

    async fn ack(&mut self, delivery: &Delivery) -> BrokerResult<()> {
        self.settle(delivery).map(|_| ())
    }

    async fn reject(
        &mut self, delivery: &Delivery, requeue: bool,
    ) -> BrokerResult<()> {
        let mut message = self.settle(delivery)?;
        if requeue {
            message.redelivered = true;
            let topics = self.inner.topics()?;
            if let Some(queue) = topics.get(&self.topic) {
                queue.push(message);
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn publish(broker: &MemoryBroker, topic: &str, body: &'static str) {
        broker
            .publish(topic, Bytes::from_static(body.as_bytes()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_messages_published_before_subscribe_are_kept() {
        let broker = MemoryBroker::new();
        publish(&broker, "user.delete", "one").await;

        let mut sub = broker.subscribe("user.delete").await.unwrap();
        let delivery = sub.next().await.unwrap().unwrap();

        assert_eq!(delivery.body, Bytes::from_static(b"one"));
        assert!(!delivery.redelivered);
    }

    #[tokio::test]
    async fn test_unacked_delivery_is_redelivered_after_recover() {
        let broker = MemoryBroker::new();
        publish(&broker, "t", "payload").await;
        let mut sub = broker.subscribe("t").await.unwrap();
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(broker.unacked("t"), 1);

        assert_eq!(broker.recover("t").unwrap(), 1);

        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.body, first.body);
        assert!(second.redelivered);
        sub.ack(&second).await.unwrap();
        assert_eq!(broker.unacked("t"), 0);
    }

    #[tokio::test]
    async fn test_reject_without_requeue_drops_message() {
        let broker = MemoryBroker::new();
        publish(&broker, "t", "poison").await;
        let mut sub = broker.subscribe("t").await.unwrap();
        let delivery = sub.next().await.unwrap().unwrap();

        sub.reject(&delivery, false).await.unwrap();

        assert_eq!(broker.unacked("t"), 0);
        assert_eq!(broker.queued("t"), 0);
        assert_eq!(broker.recover("t").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reject_with_requeue_puts_message_back() {
        let broker = MemoryBroker::new();
        publish(&broker, "t", "again").await;
        let mut sub = broker.subscribe("t").await.unwrap();
        let delivery = sub.next().await.unwrap().unwrap();

        sub.reject(&delivery, true).await.unwrap();

        assert_eq!(broker.queued("t"), 1);
        assert!(sub.next().await.unwrap().unwrap().redelivered);
    }

    #[tokio::test]
    async fn test_double_ack_is_reported() {
        let broker = MemoryBroker::new();
        publish(&broker, "t", "x").await;
        let mut sub = broker.subscribe("t").await.unwrap();
        let delivery = sub.next().await.unwrap().unwrap();

        sub.ack(&delivery).await.unwrap();
        let again = sub.ack(&delivery).await;

        assert!(matches!(again, Err(BrokerError::UnknownDelivery { .. })));
    }

    #[tokio::test]
    async fn test_offline_broker_refuses_connections() {
        let broker = MemoryBroker::new();
        broker.set_reachable(false);

        let err = broker.connect().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(broker.subscribe("t").await.is_err());
    }
}
