//! Redis Streams broker.
//!
//! A topic is a stream and a durable subscription is a consumer group on
//! it. Entries stay in the group's pending list until `XACK`, so a consumer
//! that restarts under the same name first re-reads its own pending
//! entries before asking for new ones. Every settle, reject included,
//! ends in `XACK`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::{Connection, Pool};
use redis::{
    AsyncCommands, RedisError,
    streams::{StreamId, StreamReadOptions, StreamReadReply},
};
use tracing::{debug, instrument};

use crate::{
    broker::{BrokerError, BrokerResult, MessageBroker, Subscription},
    config::BrokerConfig,
    message::{Delivery, DeliveryTag},
};

const BODY_FIELD: &str = "body";

#[derive(Clone)]
pub struct RedisStreamBroker {
    pool: Pool,
    group: String,
    consumer: String,
    block: Duration,
}

impl RedisStreamBroker {
    pub fn new(pool: Pool, config: &BrokerConfig) -> Self {
        Self {
            pool,
            group: config.stream_group.clone(),
            consumer: config.consumer_name.clone(),
            block: config.block(),
        }
    }
}

async fn connection(pool: &Pool) -> BrokerResult<Connection> {
    pool.get()
        .await
        .map_err(|e| BrokerError::Unavailable(e.to_string()))
}

/// `XREADGROUP BLOCK` argument; saturates instead of wrapping.
fn block_millis(block: Duration) -> usize {
    usize::try_from(block.as_millis()).unwrap_or(usize::MAX)
}

fn redis_err(e: RedisError) -> BrokerError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
        BrokerError::Unavailable(e.to_string())
    }
    else {
        BrokerError::Other(e.to_string())
    }
}

#[async_trait]
impl MessageBroker for RedisStreamBroker {
    async fn connect(&self) -> BrokerResult<()> {
        let mut conn = connection(&self.pool).await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    #[instrument(skip(self), fields(group = %self.group))]
    async fn subscribe(&self, topic: &str) -> BrokerResult<Box<dyn Subscription>> {
        let mut conn = connection(&self.pool).await?;
        // start at 0 so entries published before the group existed are consumed
        let created: Result<(), RedisError> =
            conn.xgroup_create_mkstream(topic, &self.group, "0").await;
        match created {
            Ok(()) => debug!("Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => return Err(redis_err(e)),
        }

        Ok(Box::new(RedisStreamSubscription {
            pool: self.pool.clone(),
            topic: topic.to_string(),
            group: self.group.clone(),
            consumer: self.consumer.clone(),
            block: self.block,
            closed: false,
        }))
    }

    async fn publish(&self, topic: &str, body: Bytes) -> BrokerResult<()> {
        let mut conn = connection(&self.pool).await?;
        let _: String = conn
            .xadd(topic, "*", &[(BODY_FIELD, body.as_ref())])
            .await
            .map_err(redis_err)?;
        Ok(())
    }
}

pub struct RedisStreamSubscription {
    pool: Pool,
    topic: String,
    group: String,
    consumer: String,
    block: Duration,
    closed: bool,
}

impl RedisStreamSubscription {
    fn to_delivery(&self, entry: StreamId, redelivered: bool) -> Delivery {
        // a missing body becomes an empty one and fails parsing downstream
        let body: Vec<u8> = entry.get(BODY_FIELD).unwrap_or_default();
        Delivery {
            topic: self.topic.clone(),
            tag: DeliveryTag::new(entry.id),
            body: Bytes::from(body),
            redelivered,
        }
    }

    async fn read_one(
        &self, conn: &mut Connection, id: &str, block: Option<Duration>,
    ) -> BrokerResult<Option<StreamId>> {
        let mut opts = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1);
        if let Some(block) = block {
            opts = opts.block(block_millis(block));
        }
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.topic], &[id], &opts)
            .await
            .map_err(redis_err)?;

        Ok(reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|key| key.ids.into_iter().next()))
    }

    async fn xack(&self, delivery: &Delivery) -> BrokerResult<()> {
        let mut conn = connection(&self.pool).await?;
        let _: u64 = conn
            .xack(&self.topic, &self.group, &[delivery.tag.as_str()])
            .await
            .map_err(redis_err)?;
        Ok(())
    }
}

#[async_trait]
impl Subscription for RedisStreamSubscription {
    fn topic(&self) -> &str { &self.topic }

    async fn next(&mut self) -> BrokerResult<Option<Delivery>> {
        if self.closed {
            return Ok(None);
        }
        let mut conn = connection(&self.pool).await?;

        // id 0 reads this consumer's own pending entries: deliveries from
        // before a restart, or ones whose read was cancelled mid-flight
        if let Some(entry) = self.read_one(&mut conn, "0", None).await? {
            return Ok(Some(self.to_delivery(entry, true)));
        }

        loop {
            if let Some(entry) =
                self.read_one(&mut conn, ">", Some(self.block)).await?
            {
                return Ok(Some(self.to_delivery(entry, false)));
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> BrokerResult<()> {
        self.xack(delivery).await
    }

    async fn reject(
        &mut self, delivery: &Delivery, requeue: bool,
    ) -> BrokerResult<()> {
        if requeue {
            let mut conn = connection(&self.pool).await?;
            let _: String = conn
                .xadd(&self.topic, "*", &[(BODY_FIELD, delivery.body.as_ref())])
                .await
                .map_err(redis_err)?;
        }
        self.xack(delivery).await
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.closed = true;
        Ok(())
    }
}
