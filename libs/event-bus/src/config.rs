use std::time::Duration;

use uuid::Uuid;

/// Consumer and Redis Streams settings.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BrokerConfig {
    /// Consumer group; one group per consuming service.
    #[serde(default = "stream_group_default")]
    pub stream_group: String,
    /// Consumer name inside the group; must be stable across restarts
    /// for pending messages to be picked up again.
    #[serde(default = "consumer_name_default")]
    pub consumer_name: String,
    #[serde(default = "block_ms_default")]
    pub block_ms: u64,
    #[serde(default = "shutdown_grace_secs_default")]
    pub shutdown_grace_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            stream_group: stream_group_default(),
            consumer_name: consumer_name_default(),
            block_ms: block_ms_default(),
            shutdown_grace_secs: shutdown_grace_secs_default(),
        }
    }
}

impl BrokerConfig {
    pub fn block(&self) -> Duration { Duration::from_millis(self.block_ms) }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn stream_group_default() -> String { "taskmaster".into() }
fn consumer_name_default() -> String { format!("consumer-{}", Uuid::now_v7()) }
fn block_ms_default() -> u64 { 5000 }
fn shutdown_grace_secs_default() -> u64 { 10 }
