use std::time::Duration;

pub trait DbConnectConfig: serde::de::DeserializeOwned {
    fn password(&self) -> Option<&str> { None }
    fn host(&self) -> &str;
    fn port(&self) -> u16;
    fn db(&self) -> u8;
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RedisDbConfig {
    #[serde(default = "host_default")]
    pub host: String,
    #[serde(default = "port_default")]
    pub port: u16,
    #[serde(default = "db_default")]
    pub db: u8,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for RedisDbConfig {
    fn default() -> Self {
        Self {
            host: host_default(),
            port: port_default(),
            db: db_default(),
            password: None,
        }
    }
}

impl DbConnectConfig for RedisDbConfig {
    fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    fn host(&self) -> &str { &self.host }

    fn port(&self) -> u16 { self.port }

    fn db(&self) -> u8 { self.db }
}

/// Per-service cache settings. Every service sharing one physical backend
/// must use its own namespace.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CacheConfig {
    #[serde(default = "namespace_default")]
    pub namespace: String,
    #[serde(default = "ttl_secs_default")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub clear_on_start: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: namespace_default(),
            ttl_secs: ttl_secs_default(),
            clear_on_start: false,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_capacity")]
    pub capacity: u64,
    #[serde(default = "default_memory_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_memory_capacity(),
            ttl_secs: default_memory_ttl_secs(),
        }
    }
}

impl MemoryConfig {
    /// Upper bound for any entry; per-entry TTLs are clamped to it.
    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

fn host_default() -> String { "127.0.0.1".into() }
fn port_default() -> u16 { 6379 }
fn db_default() -> u8 { 0 }
fn namespace_default() -> String { "taskmaster".into() }
fn ttl_secs_default() -> u64 { 3600 }
fn default_memory_capacity() -> u64 { 10_000 }
fn default_memory_ttl_secs() -> u64 { 3600 }
