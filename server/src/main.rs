use std::sync::Arc;

use event_bus::{EventConsumer, RedisStreamBroker};
use redis_connection::{connect_redis_db, redis_key_store};
use sql_connection::{SqlConnect, connect_postgres_db};
use todo_dao::schema::ensure_schema;
use todo_repositories::{TodoServices, TodoStores};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_event_handlers::{CascadeHandler, USER_DELETE_TOPIC};

mod config;

use config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;

    info!("Initializing connection pools...");
    let db = SqlConnect::new(connect_postgres_db(&config.postgres).await?);
    ensure_schema(&db).await?;
    info!("PostgreSQL pool initialized, schema ensured");

    let redis_pool = connect_redis_db(&config.redis).await?;
    let cache = redis_key_store(redis_pool.clone(), &config.cache);
    if config.cache.clear_on_start {
        let cleared = cache.clear().await;
        info!(namespace = %cache.namespace().name(), cleared, "Cache cleared");
    }

    let services = TodoServices::new(TodoStores::postgres(db), cache);
    services.priorities.initialize().await?;

    let broker = Arc::new(RedisStreamBroker::new(redis_pool, &config.broker));
    let mut consumer =
        EventConsumer::new(broker, config.broker.shutdown_grace());
    consumer.connect().await?;
    consumer
        .subscribe(USER_DELETE_TOPIC, Arc::new(CascadeHandler::new(services)))
        .await?;
    info!(
        topic = USER_DELETE_TOPIC,
        group = %config.broker.stream_group,
        consumer = %config.broker.consumer_name,
        "Worker started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let report = consumer.disconnect().await;
    if report.aborted > 0 {
        warn!(
            aborted = report.aborted,
            "Messages in flight will be redelivered on next start"
        );
    }
    let metrics = consumer.metrics();
    info!(
        received = metrics.received,
        acked = metrics.acked,
        discarded_malformed = metrics.discarded_malformed,
        discarded_failed = metrics.discarded_failed,
        broker_errors = metrics.broker_errors,
        "Worker stopped"
    );

    Ok(())
}
