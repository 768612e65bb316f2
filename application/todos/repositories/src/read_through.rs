use std::future::Future;

use redis_connection::core::Cached;
use serde::{Serialize, de::DeserializeOwned};
use todo_errors::TodoResult;
use tracing::debug;

/// Serves `cached` if present, else loads from the store and populates it.
pub(crate) async fn load<T, F>(
    cached: Cached<'_, T>, from_store: F,
) -> TodoResult<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    F: Future<Output = TodoResult<T>>,
{
    if let Some(value) = cached.try_get().await {
        debug!(cache.key = %cached.key(), "Cache hit");
        return Ok(value);
    }
    debug!(cache.key = %cached.key(), "Cache miss");
    let value = from_store.await?;
    cached.set(&value).await;
    Ok(value)
}

/// Like [`load`] for single records. Absence is not cached.
pub(crate) async fn find<T, F>(
    cached: Cached<'_, T>, from_store: F,
) -> TodoResult<Option<T>>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    F: Future<Output = TodoResult<Option<T>>>,
{
    if let Some(value) = cached.try_get().await {
        debug!(cache.key = %cached.key(), "Cache hit");
        return Ok(Some(value));
    }
    debug!(cache.key = %cached.key(), "Cache miss");
    let found = from_store.await?;
    if let Some(value) = &found {
        cached.set(value).await;
    }
    Ok(found)
}
