use redis_connection::{KeyStore, core::CacheTypeBind};
use todo_cache_keys::{
    CacheInvalidationPolicy, Mutation, PrioritiesCacheKey, PriorityCacheKey,
    Subject,
};
use todo_commands::{CreatePriorityCommand, UpdatePriorityCommand};
use todo_errors::{TodoError, TodoResult};
use todo_models::{Entity, Priority};
use tracing::{info, instrument};

use crate::{TodoStores, read_through};

/// Priorities are shared by every owner. Any change also sweeps the
/// owner views that embed them.
#[derive(Clone)]
pub struct PriorityRepository {
    stores: TodoStores,
    cache: KeyStore,
    policy: CacheInvalidationPolicy,
}

impl PriorityRepository {
    pub fn new(stores: TodoStores, cache: KeyStore) -> Self {
        Self {
            stores,
            cache,
            policy: CacheInvalidationPolicy,
        }
    }

    async fn invalidate(&self, priority_id: Option<i64>, mutation: Mutation) {
        let subject = Subject::Priority { priority_id };
        self.policy.invalidate(&self.cache, subject, mutation).await
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> TodoResult<Vec<Priority>> {
        let cached = PrioritiesCacheKey.bind(&self.cache);
        read_through::load(cached, self.stores.priorities.all()).await
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> TodoResult<Priority> {
        let cached = PriorityCacheKey.bind_with(&self.cache, &id);
        read_through::find(cached, self.stores.priorities.find_by_id(id))
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::Priority))
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self, cmd: CreatePriorityCommand,
    ) -> TodoResult<Priority> {
        cmd.validate()?;
        let priority = self.stores.priorities.create(cmd).await?;
        self.invalidate(Some(priority.id), Mutation::Create).await;
        Ok(priority)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self, id: i64, cmd: UpdatePriorityCommand,
    ) -> TodoResult<Priority> {
        cmd.validate()?;
        let priority = self
            .stores
            .priorities
            .update(id, cmd)
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::Priority))?;
        self.invalidate(Some(id), Mutation::Update).await;
        Ok(priority)
    }

    /// Tasks that used it lose their priority.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> TodoResult<()> {
        if self.stores.priorities.delete(id).await? == 0 {
            return Err(TodoError::not_found(Entity::Priority));
        }
        self.invalidate(Some(id), Mutation::Delete).await;
        Ok(())
    }

    /// Adds the default levels that are missing.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> TodoResult<u64> {
        let added = self.stores.priorities.seed_defaults().await?;
        if added > 0 {
            self.invalidate(None, Mutation::Create).await;
            info!(added, "Default priorities added");
        }
        Ok(added)
    }
}
