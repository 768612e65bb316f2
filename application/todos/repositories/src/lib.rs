//! Read-through, write-invalidate access to lists, tasks and priorities.
//!
//! Reads consult the [`KeyStore`] first and fill it on a miss. Writes hit
//! the durable store first and only then drop the cached views the
//! [`CacheInvalidationPolicy`] names. The cache may be down at any time;
//! results are then served from the store alone.
//!
//! [`CacheInvalidationPolicy`]: todo_cache_keys::CacheInvalidationPolicy

use std::sync::Arc;

use redis_connection::KeyStore;
use sql_connection::SqlConnect;
use todo_cache_keys::CacheInvalidationPolicy;
use todo_dao::{
    ListDao, ListStore, MemoryTodoStore, PriorityDao, PriorityStore, TaskDao,
    TaskStore,
};
use todo_errors::TodoResult;
use todo_models::OwnerId;
use tracing::{info, instrument, warn};

mod lists;
mod priorities;
mod read_through;
mod tasks;

pub use lists::ListRepository;
pub use priorities::PriorityRepository;
pub use tasks::TaskRepository;

/// The durable stores behind the repositories.
#[derive(Clone)]
pub struct TodoStores {
    pub lists: Arc<dyn ListStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub priorities: Arc<dyn PriorityStore>,
}

impl TodoStores {
    pub fn postgres(db: SqlConnect) -> Self {
        Self {
            lists: Arc::new(ListDao::new(db.clone())),
            tasks: Arc::new(TaskDao::new(db.clone())),
            priorities: Arc::new(PriorityDao::new(db)),
        }
    }

    pub fn memory(store: &MemoryTodoStore) -> Self {
        Self {
            lists: Arc::new(store.clone()),
            tasks: Arc::new(store.tasks()),
            priorities: Arc::new(store.priorities()),
        }
    }
}

/// Rows removed when an owner's data is purged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerPurge {
    pub tasks: u64,
    pub lists: u64,
}

#[derive(Clone)]
pub struct TodoServices {
    pub lists: ListRepository,
    pub tasks: TaskRepository,
    pub priorities: PriorityRepository,
    stores: TodoStores,
    cache: KeyStore,
}

impl TodoServices {
    pub fn new(stores: TodoStores, cache: KeyStore) -> Self {
        Self {
            lists: ListRepository::new(stores.clone(), cache.clone()),
            tasks: TaskRepository::new(stores.clone(), cache.clone()),
            priorities: PriorityRepository::new(stores.clone(), cache.clone()),
            stores,
            cache,
        }
    }

    pub fn cache(&self) -> &KeyStore { &self.cache }

    /// Deletes everything `owner` has, tasks before lists, then drops every
    /// cached view of that owner. Running it again removes nothing and
    /// leaves the same state.
    ///
    /// The cache sweep runs even when a delete fails, since an earlier step
    /// may already have removed rows that cached views still show.
    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn purge_owner(
        &self, owner: &OwnerId,
    ) -> TodoResult<OwnerPurge> {
        let deleted = self.delete_owned_rows(owner).await;
        let evicted = CacheInvalidationPolicy
            .purge_owner(&self.cache, owner)
            .await;
        match deleted {
            Ok(purge) => {
                info!(
                    tasks = purge.tasks,
                    lists = purge.lists,
                    evicted,
                    "Owner data purged"
                );
                Ok(purge)
            }
            Err(e) => {
                warn!(error = %e, evicted, "Owner purge incomplete");
                Err(e)
            }
        }
    }

    async fn delete_owned_rows(
        &self, owner: &OwnerId,
    ) -> TodoResult<OwnerPurge> {
        let tasks = self.stores.tasks.delete_all_for_owner(owner).await?;
        let lists = self.stores.lists.delete_all_for_owner(owner).await?;
        Ok(OwnerPurge { tasks, lists })
    }
}
