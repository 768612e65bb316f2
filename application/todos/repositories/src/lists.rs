use std::collections::HashMap;

use redis_connection::{KeyStore, core::CacheTypeBind};
use todo_cache_keys::{
    CacheInvalidationPolicy, ListCacheKey, ListWithTasksCacheKey, Mutation,
    Subject, UserListsCacheKey, UserListsWithTasksCacheKey,
};
use todo_commands::{CreateListCommand, UpdateListCommand};
use todo_errors::{TodoError, TodoResult};
use todo_models::{
    Entity, ListSummary, ListWithTasks, OwnerId, Priority, Task,
    TaskWithPriority, TodoList,
};
use tracing::{info, instrument};

use crate::{TodoStores, read_through};

#[derive(Clone)]
pub struct ListRepository {
    stores: TodoStores,
    cache: KeyStore,
    policy: CacheInvalidationPolicy,
}

fn with_priorities(
    tasks: Vec<Task>, priorities: &HashMap<i64, Priority>,
) -> Vec<TaskWithPriority> {
    tasks
        .into_iter()
        .map(|task| {
            let priority =
                task.priority_id.and_then(|id| priorities.get(&id).cloned());
            TaskWithPriority { task, priority }
        })
        .collect()
}

impl ListRepository {
    pub fn new(stores: TodoStores, cache: KeyStore) -> Self {
        Self {
            stores,
            cache,
            policy: CacheInvalidationPolicy,
        }
    }

    async fn priorities(&self) -> TodoResult<HashMap<i64, Priority>> {
        let all = self.stores.priorities.all().await?;
        Ok(all.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn invalidate(
        &self, owner: &OwnerId, list_id: Option<i64>, mutation: Mutation,
    ) {
        let subject = Subject::List { owner, list_id };
        self.policy.invalidate(&self.cache, subject, mutation).await
    }

    #[instrument(skip(self, cmd), fields(owner_id = %owner))]
    pub async fn create(
        &self, owner: &OwnerId, cmd: CreateListCommand,
    ) -> TodoResult<TodoList> {
        cmd.validate()?;
        let list = self.stores.lists.create(owner, cmd).await?;
        self.invalidate(owner, Some(list.id), Mutation::Create).await;
        info!(list_id = list.id, "List created");
        Ok(list)
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn get_by_id(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<TodoList> {
        let cached = ListCacheKey.bind_with_args(&self.cache, (owner, &id));
        read_through::find(cached, self.stores.lists.find_by_id(id, owner))
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::List))
    }

    /// The owner's lists with task counts.
    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn get_all_for_owner(
        &self, owner: &OwnerId,
    ) -> TodoResult<Vec<ListSummary>> {
        let cached = UserListsCacheKey.bind_with(&self.cache, owner);
        read_through::load(cached, self.stores.lists.summaries(owner)).await
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn get_by_id_with_tasks(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<ListWithTasks> {
        let cached =
            ListWithTasksCacheKey.bind_with_args(&self.cache, (owner, &id));
        let from_store = async {
            let Some(list) = self.stores.lists.find_by_id(id, owner).await?
            else {
                return Ok(None);
            };
            let tasks = self.stores.tasks.for_list(id, owner).await?;
            let priorities = self.priorities().await?;
            Ok::<_, TodoError>(Some(ListWithTasks {
                list,
                tasks: with_priorities(tasks, &priorities),
            }))
        };
        read_through::find(cached, from_store)
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::List))
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn get_all_for_owner_with_tasks(
        &self, owner: &OwnerId,
    ) -> TodoResult<Vec<ListWithTasks>> {
        let cached = UserListsWithTasksCacheKey.bind_with(&self.cache, owner);
        let from_store = async {
            let lists = self.stores.lists.all_for_owner(owner).await?;
            let mut by_list: HashMap<i64, Vec<Task>> = HashMap::new();
            for task in self.stores.tasks.all_for_owner(owner).await? {
                by_list.entry(task.list_id).or_default().push(task);
            }
            let priorities = self.priorities().await?;

            let views: Vec<ListWithTasks> = lists
                .into_iter()
                .map(|list| {
                    let tasks = by_list.remove(&list.id).unwrap_or_default();
                    ListWithTasks {
                        list,
                        tasks: with_priorities(tasks, &priorities),
                    }
                })
                .collect();
            Ok::<_, TodoError>(views)
        };
        read_through::load(cached, from_store).await
    }

    #[instrument(skip(self, cmd), fields(owner_id = %owner))]
    pub async fn update(
        &self, id: i64, owner: &OwnerId, cmd: UpdateListCommand,
    ) -> TodoResult<TodoList> {
        cmd.validate()?;
        let list = self
            .stores
            .lists
            .update(id, owner, cmd)
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::List))?;
        self.invalidate(owner, Some(id), Mutation::Update).await;
        Ok(list)
    }

    /// Deletes the list and its tasks.
    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn delete(&self, id: i64, owner: &OwnerId) -> TodoResult<()> {
        if self.stores.lists.delete(id, owner).await? == 0 {
            return Err(TodoError::not_found(Entity::List));
        }
        self.invalidate(owner, Some(id), Mutation::Delete).await;
        info!(list_id = id, "List deleted");
        Ok(())
    }

    /// Returns how many lists were removed; zero is not an error.
    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn delete_all_for_owner(
        &self, owner: &OwnerId,
    ) -> TodoResult<u64> {
        let removed = self.stores.lists.delete_all_for_owner(owner).await?;
        self.invalidate(owner, None, Mutation::BulkDeleteByOwner).await;
        Ok(removed)
    }

    /// Deletes every task of one list and keeps the list.
    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn clean_up_list(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<u64> {
        if self.stores.lists.find_by_id(id, owner).await?.is_none() {
            return Err(TodoError::not_found(Entity::List));
        }
        let removed = self.stores.tasks.delete_for_list(id, owner).await?;
        let subject = Subject::Task {
            owner,
            task_id: None,
            list_ids: &[id],
        };
        self.policy
            .invalidate(&self.cache, subject, Mutation::Delete)
            .await;
        info!(list_id = id, removed, "List cleaned up");
        Ok(removed)
    }

    /// Deletes every task of the owner and keeps the lists.
    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn clean_up_all_lists(
        &self, owner: &OwnerId,
    ) -> TodoResult<u64> {
        let removed = self.stores.tasks.delete_all_for_owner(owner).await?;
        let subject = Subject::Task {
            owner,
            task_id: None,
            list_ids: &[],
        };
        self.policy
            .invalidate(&self.cache, subject, Mutation::BulkDeleteByOwner)
            .await;
        info!(removed, "All lists cleaned up");
        Ok(removed)
    }
}
