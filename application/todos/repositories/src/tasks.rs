use redis_connection::{KeyStore, core::CacheTypeBind};
use todo_cache_keys::{
    AllTasksCacheKey, CacheInvalidationPolicy, ListTasksCacheKey, Mutation,
    Subject, TaskCacheKey, TasksWithStatusCacheKey,
};
use todo_commands::{CreateTaskCommand, UpdateTaskCommand};
use todo_errors::{TodoError, TodoResult};
use todo_models::{Entity, OwnerId, Task};
use tracing::{info, instrument};

use crate::{TodoStores, read_through};

#[derive(Clone)]
pub struct TaskRepository {
    stores: TodoStores,
    cache: KeyStore,
    policy: CacheInvalidationPolicy,
}

impl TaskRepository {
    pub fn new(stores: TodoStores, cache: KeyStore) -> Self {
        Self {
            stores,
            cache,
            policy: CacheInvalidationPolicy,
        }
    }

    async fn invalidate(
        &self, owner: &OwnerId, task_id: Option<i64>, list_ids: &[i64],
        mutation: Mutation,
    ) {
        let subject = Subject::Task {
            owner,
            task_id,
            list_ids,
        };
        self.policy.invalidate(&self.cache, subject, mutation).await
    }

    /// The list must belong to `owner`.
    #[instrument(skip(self, cmd), fields(owner_id = %owner, list_id = cmd.list_id))]
    pub async fn create(
        &self, owner: &OwnerId, cmd: CreateTaskCommand,
    ) -> TodoResult<Task> {
        cmd.validate()?;
        let task = self.stores.tasks.create(owner, cmd).await?;
        self.invalidate(owner, Some(task.id), &[task.list_id], Mutation::Create)
            .await;
        info!(task_id = task.id, "Task created");
        Ok(task)
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn get_by_id(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<Task> {
        let cached = TaskCacheKey.bind_with_args(&self.cache, (owner, &id));
        read_through::find(cached, self.stores.tasks.find_by_id(id, owner))
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::Task))
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn get_all_for_owner(
        &self, owner: &OwnerId,
    ) -> TodoResult<Vec<Task>> {
        let cached = AllTasksCacheKey.bind_with(&self.cache, owner);
        read_through::load(cached, self.stores.tasks.all_for_owner(owner)).await
    }

    /// Empty for a list the owner does not have.
    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn get_by_list(
        &self, list_id: i64, owner: &OwnerId,
    ) -> TodoResult<Vec<Task>> {
        let cached =
            ListTasksCacheKey.bind_with_args(&self.cache, (owner, &list_id));
        read_through::load(cached, self.stores.tasks.for_list(list_id, owner))
            .await
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn get_with_status(
        &self, owner: &OwnerId, completed: bool,
    ) -> TodoResult<Vec<Task>> {
        let cached = TasksWithStatusCacheKey
            .bind_with_args(&self.cache, (owner, &completed));
        let from_store = self.stores.tasks.with_status(owner, completed);
        read_through::load(cached, from_store).await
    }

    /// A patch that only flips completion is handled as a status change.
    #[instrument(skip(self, cmd), fields(owner_id = %owner))]
    pub async fn update(
        &self, id: i64, owner: &OwnerId, cmd: UpdateTaskCommand,
    ) -> TodoResult<Task> {
        cmd.validate()?;
        if let (true, Some(completed)) =
            (cmd.is_status_change(), cmd.is_completed)
        {
            return self.update_status(id, owner, completed).await;
        }

        // the previous list's views go stale when the task moves
        let before = self
            .stores
            .tasks
            .find_by_id(id, owner)
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::Task))?;
        let task = self
            .stores
            .tasks
            .update(id, owner, cmd)
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::Task))?;

        self.invalidate(
            owner,
            Some(id),
            &[before.list_id, task.list_id],
            Mutation::Update,
        )
        .await;
        Ok(task)
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn update_status(
        &self, id: i64, owner: &OwnerId, completed: bool,
    ) -> TodoResult<Task> {
        let task = self
            .stores
            .tasks
            .set_status(id, owner, completed)
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::Task))?;
        self.invalidate(owner, Some(id), &[task.list_id], Mutation::StatusChange)
            .await;
        Ok(task)
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn delete(&self, id: i64, owner: &OwnerId) -> TodoResult<()> {
        let task = self
            .stores
            .tasks
            .find_by_id(id, owner)
            .await?
            .ok_or_else(|| TodoError::not_found(Entity::Task))?;
        if self.stores.tasks.delete(id, owner).await? == 0 {
            return Err(TodoError::not_found(Entity::Task));
        }
        self.invalidate(owner, Some(id), &[task.list_id], Mutation::Delete)
            .await;
        info!(task_id = id, "Task deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn delete_all_for_owner(
        &self, owner: &OwnerId,
    ) -> TodoResult<u64> {
        let removed = self.stores.tasks.delete_all_for_owner(owner).await?;
        self.invalidate(owner, None, &[], Mutation::BulkDeleteByOwner)
            .await;
        Ok(removed)
    }
}
