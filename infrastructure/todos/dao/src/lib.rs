//! Durable storage for lists, tasks and priorities.
//!
//! The repositories only see the store traits below. [`ListDao`],
//! [`TaskDao`] and [`PriorityDao`] implement them on Postgres;
//! [`MemoryTodoStore`] implements all three in process.

use async_trait::async_trait;
use database_traits::dao::{OwnedDao, ReferenceDao};
use todo_commands::{
    CreateListCommand, CreatePriorityCommand, CreateTaskCommand,
    UpdateListCommand, UpdatePriorityCommand, UpdateTaskCommand,
};
use todo_errors::{TodoError, TodoResult};
use todo_models::{ListSummary, OwnerId, Priority, Task, TodoList};

mod lists;
mod memory;
mod priorities;
pub mod schema;
mod tasks;

pub use lists::ListDao;
pub use memory::{MemoryPriorityStore, MemoryTaskStore, MemoryTodoStore};
pub use priorities::PriorityDao;
pub use tasks::TaskDao;

#[async_trait]
pub trait ListStore:
    OwnedDao<
        Model = TodoList,
        CreateRequest = CreateListCommand,
        UpdateRequest = UpdateListCommand,
        Error = TodoError,
        ID = i64,
        Owner = OwnerId,
    >
{
    /// The owner's lists with task counts, newest first.
    async fn summaries(&self, owner: &OwnerId) -> TodoResult<Vec<ListSummary>>;
}

/// Tasks belong to an owner through their list.
#[async_trait]
pub trait TaskStore:
    OwnedDao<
        Model = Task,
        CreateRequest = CreateTaskCommand,
        UpdateRequest = UpdateTaskCommand,
        Error = TodoError,
        ID = i64,
        Owner = OwnerId,
    >
{
    async fn for_list(
        &self, list_id: i64, owner: &OwnerId,
    ) -> TodoResult<Vec<Task>>;

    async fn with_status(
        &self, owner: &OwnerId, completed: bool,
    ) -> TodoResult<Vec<Task>>;

    async fn set_status(
        &self, id: i64, owner: &OwnerId, completed: bool,
    ) -> TodoResult<Option<Task>>;

    /// Removes every task of one list, keeping the list.
    async fn delete_for_list(
        &self, list_id: i64, owner: &OwnerId,
    ) -> TodoResult<u64>;
}

#[async_trait]
pub trait PriorityStore:
    ReferenceDao<
        Model = Priority,
        CreateRequest = CreatePriorityCommand,
        UpdateRequest = UpdatePriorityCommand,
        Error = TodoError,
        ID = i64,
    >
{
    /// Inserts the default priorities that are missing. Returns how many
    /// were added.
    async fn seed_defaults(&self) -> TodoResult<u64>;
}
