use std::sync::Once;

use anyhow::Result;
use database_traits::dao::OwnedDao;
use todo_commands::{CreateListCommand, CreateTaskCommand};
use todo_dao::MemoryTodoStore;
use todo_models::{OwnerId, Task, TodoList};

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn owner(raw: &str) -> OwnerId {
    OwnerId::parse(raw).unwrap_or_else(|e| panic!("bad test owner {raw}: {e}"))
}

pub fn list_command(title: &str) -> CreateListCommand {
    CreateListCommand {
        title: title.to_string(),
        description: None,
    }
}

pub fn task_command(list_id: i64, title: &str) -> CreateTaskCommand {
    CreateTaskCommand {
        list_id,
        title: title.to_string(),
        description: None,
        priority_id: None,
        due_date: None,
    }
}

/// Lists and tasks written straight to the store, bypassing any cache.
pub struct SeededOwner {
    pub lists: Vec<TodoList>,
    pub tasks: Vec<Task>,
}

/// Creates `lists` lists for `owner` and spreads `tasks` tasks over them
/// round-robin.
pub async fn seed_owner(
    store: &MemoryTodoStore, owner: &OwnerId, lists: usize, tasks: usize,
) -> Result<SeededOwner> {
    let mut seeded = SeededOwner {
        lists: Vec::with_capacity(lists),
        tasks: Vec::with_capacity(tasks),
    };
    for i in 0..lists {
        let list = store.create(owner, list_command(&format!("List {i}"))).await?;
        seeded.lists.push(list);
    }
    if seeded.lists.is_empty() {
        return Ok(seeded);
    }

    let task_store = store.tasks();
    for i in 0..tasks {
        let list_id = seeded.lists[i % seeded.lists.len()].id;
        let task = task_store
            .create(owner, task_command(list_id, &format!("Task {i}")))
            .await?;
        seeded.tasks.push(task);
    }
    Ok(seeded)
}
