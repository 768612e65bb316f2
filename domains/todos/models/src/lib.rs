use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

mod owner;

pub use owner::{InvalidOwnerId, OwnerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: i64,
    pub owner_id: OwnerId,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A list as shown in the owner's overview, with task counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSummary {
    #[serde(flatten)]
    pub list: TodoList,
    pub total_tasks: i64,
    pub pending_tasks: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shared reference data; no owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    pub id: i64,
    pub name: String,
    pub level: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithPriority {
    #[serde(flatten)]
    pub task: Task,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListWithTasks {
    #[serde(flatten)]
    pub list: TodoList,
    pub tasks: Vec<TaskWithPriority>,
}

/// The priorities every fresh store starts with.
pub const DEFAULT_PRIORITIES: [(&str, i32); 4] =
    [("Low", 1), ("Medium", 2), ("High", 3), ("Urgent", 4)];

/// Entity kinds that have their own cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    List,
    Task,
    Priority,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::List => "list",
            Entity::Task => "task",
            Entity::Priority => "priority",
        };
        f.write_str(name)
    }
}

/// Task ordering shared by every store: due date first (undated last),
/// open before done, newest first.
pub fn task_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    let due = |t: &Task| (t.due_date.is_none(), t.due_date);
    due(a)
        .cmp(&due(b))
        .then(a.is_completed.cmp(&b.is_completed))
        .then(b.created_at.cmp(&a.created_at))
        .then(b.id.cmp(&a.id))
}
