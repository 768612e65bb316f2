use async_trait::async_trait;
use chrono::Utc;
use database_traits::dao::OwnedDao;
use sql_connection::{Row, SqlConnect};
use todo_commands::{CreateTaskCommand, UpdateTaskCommand};
use todo_errors::{TodoError, TodoResult};
use todo_models::{Entity, OwnerId, Task};
use tracing::instrument;

use crate::TaskStore;

const COLUMNS: &str = "t.id, t.list_id, t.title, t.description, \
                       t.priority_id, t.due_date, t.is_completed, \
                       t.created_at, t.updated_at";

const ORDER: &str =
    "ORDER BY t.due_date ASC NULLS LAST, t.is_completed ASC, \
     t.created_at DESC, t.id DESC";

#[derive(Clone)]
pub struct TaskDao {
    db: SqlConnect,
}

/// Outcome of the pre-write checks run inside create and update.
fn check_status(status: &str) -> TodoResult<bool> {
    match status {
        "ok" => Ok(true),
        "task_not_found" => Ok(false),
        "list_not_found" => Err(TodoError::not_found(Entity::List)),
        "priority_not_found" => {
            Err(TodoError::validation("priority_id", "unknown priority"))
        }
        other => {
            Err(TodoError::StoreUnavailable(format!(
                "unexpected check result {other}"
            )))
        }
    }
}

impl TaskDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    fn map_row(row: &Row) -> Task { Self::map_row_at(row, 0) }

    fn map_row_at(row: &Row, at: usize) -> Task {
        Task {
            id: row.get(at),
            list_id: row.get(at + 1),
            title: row.get(at + 2),
            description: row.get(at + 3),
            priority_id: row.get(at + 4),
            due_date: row.get(at + 5),
            is_completed: row.get(at + 6),
            created_at: row.get(at + 7),
            updated_at: row.get(at + 8),
        }
    }

    async fn query_owned(
        &self, filter: &str, params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> TodoResult<Vec<Task>> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(&format!(
                "SELECT {COLUMNS} FROM tasks t
                 JOIN lists l ON l.id = t.list_id
                 WHERE {filter}
                 {ORDER}"
            ))
            .await?;
        let rows = client.query(&stmt, params).await?;
        Ok(rows.iter().map(Self::map_row).collect())
    }
}

#[async_trait]
impl OwnedDao for TaskDao {
    type CreateRequest = CreateTaskCommand;
    type Error = TodoError;
    type ID = i64;
    type Model = Task;
    type Owner = OwnerId;
    type UpdateRequest = UpdateTaskCommand;

    async fn find_by_id(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<Option<Task>> {
        let tasks = self
            .query_owned("t.id = $1 AND l.user_id = $2", &[
                &id,
                &owner.as_str(),
            ])
            .await?;
        Ok(tasks.into_iter().next())
    }

    async fn all_for_owner(&self, owner: &OwnerId) -> TodoResult<Vec<Task>> {
        self.query_owned("l.user_id = $1", &[&owner.as_str()]).await
    }

    #[instrument(skip(self, req))]
    async fn create(
        &self, owner: &OwnerId, req: CreateTaskCommand,
    ) -> TodoResult<Task> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "WITH checks AS (
                     SELECT CASE
                         WHEN NOT EXISTS(SELECT 1 FROM lists WHERE id = $1 \
                 AND user_id = $2) THEN 'list_not_found'::text
                         WHEN $5::bigint IS NOT NULL AND NOT EXISTS(SELECT 1 \
                 FROM priorities WHERE id = $5) THEN \
                 'priority_not_found'::text
                         ELSE 'ok'::text
                     END AS status
                 ),
                 inserted AS (
                     INSERT INTO tasks (list_id, title, description, \
                 priority_id, due_date, is_completed, created_at, updated_at)
                     SELECT $1, $3::varchar, $4::varchar, $5::bigint, \
                 $6::date, FALSE, $7::timestamptz, $7::timestamptz
                     WHERE (SELECT status FROM checks) = 'ok'
                     RETURNING id, list_id, title, description, priority_id, \
                 due_date, is_completed, created_at, updated_at
                 )
                 SELECT c.status, i.*
                 FROM checks c
                 LEFT JOIN inserted i ON c.status = 'ok'",
            )
            .await?;
        let row = client
            .query_one(&stmt, &[
                &req.list_id,
                &owner.as_str(),
                &req.title.trim(),
                &req.description,
                &req.priority_id,
                &req.due_date,
                &Utc::now(),
            ])
            .await?;

        let status: String = row.get(0);
        if check_status(&status)? {
            Ok(Self::map_row_at(&row, 1))
        }
        else {
            Err(TodoError::not_found(Entity::List))
        }
    }

    #[instrument(skip(self, req))]
    async fn update(
        &self, id: i64, owner: &OwnerId, req: UpdateTaskCommand,
    ) -> TodoResult<Option<Task>> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "WITH checks AS (
                     SELECT CASE
                         WHEN NOT EXISTS(SELECT 1 FROM tasks t JOIN lists l \
                 ON l.id = t.list_id WHERE t.id = $1 AND l.user_id = $2) \
                 THEN 'task_not_found'::text
                         WHEN $3::bigint IS NOT NULL AND NOT EXISTS(SELECT 1 \
                 FROM lists WHERE id = $3 AND user_id = $2) THEN \
                 'list_not_found'::text
                         WHEN $6::bigint IS NOT NULL AND NOT EXISTS(SELECT 1 \
                 FROM priorities WHERE id = $6) THEN \
                 'priority_not_found'::text
                         ELSE 'ok'::text
                     END AS status
                 ),
                 updated AS (
                     UPDATE tasks
                     SET list_id = COALESCE($3, list_id),
                         title = COALESCE($4, title),
                         description = COALESCE($5, description),
                         priority_id = COALESCE($6, priority_id),
                         due_date = COALESCE($7, due_date),
                         is_completed = COALESCE($8, is_completed),
                         updated_at = $9
                     WHERE id = $1 AND (SELECT status FROM checks) = 'ok'
                     RETURNING id, list_id, title, description, priority_id, \
                 due_date, is_completed, created_at, updated_at
                 )
                 SELECT c.status, u.*
                 FROM checks c
                 LEFT JOIN updated u ON c.status = 'ok'",
            )
            .await?;
        let title = req.title.as_deref().map(str::trim);
        let row = client
            .query_one(&stmt, &[
                &id,
                &owner.as_str(),
                &req.list_id,
                &title,
                &req.description,
                &req.priority_id,
                &req.due_date,
                &req.is_completed,
                &Utc::now(),
            ])
            .await?;

        let status: String = row.get(0);
        Ok(check_status(&status)?.then(|| Self::map_row_at(&row, 1)))
    }

    async fn delete(&self, id: i64, owner: &OwnerId) -> TodoResult<u64> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "DELETE FROM tasks t USING lists l
                 WHERE t.list_id = l.id AND t.id = $1 AND l.user_id = $2",
            )
            .await?;
        Ok(client.execute(&stmt, &[&id, &owner.as_str()]).await?)
    }

    async fn delete_all_for_owner(&self, owner: &OwnerId) -> TodoResult<u64> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "DELETE FROM tasks t USING lists l
                 WHERE t.list_id = l.id AND l.user_id = $1",
            )
            .await?;
        Ok(client.execute(&stmt, &[&owner.as_str()]).await?)
    }
}

#[async_trait]
impl TaskStore for TaskDao {
    async fn for_list(
        &self, list_id: i64, owner: &OwnerId,
    ) -> TodoResult<Vec<Task>> {
        self.query_owned("l.id = $1 AND l.user_id = $2", &[
            &list_id,
            &owner.as_str(),
        ])
        .await
    }

    async fn with_status(
        &self, owner: &OwnerId, completed: bool,
    ) -> TodoResult<Vec<Task>> {
        self.query_owned("l.user_id = $1 AND t.is_completed = $2", &[
            &owner.as_str(),
            &completed,
        ])
        .await
    }

    #[instrument(skip(self))]
    async fn set_status(
        &self, id: i64, owner: &OwnerId, completed: bool,
    ) -> TodoResult<Option<Task>> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(&format!(
                "UPDATE tasks t
                 SET is_completed = $3, updated_at = $4
                 FROM lists l
                 WHERE t.list_id = l.id AND t.id = $1 AND l.user_id = $2
                 RETURNING {COLUMNS}"
            ))
            .await?;
        let rows = client
            .query(&stmt, &[&id, &owner.as_str(), &completed, &Utc::now()])
            .await?;
        Ok(rows.first().map(Self::map_row))
    }

    async fn delete_for_list(
        &self, list_id: i64, owner: &OwnerId,
    ) -> TodoResult<u64> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "DELETE FROM tasks t USING lists l
                 WHERE t.list_id = l.id AND l.id = $1 AND l.user_id = $2",
            )
            .await?;
        Ok(client.execute(&stmt, &[&list_id, &owner.as_str()]).await?)
    }
}
