use async_trait::async_trait;
use chrono::Utc;
use database_traits::dao::OwnedDao;
use sql_connection::{Row, SqlConnect};
use todo_commands::{CreateListCommand, UpdateListCommand};
use todo_errors::{TodoError, TodoResult};
use todo_models::{ListSummary, OwnerId, TodoList};
use tracing::instrument;

use crate::ListStore;

const COLUMNS: &str = "id, title, description, created_at, updated_at";

#[derive(Clone)]
pub struct ListDao {
    db: SqlConnect,
}

impl ListDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    /// Rows are always fetched for a known owner, so it is not selected.
    fn map_row(row: &Row, owner: &OwnerId) -> TodoList {
        TodoList {
            id: row.get(0),
            owner_id: owner.clone(),
            title: row.get(1),
            description: row.get(2),
            created_at: row.get(3),
            updated_at: row.get(4),
        }
    }
}

#[async_trait]
impl OwnedDao for ListDao {
    type CreateRequest = CreateListCommand;
    type Error = TodoError;
    type ID = i64;
    type Model = TodoList;
    type Owner = OwnerId;
    type UpdateRequest = UpdateListCommand;

    async fn find_by_id(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<Option<TodoList>> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(&format!(
                "SELECT {COLUMNS} FROM lists WHERE id = $1 AND user_id = $2"
            ))
            .await?;
        let rows = client.query(&stmt, &[&id, &owner.as_str()]).await?;

        Ok(rows.first().map(|row| Self::map_row(row, owner)))
    }

    async fn all_for_owner(&self, owner: &OwnerId) -> TodoResult<Vec<TodoList>> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(&format!(
                "SELECT {COLUMNS} FROM lists WHERE user_id = $1
                 ORDER BY created_at DESC, id DESC"
            ))
            .await?;
        let rows = client.query(&stmt, &[&owner.as_str()]).await?;

        Ok(rows.iter().map(|row| Self::map_row(row, owner)).collect())
    }

    #[instrument(skip(self, req))]
    async fn create(
        &self, owner: &OwnerId, req: CreateListCommand,
    ) -> TodoResult<TodoList> {
        let client = self.db.get_client().await?;
        let now = Utc::now();
        let stmt = client
            .prepare(&format!(
                "INSERT INTO lists (user_id, title, description, created_at, \
                 updated_at)
                 VALUES ($1, $2, $3, $4, $4)
                 RETURNING {COLUMNS}"
            ))
            .await?;
        let row = client
            .query_one(
                &stmt,
                &[&owner.as_str(), &req.title.trim(), &req.description, &now],
            )
            .await?;

        Ok(Self::map_row(&row, owner))
    }

    #[instrument(skip(self, req))]
    async fn update(
        &self, id: i64, owner: &OwnerId, req: UpdateListCommand,
    ) -> TodoResult<Option<TodoList>> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(&format!(
                "UPDATE lists
                 SET title = COALESCE($3, title),
                     description = COALESCE($4, description),
                     updated_at = $5
                 WHERE id = $1 AND user_id = $2
                 RETURNING {COLUMNS}"
            ))
            .await?;
        let title = req.title.as_deref().map(str::trim);
        let rows = client
            .query(
                &stmt,
                &[&id, &owner.as_str(), &title, &req.description, &Utc::now()],
            )
            .await?;

        Ok(rows.first().map(|row| Self::map_row(row, owner)))
    }

    /// Tasks go with the list through the foreign key.
    async fn delete(&self, id: i64, owner: &OwnerId) -> TodoResult<u64> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare("DELETE FROM lists WHERE id = $1 AND user_id = $2")
            .await?;
        Ok(client.execute(&stmt, &[&id, &owner.as_str()]).await?)
    }

    async fn delete_all_for_owner(&self, owner: &OwnerId) -> TodoResult<u64> {
        let client = self.db.get_client().await?;
        let stmt = client.prepare("DELETE FROM lists WHERE user_id = $1").await?;
        Ok(client.execute(&stmt, &[&owner.as_str()]).await?)
    }
}

#[async_trait]
impl ListStore for ListDao {
    async fn summaries(&self, owner: &OwnerId) -> TodoResult<Vec<ListSummary>> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare(
                "SELECT l.id, l.title, l.description, l.created_at, \
                 l.updated_at,
                        COUNT(t.id),
                        COUNT(t.id) FILTER (WHERE NOT t.is_completed)
                 FROM lists l
                 LEFT JOIN tasks t ON t.list_id = l.id
                 WHERE l.user_id = $1
                 GROUP BY l.id
                 ORDER BY l.created_at DESC, l.id DESC",
            )
            .await?;
        let rows = client.query(&stmt, &[&owner.as_str()]).await?;

        Ok(rows
            .iter()
            .map(|row| {
                ListSummary {
                    list: Self::map_row(row, owner),
                    total_tasks: row.get(5),
                    pending_tasks: row.get(6),
                }
            })
            .collect())
    }
}
