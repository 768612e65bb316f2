use async_trait::async_trait;
use database_traits::dao::ReferenceDao;
use sql_connection::{Row, SqlConnect};
use todo_commands::{CreatePriorityCommand, UpdatePriorityCommand};
use todo_errors::{TodoError, TodoResult};
use todo_models::{DEFAULT_PRIORITIES, Priority};
use tracing::{info, instrument};

use crate::PriorityStore;

#[derive(Clone)]
pub struct PriorityDao {
    db: SqlConnect,
}

impl PriorityDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    fn map_row(row: &Row) -> Priority {
        Priority {
            id: row.get(0),
            name: row.get(1),
            level: row.get(2),
        }
    }
}

#[async_trait]
impl ReferenceDao for PriorityDao {
    type CreateRequest = CreatePriorityCommand;
    type Error = TodoError;
    type ID = i64;
    type Model = Priority;
    type UpdateRequest = UpdatePriorityCommand;

    async fn find_by_id(&self, id: i64) -> TodoResult<Option<Priority>> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare("SELECT id, name, level FROM priorities WHERE id = $1")
            .await?;
        let rows = client.query(&stmt, &[&id]).await?;
        Ok(rows.first().map(Self::map_row))
    }

    async fn all(&self) -> TodoResult<Vec<Priority>> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare("SELECT id, name, level FROM priorities ORDER BY level ASC")
            .await?;
        let rows = client.query(&stmt, &[]).await?;
        Ok(rows.iter().map(Self::map_row).collect())
    }

    /// A duplicate level is a constraint violation.
    #[instrument(skip(self))]
    async fn create(&self, req: CreatePriorityCommand) -> TodoResult<Priority> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "INSERT INTO priorities (name, level) VALUES ($1, $2)
                 RETURNING id, name, level",
            )
            .await?;
        let row = client
            .query_one(&stmt, &[&req.name.trim(), &req.level])
            .await?;
        Ok(Self::map_row(&row))
    }

    #[instrument(skip(self))]
    async fn update(
        &self, id: i64, req: UpdatePriorityCommand,
    ) -> TodoResult<Option<Priority>> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "UPDATE priorities
                 SET name = COALESCE($2, name), level = COALESCE($3, level)
                 WHERE id = $1
                 RETURNING id, name, level",
            )
            .await?;
        let name = req.name.as_deref().map(str::trim);
        let rows = client.query(&stmt, &[&id, &name, &req.level]).await?;
        Ok(rows.first().map(Self::map_row))
    }

    /// Tasks keep existing; their priority becomes null.
    async fn delete(&self, id: i64) -> TodoResult<u64> {
        let client = self.db.get_client().await?;
        let stmt = client.prepare("DELETE FROM priorities WHERE id = $1").await?;
        Ok(client.execute(&stmt, &[&id]).await?)
    }
}

#[async_trait]
impl PriorityStore for PriorityDao {
    #[instrument(skip(self))]
    async fn seed_defaults(&self) -> TodoResult<u64> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare(
                "INSERT INTO priorities (name, level) VALUES ($1, $2)
                 ON CONFLICT (level) DO NOTHING",
            )
            .await?;

        let mut added = 0;
        for (name, level) in DEFAULT_PRIORITIES {
            added += client.execute(&stmt, &[&name, &level]).await?;
        }
        info!(added, "Seeded default priorities");
        Ok(added)
    }
}
