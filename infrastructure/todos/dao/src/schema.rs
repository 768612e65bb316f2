use sql_connection::SqlConnect;
use todo_errors::TodoResult;
use tracing::{info, instrument};

/// Tables for lists, tasks and priorities. Idempotent.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS priorities (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(20) NOT NULL,
    level INTEGER NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS lists (
    id BIGSERIAL PRIMARY KEY,
    user_id VARCHAR(64) NOT NULL,
    title VARCHAR(100) NOT NULL,
    description VARCHAR(255),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS lists_user_id_idx ON lists (user_id);

CREATE TABLE IF NOT EXISTS tasks (
    id BIGSERIAL PRIMARY KEY,
    list_id BIGINT NOT NULL REFERENCES lists (id) ON DELETE CASCADE,
    title VARCHAR(100) NOT NULL,
    description VARCHAR(255),
    priority_id BIGINT REFERENCES priorities (id) ON DELETE SET NULL,
    due_date DATE,
    is_completed BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS tasks_list_id_idx ON tasks (list_id);
";

#[instrument(skip_all)]
pub async fn ensure_schema(db: &SqlConnect) -> TodoResult<()> {
    let client = db.get_client().await?;
    client.batch_execute(SCHEMA).await?;
    info!("Schema is up to date");
    Ok(())
}
