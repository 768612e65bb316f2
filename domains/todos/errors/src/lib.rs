use common_errors::AppError;
use sql_connection::{PgError, PoolError as DbPoolError};
use thiserror::Error;
use todo_commands::ValidationError;
use todo_models::{Entity, InvalidOwnerId};

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum TodoError {
    /// Absent, or owned by someone else. Callers cannot tell which.
    #[error("{entity} not found")]
    NotFound { entity: Entity },
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid owner: {0}")]
    InvalidOwner(#[from] InvalidOwnerId),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Database error: {0}")]
    Database(PgError),
    #[error("Database Pool error: {0}")]
    DatabasePool(#[from] DbPoolError),
}

impl TodoError {
    pub fn not_found(entity: Entity) -> Self { Self::NotFound { entity } }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }

    /// The durable store could not serve the request at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::Database(_) | Self::DatabasePool(_)
        )
    }
}

impl From<PgError> for TodoError {
    fn from(err: PgError) -> Self {
        let unique = err
            .code()
            .is_some_and(|state| state.code() == UNIQUE_VIOLATION);
        if unique {
            let detail = err
                .as_db_error()
                .and_then(|db| db.constraint())
                .unwrap_or("unique")
                .to_string();
            Self::ConstraintViolation(detail)
        }
        else {
            Self::Database(err)
        }
    }
}

impl From<TodoError> for AppError {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::NotFound { entity } => {
                AppError::not_found(
                    &format!("{}_NOT_FOUND", entity.to_string().to_uppercase()),
                    &format!("{entity} not found"),
                )
            }
            TodoError::Validation(e) => {
                AppError::bad_request_with_details(
                    "VALIDATION_FAILED",
                    &e.message,
                    e.field,
                )
            }
            TodoError::InvalidOwner(e) => {
                AppError::bad_request("INVALID_OWNER", &e.to_string())
            }
            TodoError::ConstraintViolation(detail) => {
                tracing::debug!(constraint = %detail, "Constraint violation");
                AppError::conflict(
                    "CONSTRAINT_VIOLATION",
                    "The request conflicts with existing data",
                )
            }
            TodoError::StoreUnavailable(_)
            | TodoError::Database(_)
            | TodoError::DatabasePool(_) => AppError::internal_server_error(&err),
        }
    }
}

pub type TodoResult<T> = Result<T, TodoError>;
