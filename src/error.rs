use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the whole logical operation can be re-run against fresh state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

// SQLSTATE codes that carry meaning for callers
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if matches!(e, sqlx::Error::RowNotFound) {
            return AppError::NotFound("Row not found".to_string());
        }
        if matches!(
            e,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
        ) {
            return AppError::StorageFailure(e.to_string());
        }

        let classified = e.as_database_error().map(|db| {
            (
                db.code().map(|code| code.into_owned()),
                db.message().to_string(),
            )
        });

        match classified {
            Some((Some(code), message)) => match code.as_str() {
                UNIQUE_VIOLATION => AppError::Conflict(message),
                FOREIGN_KEY_VIOLATION => AppError::NotFound(message),
                SERIALIZATION_FAILURE | DEADLOCK_DETECTED => AppError::StorageFailure(message),
                _ => AppError::Database(e),
            },
            _ => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                "Internal server error".to_string()
            }
            AppError::StorageFailure(ref message) => {
                tracing::warn!("Storage failure: {}", message);
                "Storage temporarily unavailable, try again".to_string()
            }
            AppError::Authorization(message)
            | AppError::NotFound(message)
            | AppError::InvalidInput(message)
            | AppError::Conflict(message) => message,
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Validation helper
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut error_messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error.message.as_ref().unwrap_or(&"Invalid value".into())
                    )
                })
            })
            .collect();
        error_messages.sort();

        AppError::InvalidInput(error_messages.join(", "))
    }
}

/// Unwraps an optional request field, reporting its absence as bad input.
pub fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| AppError::InvalidInput(format!("{} is required", field)))
}

/// Narrows a storage count or sum into the `i32` counters the models carry.
pub fn to_counter(value: i64, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| AppError::Internal(format!("{} out of range: {}", what, value)))
}
