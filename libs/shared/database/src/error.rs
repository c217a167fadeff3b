use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use shared_models::error::AppError;

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Empty result from {0}")]
    EmptyResult(String),

    #[error("Invalid header value")]
    InvalidHeader,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DatabaseError {
    pub fn from_response(status: StatusCode, body: String) -> Self {
        let code = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_string));

        if code.as_deref() == Some(UNIQUE_VIOLATION) {
            return DatabaseError::Conflict(body);
        }

        match status.as_u16() {
            401 | 403 => DatabaseError::Auth(body),
            404 => DatabaseError::NotFound(body),
            409 => DatabaseError::Conflict(body),
            other => DatabaseError::Api { status: other, message: body },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Auth(detail) => {
                warn!("Database refused access: {}", detail);
                AppError::Auth("Not authorized for this resource".to_string())
            }
            DatabaseError::NotFound(detail) => {
                warn!("Database row not found: {}", detail);
                AppError::NotFound("Resource not found".to_string())
            }
            DatabaseError::Conflict(detail) => {
                warn!("Database conflict: {}", detail);
                AppError::Conflict("Conflicts with an existing record".to_string())
            }
            other => AppError::Database(other.to_string()),
        }
    }
}
