//! Error types for the portfolio site backend.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by the chat session driver.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat session {0} not found")]
    SessionNotFound(Uuid),

    #[error("A previous message is still being processed")]
    Busy,

    #[error("Message content is empty")]
    EmptyInput,

    #[error("Chat turn aborted: {0}")]
    Aborted(String),
}

/// Failure of the lead hand-off to the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("Lead endpoint returned status {0}")]
    Status(u16),

    #[error("Lead request failed: {0}")]
    Transport(String),

    #[error("Lead storage failed: {0}")]
    Store(#[from] DatabaseError),
}

/// Outbound notification e-mail errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Send(String),
}

/// Request payload validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid document: {0}")]
    Malformed(String),
}

// ── HTTP mapping ────────────────────────────────────────────────────────

/// Error returned from HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { .. } => Self::not_found(e.to_string()),
            other => {
                tracing::error!(error = %other, "Database error while handling request");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        let status = match e {
            ChatError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Busy => StatusCode::CONFLICT,
            ChatError::EmptyInput => StatusCode::UNPROCESSABLE_ENTITY,
            ChatError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_errors_map_to_statuses() {
        let busy: ApiError = ChatError::Busy.into();
        assert_eq!(busy.status, StatusCode::CONFLICT);

        let missing: ApiError = ChatError::SessionNotFound(Uuid::new_v4()).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let empty: ApiError = ChatError::EmptyInput.into();
        assert_eq!(empty.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn database_errors_hide_internals() {
        let err: ApiError = DatabaseError::Query("SELECT exploded".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("exploded"));

        let missing: ApiError = DatabaseError::NotFound {
            entity: "lead".into(),
            id: "42".into(),
        }
        .into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_error_is_bad_request() {
        let err: ApiError = ValidationError::MissingField("email").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("email"));
    }
}
