//! Error types for pollcast.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Value, json};
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Message shown to users for failures that are worth retrying.
const RETRY_MESSAGE: &str = "Something went wrong while talking to the server. Please try again.";

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Validation Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Poll not found: {0}")]
    PollNotFound(String),

    #[error("Option {option_id} not found in poll {poll_id}")]
    OptionNotFound { poll_id: String, option_id: String },

    #[error("You have already voted on poll {0}")]
    AlreadyVoted(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // === Transient I/O Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Vote storage error: {0}")]
    Storage(String),

    /// A profile fan-out stopped part way. `updated` records were patched before the failure.
    #[error("Profile propagation stopped after {updated} records: {message}")]
    PartialPropagation { updated: usize, message: String },

    // === Server Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) | Self::PollNotFound(_) | Self::OptionNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            Self::AlreadyVoted(_) => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,

            // 5xx Server Errors
            Self::Database(_)
            | Self::Redis(_)
            | Self::Storage(_)
            | Self::PartialPropagation { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::PollNotFound(_) => "POLL_NOT_FOUND",
            Self::OptionNotFound { .. } => "OPTION_NOT_FOUND",
            Self::AlreadyVoted(_) => "ALREADY_VOTED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::PartialPropagation { .. } => "PARTIAL_PROPAGATION",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Returns whether the failed operation may succeed if the caller tries again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Redis(_) | Self::Storage(_) | Self::PartialPropagation { .. }
        )
    }

    /// Message suitable for showing to an end user.
    ///
    /// Validation failures keep their specific wording; transient failures collapse into a
    /// generic retry hint so storage internals never reach the client.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PartialPropagation { updated, .. } => format!(
                "Your profile was copied to {updated} of your votes before an error. Please try again."
            ),
            Self::Database(_) | Self::Redis(_) | Self::Storage(_) => RETRY_MESSAGE.to_string(),
            Self::Config(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl AppError {
    /// JSON body sent to clients.
    ///
    /// `retryable` mirrors [`Self::is_transient`]. A partial propagation also
    /// reports how many records were `updated`.
    #[must_use]
    pub fn error_body(&self) -> Value {
        let mut error = json!({
            "code": self.error_code(),
            "message": self.user_message(),
            "retryable": self.is_transient(),
        });
        if let Self::PartialPropagation { updated, .. } = self {
            error["updated"] = json!(updated);
        }
        json!({ "error": error })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server errors
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        (status, Json(self.error_body())).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
