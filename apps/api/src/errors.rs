use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Failures of the credential gate and the role filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing, malformed, tampered or expired credential.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The credential is valid but its subject no longer exists.
    #[error("Account not found")]
    NotFound,

    /// Blocked account or a role outside the operation's allow-set.
    #[error("Forbidden")]
    Forbidden,
}

/// Failures of the token meter and of payment settlement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Insufficient tokens: required {required}, current {current}")]
    InsufficientTokens { required: i64, current: i64 },

    #[error("Payment processing failed")]
    ProcessingFailed,
}

/// An I/O failure against the backing store.
#[derive(Debug, Error)]
pub enum StorageFault {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Account {0} does not exist")]
    MissingAccount(Uuid),

    #[error("An account with this email already exists")]
    DuplicateEmail,

    /// Raised by the in-memory store's fault injection.
    #[cfg(test)]
    #[error("Injected fault: {0}")]
    Injected(&'static str),
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Storage fault: {0}")]
    Storage(#[from] StorageFault),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut extra = Map::new();
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Auth(AuthError::Unauthenticated) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Auth(AuthError::NotFound) => (
                StatusCode::UNAUTHORIZED,
                "ACCOUNT_NOT_FOUND",
                "Account not found".to_string(),
            ),
            AppError::Auth(AuthError::Forbidden) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Payment(PaymentError::InsufficientTokens { required, current }) => {
                extra.insert("required".to_string(), json!(required));
                extra.insert("current".to_string(), json!(current));
                (
                    StatusCode::PAYMENT_REQUIRED,
                    "INSUFFICIENT_TOKENS",
                    "Insufficient tokens, top up your balance to continue".to_string(),
                )
            }
            AppError::Payment(PaymentError::ProcessingFailed) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PAYMENT_PROCESSING_FAILED",
                "Payment processing failed, please try again".to_string(),
            ),
            AppError::Storage(e) => {
                tracing::error!("Storage fault: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A temporary error occurred, please try again".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = Map::new();
        error.insert("code".to_string(), Value::from(code));
        error.insert("message".to_string(), Value::from(message));
        error.extend(extra);

        (status, Json(json!({ "error": error }))).into_response()
    }
}
