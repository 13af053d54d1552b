use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::{ConnAcquireErr, DbErr};
use serde::Serialize;

/// Seconds a client should wait before retrying after a `TIMEOUT` error.
const TIMEOUT_RETRY_AFTER_SECS: u64 = 1;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `NOT_AUTHORIZED`, `SCOPE_MISMATCH`, `PROFILE_INCOMPLETE`,
    /// `NOT_FOUND`, `STORAGE_ERROR`, `PERSISTENCE_ERROR`, `TIMEOUT`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Missing required fields: title, file")]
    pub message: String,
    /// Offending fields, for validation errors that concern specific inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl ErrorBody {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: None,
        }
    }
}

/// Application-level error type.
///
/// Validation and authorization errors carry caller-facing messages.
/// Storage, persistence and internal errors carry details that are logged
/// and replaced with a generic message on the wire.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    MissingFields(Vec<String>),
    TokenMissing,
    TokenInvalid,
    NotAuthorized(String),
    ScopeMismatch,
    ProfileIncomplete(String),
    NotFound(String),
    Storage(String),
    Persistence(String),
    /// A store or database call exceeded its deadline. Retryable.
    Timeout(String),
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code of this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::MissingFields(_) => "VALIDATION_ERROR",
            AppError::TokenMissing => "TOKEN_MISSING",
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::NotAuthorized(_) => "NOT_AUTHORIZED",
            AppError::ScopeMismatch => "SCOPE_MISMATCH",
            AppError::ProfileIncomplete(_) => "PROFILE_INCOMPLETE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let code = self.code();
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(code, msg)),
            AppError::MissingFields(fields) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code,
                    message: format!("Missing required fields: {}", fields.join(", ")),
                    fields: Some(fields),
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new(code, "Authentication required"),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new(code, "Invalid or expired token"),
            ),
            AppError::NotAuthorized(msg) => (StatusCode::FORBIDDEN, ErrorBody::new(code, msg)),
            AppError::ScopeMismatch => (
                StatusCode::FORBIDDEN,
                ErrorBody::new(code, "Document does not belong to your university"),
            ),
            AppError::ProfileIncomplete(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorBody::new(code, msg))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new(code, msg)),
            AppError::Storage(detail) => {
                tracing::error!("Storage error: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody::new(code, "File storage is unavailable"),
                )
            }
            AppError::Persistence(detail) => {
                tracing::error!("Persistence error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(code, "Could not save or load data"),
                )
            }
            AppError::Timeout(detail) => {
                tracing::warn!("Timeout: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody::new(code, "The operation timed out, please retry"),
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(code, "An unexpected error occurred"),
                )
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(msg)
            | AppError::NotAuthorized(msg)
            | AppError::ProfileIncomplete(msg)
            | AppError::NotFound(msg)
            | AppError::Storage(msg)
            | AppError::Persistence(msg)
            | AppError::Timeout(msg)
            | AppError::Internal(msg) => write!(f, "{}: {msg}", self.code()),
            AppError::MissingFields(fields) => {
                write!(f, "{}: missing {}", self.code(), fields.join(", "))
            }
            AppError::TokenMissing | AppError::TokenInvalid | AppError::ScopeMismatch => {
                f.write_str(self.code())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = matches!(self, AppError::Timeout(_));
        let (status, body) = self.status_and_body();

        if retryable {
            (
                status,
                [("Retry-After", TIMEOUT_RETRY_AFTER_SECS.to_string())],
                Json(body),
            )
                .into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(ConnAcquireErr::Timeout) => {
                AppError::Timeout("database connection acquire".into())
            }
            other => AppError::Persistence(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => AppError::NotFound("File not found".into()),
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            StorageError::SizeLimitExceeded { limit, .. } => {
                AppError::Validation(format!("File exceeds maximum size of {limit} bytes"))
            }
            StorageError::Timeout(secs) => {
                AppError::Timeout(format!("storage call exceeded {secs}s"))
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}
