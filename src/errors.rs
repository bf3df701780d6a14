use serde::Serialize;
use std::fmt;
use tracing::error;

/// Error taxonomy of the ledger core.
///
/// Every operation returns exactly one outcome: a value or one of these.
/// `RaceLost` is the only kind a caller should retry without changing input
/// (bounded, with backoff); `Unavailable` is retryable I/O; the rest are
/// terminal for the given input.
#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFound(String),
    Conflict(String),
    RaceLost(String),
    Unavailable(String),
}

/// Standard error payload handed to the embedding layer.
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error type code (e.g., "VALIDATION_ERROR", "NOT_FOUND")
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

impl AppError {
    /// Machine-readable code for the embedding layer's status mapping.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::RaceLost(_) => "RACE_LOST",
            AppError::Unavailable(_) => "UNAVAILABLE",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::RaceLost(msg)
            | AppError::Unavailable(msg) => msg,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.code().to_string(),
            message: self.message().to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            AppError::NotFound(msg) => write!(f, "Not found: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::RaceLost(msg) => write!(f, "Race lost: {msg}"),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

// Convenience conversion from sqlx::Error. Unique-violation mapping is
// constraint-sensitive: losing the single-default swap is retryable, a
// duplicate name is not.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                let constraint = db_err.constraint().unwrap_or_default();
                if constraint.contains("default") {
                    AppError::RaceLost("Default category changed concurrently, retry".to_string())
                } else if constraint.contains("name") {
                    AppError::Conflict("A category with this name already exists".to_string())
                } else {
                    AppError::Conflict(db_err.message().to_string())
                }
            }
            _ => {
                error!("database error: {err}");
                AppError::Unavailable(err.to_string())
            }
        }
    }
}
