use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: String, message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Failure to reconstruct a verification outcome from an AI response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty content array in AI response")]
    EmptyContent,

    #[error("malformed verification JSON: {message}")]
    MalformedJson { message: String },
}

/// Errors raised by the history and transaction operations
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Validation failed: {message}")]
    Validation { code: ErrorCode, message: String },

    #[error("Not found: {message}")]
    NotFound { code: ErrorCode, message: String },

    #[error("Store error: {0}")]
    Store(#[from] StorageError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Unsupported export format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact write failed: {message}")]
    Artifact { message: String },
}

impl HistoryError {
    /// Shorthand for a validation failure.
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        HistoryError::Validation {
            code,
            message: message.into(),
        }
    }
}

/// Stable error codes exposed in the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingType,
    InvalidType,
    InvalidRequest,
    InvalidView,
    MissingFormat,
    UnsupportedFormat,
    MissingTransactionId,
    InvalidTransactionId,
    TransactionNotFound,
    OperationFailed,
    SerializationError,
    DatabaseError,
}

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingType => "MISSING_TYPE",
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::InvalidView => "INVALID_VIEW",
            ErrorCode::MissingFormat => "MISSING_FORMAT",
            ErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorCode::MissingTransactionId => "MISSING_TRANSACTION_ID",
            ErrorCode::InvalidTransactionId => "INVALID_TRANSACTION_ID",
            ErrorCode::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            ErrorCode::OperationFailed => "OPERATION_FAILED",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
        }
    }

    /// HTTP-equivalent status for the code.
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::TransactionNotFound => 404,
            ErrorCode::OperationFailed
            | ErrorCode::SerializationError
            | ErrorCode::DatabaseError => 500,
            _ => 400,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;
