use crate::error::*;
use std::fmt::Display;
use std::time::Duration;
use tracing::{error, warn};

pub trait ErrorExt: Display {
    fn error_code(&self) -> String;

    fn log_error(&self) -> &Self {
        error!(code = %self.error_code(), "{}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = %self.error_code(), "{}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl ErrorExt for CoreError {
    fn log_warn(&self) -> &Self {
        match self {
            CoreError::Fetch(e) => {
                e.log_warn();
            }
            _ => {
                warn!(code = %self.error_code(), "CoreError (warning): {}", self);
            }
        }
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Fetch(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Fetch(e) => e.retry_after(),
            _ => None,
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Fetch(e) => e.error_code(),
            CoreError::Parse(_) => "PARSE".to_string(),
            CoreError::Normalization(e) => e.error_code(),
            CoreError::Persistence(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for FetchError {
    fn log_warn(&self) -> &Self {
        warn!(
            source_name = %self.source_name(),
            code = %self.error_code(),
            "FetchError (warning): {}",
            self
        );
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited { .. } => true,
            FetchError::Timeout { .. } => true,
            FetchError::Status { status_code, .. } => *status_code >= 500,
            FetchError::Request { cause, .. } => cause.is_connect() || cause.is_timeout(),
            FetchError::InvalidSource { .. } => false,
        }
    }

    /// How long the origin asked us to stay away. Only 429s carry a hint.
    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after, .. } => Some(Duration::from_secs(*retry_after)),
            _ => None,
        }
    }

    fn error_code(&self) -> String {
        match self {
            FetchError::InvalidSource { .. } => "FETCH_INVALID_SOURCE".to_string(),
            FetchError::Request { .. } => "FETCH_REQUEST_FAILED".to_string(),
            FetchError::Timeout { .. } => "FETCH_TIMEOUT".to_string(),
            FetchError::RateLimited { .. } => "FETCH_RATE_LIMIT".to_string(),
            FetchError::Status { .. } => "FETCH_HTTP_STATUS".to_string(),
        }
    }
}

impl ErrorExt for NormalizationError {
    fn log_warn(&self) -> &Self {
        warn!(
            item_id = ?self.item_id(),
            code = %self.error_code(),
            "Dropping item: {}",
            self
        );
        self
    }

    fn error_code(&self) -> String {
        match self {
            NormalizationError::Malformed { .. } => "NORMALIZE_MALFORMED".to_string(),
            NormalizationError::MissingField { .. } => "NORMALIZE_MISSING_FIELD".to_string(),
            NormalizationError::InvalidTimestamp { .. } => {
                "NORMALIZE_INVALID_TIMESTAMP".to_string()
            }
        }
    }
}

impl ErrorExt for PersistenceError {
    fn error_code(&self) -> String {
        match self {
            PersistenceError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            PersistenceError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            PersistenceError::QueryFailed { .. } => "DB_QUERY_FAILED".to_string(),
            PersistenceError::WriteFailed { .. } => "DB_WRITE_FAILED".to_string(),
            PersistenceError::Unavailable => "DB_UNAVAILABLE".to_string(),
            PersistenceError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}
