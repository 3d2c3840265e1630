use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failure to retrieve a listing from the origin. Every variant names the
/// source so callers can skip it and carry on with the rest of the batch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid source name: {source_name:?}")]
    InvalidSource { source_name: String },

    #[error("Request for r/{source_name} failed: {cause}")]
    Request {
        source_name: String,
        #[source]
        cause: reqwest::Error,
    },

    #[error("Request for r/{source_name} timed out")]
    Timeout { source_name: String },

    #[error("Rate limited while fetching r/{source_name}. Retry after {retry_after} seconds")]
    RateLimited {
        source_name: String,
        retry_after: u64,
    },

    #[error("r/{source_name} returned HTTP {status_code}")]
    Status {
        source_name: String,
        status_code: u16,
    },
}

impl FetchError {
    pub fn source_name(&self) -> &str {
        match self {
            FetchError::InvalidSource { source_name }
            | FetchError::Request { source_name, .. }
            | FetchError::Timeout { source_name }
            | FetchError::RateLimited { source_name, .. }
            | FetchError::Status { source_name, .. } => source_name,
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("Unexpected payload from r/{source_name}: {details}")]
pub struct ParseError {
    pub source_name: String,
    pub details: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("Item {} is malformed: {details}", .item_id.as_deref().unwrap_or("<unknown>"))]
    Malformed {
        item_id: Option<String>,
        details: String,
    },

    #[error("Item {} is missing required field `{field}`", .item_id.as_deref().unwrap_or("<unknown>"))]
    MissingField {
        item_id: Option<String>,
        field: &'static str,
    },

    #[error("Item {item_id} has an invalid creation timestamp: {value}")]
    InvalidTimestamp { item_id: String, value: f64 },
}

impl NormalizationError {
    pub fn item_id(&self) -> Option<&str> {
        match self {
            NormalizationError::Malformed { item_id, .. }
            | NormalizationError::MissingField { item_id, .. } => item_id.as_deref(),
            NormalizationError::InvalidTimestamp { item_id, .. } => Some(item_id),
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {reason}")]
    MigrationFailed { reason: String },

    #[error("Query execution failed: {query}")]
    QueryFailed { query: String },

    #[error("Write failed for post {id}: {reason}")]
    WriteFailed { id: String, reason: String },

    #[error("Store is unavailable")]
    Unavailable,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
