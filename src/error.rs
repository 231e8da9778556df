use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpsError>;

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Store query failed: {0}")]
    Store(#[from] surrealdb::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed upload: {0}")]
    MalformedInput(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not enough history: {0}")]
    InsufficientHistory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl OpsError {
    /// True for failures of the backing store rather than of the request.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, OpsError::Store(_) | OpsError::StoreUnavailable(_))
    }
}
