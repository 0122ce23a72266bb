//! Error types for tasas

use thiserror::Error;

/// Main error type for tasas
#[derive(Error, Debug)]
pub enum TasasError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // The provider field must not be called `source`, thiserror reserves
    // that name for the error cause chain
    #[error("No rate for {currency} on {date} from {provider}")]
    MissingRate {
        currency: String,
        date: String,
        provider: String,
    },

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for TasasError {
    fn from(err: rusqlite::Error) -> Self {
        TasasError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for TasasError {
    fn from(err: toml::de::Error) -> Self {
        TasasError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TasasError {
    fn from(err: toml::ser::Error) -> Self {
        TasasError::Config(err.to_string())
    }
}

/// Result type alias for tasas operations
pub type Result<T> = std::result::Result<T, TasasError>;
