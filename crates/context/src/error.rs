use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Query planning or execution error
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    /// Arrow array or batch error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No connection became free within the acquire timeout
    #[error("Timed out after {0:?} waiting for a store connection")]
    PoolTimeout(Duration),

    /// The operation exceeded the command timeout
    #[error("{operation} exceeded the command timeout of {timeout:?}")]
    CommandTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The store was closed
    #[error("Store is closed")]
    Closed,
}

/// Result type alias for StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
