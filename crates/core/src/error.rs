//! Error types for the core library

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {0} already has a change in flight")]
    Busy(String),

    #[error("Seed import failed: {0}")]
    Seed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the UI can carry on after showing this error.
    ///
    /// Only a broken configuration stops the application from starting.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    /// Whether the store should re-read the gateway to drop stale records
    pub fn requires_refresh(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
