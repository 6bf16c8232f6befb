//! Error types for the adapter core

use thiserror::Error;

/// Errors surfaced by the adapter
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Transport failure in the serial driver
    #[error("Driver error: {0}")]
    Driver(#[from] deconz_driver::DriverError),

    /// Transport failure with operation context
    #[error("{0}")]
    Transport(String),

    /// No correlated indication arrived within the wait window
    #[error("waiting for response TIMEOUT")]
    ResponseTimeout,

    /// A waitress future expired before a matching payload arrived
    #[error("Timeout - {0}")]
    WaitTimeout(String),

    /// ZDP response carried a non-zero status byte
    #[error("status: {0}")]
    Status(u8),

    /// Operation the coordinator does not implement
    #[error("not supported")]
    NotSupported,

    /// A response that cannot be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// IO error (configuration loading)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration loading)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
