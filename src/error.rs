//! Error types for the QRate UDP proxy
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias using ProxyError
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Unified error type for proxy operations
#[derive(Debug, Error)]
pub enum ProxyError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Wire Format Errors
    // -------------------------------------------------------------------------
    /// Undersized record, bad magic or unknown command
    #[error("Format error: {0}")]
    Format(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("TLS error: {0}")]
    Tls(String),

    /// The backend spoke something that is not the expected RPC protocol
    #[error("RPC protocol error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    // -------------------------------------------------------------------------
    // Client-side Errors
    // -------------------------------------------------------------------------
    /// Error reply received from the gateway
    #[error("Gateway replied with error {result_code}: {message} (retry after {retry_after}s)")]
    Remote {
        result_code: i16,
        message: String,
        retry_after: f64,
    },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Invalid gateway state: {0}")]
    State(String),
}
