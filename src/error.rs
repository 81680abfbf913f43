//! Error types for BasaltKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::protocol::FrameError;

/// Result type alias using BasaltError
pub type Result<T> = std::result::Result<T, BasaltError>;

/// Unified error type for BasaltKV operations
#[derive(Debug, Error)]
pub enum BasaltError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Protocol(#[from] FrameError),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
