//! Error types for the admission service.
//!
//! Validation itself never fails; these cover startup and serving.

use thiserror::Error;

use crate::features::FeatureGateError;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS material could not be loaded
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Server failed while serving
    #[error("Server error: {0}")]
    Server(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feature gate error: {0}")]
    FeatureGate(#[from] FeatureGateError),
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;
