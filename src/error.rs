//! Error types for Promobot

use thiserror::Error;

use crate::face::FaceSourceError;

/// Top-level error type.
///
/// Gateway failures never show up here: the walker, bypass and greeting code
/// recover from them locally. Only startup faults reach the caller.
#[derive(Error, Debug)]
pub enum PromoterError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML configuration
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The face event source could not be started
    #[error("Face event source error: {0}")]
    FaceSource(#[from] FaceSourceError),

    /// The operator interrupt handler could not be installed
    #[error("Signal handler error: {0}")]
    Signal(String),
}

impl From<ctrlc::Error> for PromoterError {
    fn from(e: ctrlc::Error) -> Self {
        PromoterError::Signal(e.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, PromoterError>;
