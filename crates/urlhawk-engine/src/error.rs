//! Error types for the urlhawk-engine crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown probe: {name}")]
    UnknownProbe { name: String },

    #[error("Probe name is reserved: {name}")]
    ReservedName { name: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("TLS setup error: {0}")]
    Tls(String),

    #[error("Core error: {0}")]
    Core(#[from] urlhawk_core::HawkError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
