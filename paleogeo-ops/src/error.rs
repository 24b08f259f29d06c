//! Error types for paleogeo-ops.

use thiserror::Error;

/// Result type alias for operation-engine calls.
pub type Result<T> = std::result::Result<T, OpsError>;

/// Errors raised while building or executing an operation.
#[derive(Error, Debug)]
pub enum OpsError {
    /// Core-level error (grid shapes, formulas).
    #[error(transparent)]
    Core(#[from] paleogeo_core::Error),

    /// Parameter capture or lookup failed.
    #[error(transparent)]
    Parameter(#[from] paleogeo_core::ParameterError),

    /// A list parameter was captured but holds no usable entries.
    #[error("parameter '{name}' lists no usable layers")]
    EmptyInput { name: &'static str },

    /// A host layer could not be fetched.
    #[error("layer '{name}': {message}")]
    Layer { name: String, message: String },

    /// A geoprocessing service call failed.
    #[error("{service} failed: {message}")]
    Geoprocessing {
        service: &'static str,
        message: String,
    },

    /// The candidate output path was rejected.
    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    /// Writing or loading an artifact failed.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OpsError {
    /// Shorthand for a geoprocessing failure.
    pub fn geoprocessing(service: &'static str, message: impl Into<String>) -> Self {
        OpsError::Geoprocessing {
            service,
            message: message.into(),
        }
    }
}
