//! Error types for paleogeo-io.

use thiserror::Error;

/// Result type alias for I/O-layer calls.
pub type Result<T> = std::result::Result<T, IoError>;

/// Errors raised while reading or writing paleogeo files.
#[derive(Error, Debug)]
pub enum IoError {
    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the grid magic.
    #[error("not a paleogeo grid file (magic {found:?})")]
    BadMagic { found: [u8; 4] },

    /// The file is shorter than its header promises.
    #[error("truncated grid file: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    /// A grid too large for the on-disk header.
    #[error("grid of {rows}x{cols} cells exceeds the format limits")]
    TooLarge { rows: usize, cols: usize },

    /// Malformed JSON payload (masks, parameter sets).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core-level error while rebuilding a grid.
    #[error(transparent)]
    Core(#[from] paleogeo_core::Error),
}
