//! Error types for paleogeo-core.

use thiserror::Error;

/// Result type alias for paleogeo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for paleogeo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid grid dimensions.
    #[error("invalid grid dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    /// Cell index outside the grid.
    #[error("cell ({row}, {col}) out of bounds for {rows}x{cols} grid")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Two grids that must share a shape do not.
    #[error("grid shape mismatch: {a_rows}x{a_cols} vs {b_rows}x{b_cols}")]
    ShapeMismatch {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },

    /// Malformed elevation formula text.
    #[error("cannot parse formula {text:?}: {reason}")]
    BadFormula { text: String, reason: String },

    /// Parameter capture/restore error.
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// Errors raised by the parameter form and snapshot machinery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    /// A mandatory parameter has no value at capture time.
    #[error("mandatory parameter '{name}' is not set")]
    Missing { name: String },

    /// A parameter name is not registered on the form.
    #[error("unknown parameter '{name}'")]
    Unknown { name: String },

    /// Two definitions share one name.
    #[error("duplicate parameter '{name}'")]
    Duplicate { name: String },

    /// A stored value's type tag does not match the registered kind.
    #[error("parameter '{name}' expects {expected} but the stored value is {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A referenced layer no longer resolves in the host project.
    #[error("layer '{layer}' not found in the project")]
    LayerNotFound { layer: String },
}
