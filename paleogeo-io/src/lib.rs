//! File formats and disk-backed collaborators for the paleogeo engine.
//!
//! - [`grid_file`]: the `.pgg` binary elevation grid format,
//! - [`validate`]: output path rules shared by the operations and the CLI,
//! - [`workspace`]: a directory of layer files implementing the engine's
//!   host seams,
//! - [`param_store`]: saved parameter sets as JSON, one file per operation.

pub mod error;
pub mod grid_file;
pub mod param_store;
pub mod validate;
pub mod workspace;

pub use error::{IoError, Result};
pub use grid_file::{read_grid, write_grid};
pub use param_store::JsonParamStore;
pub use validate::{validate_output_path, PathRules};
pub use workspace::DiskWorkspace;
