//! Host-collaborator seams: layers in, artifacts out, path validation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use paleogeo_core::{Grid, ParameterSnapshot};

use crate::controller::EngineConfig;
use crate::error::{OpsError, Result};
use crate::geoprocess::{GeoProcessing, MaskLayer};
use crate::plan::OperationKind;

/// What kind of file an output path is expected to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Elevation grid.
    Raster,
    /// Polygon mask.
    Vector,
}

/// Source of project layers referenced by name in parameter snapshots.
pub trait LayerProvider: Send + Sync {
    /// Fetches a raster layer.
    fn raster(&self, name: &str) -> Result<Grid>;

    /// Fetches a vector mask layer.
    fn mask(&self, name: &str) -> Result<MaskLayer>;
}

/// Writes run artifacts. Implementations overwrite existing files.
pub trait ArtifactWriter: Send + Sync {
    /// Writes an elevation grid.
    fn write_grid(&self, path: &Path, grid: &Grid) -> Result<()>;

    /// Writes a mask layer (secondary polygon saves).
    fn write_mask(&self, path: &Path, mask: &MaskLayer) -> Result<()>;
}

/// Validates candidate output paths; `(false, message)` kills the run with
/// the returned message.
pub trait OutputPathValidator: Send + Sync {
    /// Checks `path` for the expected artifact kind.
    fn validate(&self, path: &Path, kind: ArtifactKind) -> (bool, String);
}

/// Everything an operation's plan builder needs from its surroundings.
#[derive(Clone)]
pub struct OpEnv {
    /// Project layers.
    pub layers: Arc<dyn LayerProvider>,
    /// Geoprocessing toolbox.
    pub geo: Arc<dyn GeoProcessing>,
    /// Artifact output.
    pub writer: Arc<dyn ArtifactWriter>,
    /// Output path validation.
    pub validator: Arc<dyn OutputPathValidator>,
    /// Engine configuration.
    pub config: EngineConfig,
}

impl OpEnv {
    /// Resolves and validates the output path for a run.
    ///
    /// Uses the snapshot's `param` value when present, otherwise the
    /// operation's default file name under the configured output directory
    /// (or the system temp directory). Validation failures and forbidden
    /// overwrites are user-input errors that reject the start.
    pub fn checked_output(
        &self,
        snapshot: &ParameterSnapshot,
        param: &str,
        kind: OperationKind,
    ) -> Result<PathBuf> {
        let path = match snapshot.value(param) {
            Some(_) => PathBuf::from(snapshot.output_path(param)?),
            None => self
                .config
                .default_output_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir)
                .join(kind.default_output_name()),
        };
        let (valid, message) = self.validator.validate(&path, ArtifactKind::Raster);
        if !valid {
            return Err(OpsError::InvalidOutputPath(message));
        }
        if !self.config.overwrite_outputs && path.exists() {
            return Err(OpsError::InvalidOutputPath(format!(
                "{} already exists and overwriting is disabled",
                path.display()
            )));
        }
        Ok(path)
    }
}

impl std::fmt::Debug for OpEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpEnv")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
