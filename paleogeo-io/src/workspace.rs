//! A directory of layer files as the engine's host project.
//!
//! Layers live as `<name>.pgg` grids and `<name>.pgv` mask files (JSON)
//! directly under the workspace root. This is the standalone counterpart
//! of a GIS project: the CLI plugs it into an [`OpEnv`]
//! (`paleogeo_ops::OpEnv`) for all three collaborator seams.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use paleogeo_core::Grid;
use paleogeo_ops::geoprocess::planar::PlanarToolbox;
use paleogeo_ops::{
    ArtifactWriter, EngineConfig, LayerProvider, MaskLayer, OpEnv, OpsError,
};

use crate::grid_file;
use crate::validate::PathRules;

/// Disk-backed layer store rooted at one directory.
#[derive(Debug, Clone)]
pub struct DiskWorkspace {
    root: PathBuf,
}

impl DiskWorkspace {
    /// Opens a workspace rooted at `root`. The directory is not scanned up
    /// front; layers are resolved per request.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the grid file backing a raster layer name.
    pub fn raster_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.pgg"))
    }

    /// Path of the mask file backing a vector layer name.
    pub fn mask_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.pgv"))
    }

    /// Assembles an [`OpEnv`] over this workspace with the planar toolbox
    /// and file-extension path rules.
    pub fn env(&self, config: EngineConfig) -> OpEnv {
        let shared = Arc::new(self.clone());
        OpEnv {
            layers: shared.clone(),
            geo: Arc::new(PlanarToolbox::new()),
            writer: shared,
            validator: Arc::new(PathRules),
            config,
        }
    }
}

impl LayerProvider for DiskWorkspace {
    fn raster(&self, name: &str) -> Result<Grid, OpsError> {
        grid_file::read_grid(&self.raster_path(name)).map_err(|err| OpsError::Layer {
            name: name.to_string(),
            message: err.to_string(),
        })
    }

    fn mask(&self, name: &str) -> Result<MaskLayer, OpsError> {
        let path = self.mask_path(name);
        let bytes = std::fs::read(&path).map_err(|err| OpsError::Layer {
            name: name.to_string(),
            message: err.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|err| OpsError::Layer {
            name: name.to_string(),
            message: err.to_string(),
        })
    }
}

impl ArtifactWriter for DiskWorkspace {
    fn write_grid(&self, path: &Path, grid: &Grid) -> Result<(), OpsError> {
        grid_file::write_grid(path, grid).map_err(|err| OpsError::Artifact(err.to_string()))
    }

    fn write_mask(&self, path: &Path, mask: &MaskLayer) -> Result<(), OpsError> {
        let json =
            serde_json::to_vec_pretty(mask).map_err(|err| OpsError::Artifact(err.to_string()))?;
        std::fs::write(path, json).map_err(|err| OpsError::Artifact(err.to_string()))
    }
}
