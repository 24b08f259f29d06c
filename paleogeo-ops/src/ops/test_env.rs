//! In-memory collaborators for operation tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use paleogeo_core::{GeoTransform, Grid, ParamDef, ParamForm, ParamKind};

use crate::controller::EngineConfig;
use crate::env::{ArtifactKind, ArtifactWriter, LayerProvider, OpEnv, OutputPathValidator};
use crate::error::{OpsError, Result};
use crate::geoprocess::planar::PlanarToolbox;
use crate::geoprocess::MaskLayer;

/// A tiny in-memory project: named layers in, written artifacts out.
#[derive(Clone, Default)]
pub struct TestWorld {
    rasters: Arc<Mutex<HashMap<String, Grid>>>,
    masks: Arc<Mutex<HashMap<String, MaskLayer>>>,
    written_grids: Arc<Mutex<HashMap<PathBuf, Grid>>>,
    written_masks: Arc<Mutex<HashMap<PathBuf, MaskLayer>>>,
    rows: usize,
    cols: usize,
}

impl TestWorld {
    /// A world whose grids are `rows` x `cols` with a unit north-up
    /// transform (origin at the top-left, cell size 1).
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    /// A zeroed grid matching the world's shape and transform.
    pub fn template(&self) -> Grid {
        let mut grid = Grid::new(self.rows, self.cols);
        #[allow(clippy::cast_precision_loss)]
        grid.set_transform(GeoTransform {
            origin_x: 0.0,
            origin_y: self.rows as f64,
            cell_size: 1.0,
        });
        grid
    }

    pub fn add_raster(&mut self, name: &str, mut grid: Grid) {
        grid.set_transform(self.template().transform());
        self.rasters.lock().unwrap().insert(name.to_string(), grid);
    }

    pub fn add_mask(&mut self, name: &str, mask: MaskLayer) {
        self.masks.lock().unwrap().insert(name.to_string(), mask);
    }

    /// The grid written to `path`, panicking when nothing was written.
    pub fn written_grid(&self, path: &Path) -> Grid {
        self.written_grids
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| panic!("no grid written to {}", path.display()))
    }

    /// Number of grid artifacts written so far.
    pub fn written_count(&self) -> usize {
        self.written_grids.lock().unwrap().len()
    }

    /// Number of mask artifacts written so far.
    pub fn written_mask_count(&self) -> usize {
        self.written_masks.lock().unwrap().len()
    }

    /// A form with the given mandatory controls registered.
    pub fn form(&self, defs: &[(&'static str, ParamKind)]) -> ParamForm {
        let mut form = ParamForm::new();
        for &(name, kind) in defs {
            form.register(ParamDef::mandatory(name, kind)).unwrap();
        }
        form
    }
}

impl LayerProvider for TestWorld {
    fn raster(&self, name: &str) -> Result<Grid> {
        self.rasters
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| OpsError::Layer {
                name: name.to_string(),
                message: "not in test world".into(),
            })
    }

    fn mask(&self, name: &str) -> Result<MaskLayer> {
        self.masks
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| OpsError::Layer {
                name: name.to_string(),
                message: "not in test world".into(),
            })
    }
}

impl ArtifactWriter for TestWorld {
    fn write_grid(&self, path: &Path, grid: &Grid) -> Result<()> {
        self.written_grids
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), grid.clone());
        Ok(())
    }

    fn write_mask(&self, path: &Path, mask: &MaskLayer) -> Result<()> {
        self.written_masks
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), mask.clone());
        Ok(())
    }
}

struct AcceptAllPaths;

impl OutputPathValidator for AcceptAllPaths {
    fn validate(&self, _path: &Path, _kind: ArtifactKind) -> (bool, String) {
        (true, String::new())
    }
}

/// Builds an [`OpEnv`] wired to a test world and the planar toolbox.
pub fn env_with(world: &TestWorld) -> OpEnv {
    OpEnv {
        layers: Arc::new(world.clone()),
        geo: Arc::new(PlanarToolbox::new()),
        writer: Arc::new(world.clone()),
        validator: Arc::new(AcceptAllPaths),
        config: EngineConfig::default(),
    }
}
