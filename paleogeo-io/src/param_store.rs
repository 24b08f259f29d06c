//! Persisted parameter sets, one JSON file per operation.
//!
//! A snapshot saved under an operation's key can be restored into that
//! operation's form in a later session ("last used parameters").

use std::fs;
use std::path::{Path, PathBuf};

use paleogeo_core::ParameterSnapshot;

use crate::error::Result;

/// Stores parameter snapshots as JSON files under one directory.
#[derive(Debug, Clone)]
pub struct JsonParamStore {
    base_dir: PathBuf,
}

impl JsonParamStore {
    /// A store rooted at `base_dir`. The directory is created on the first
    /// save, not here.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// File path for a group key.
    pub fn path_for(&self, group: &str) -> PathBuf {
        self.base_dir.join(format!("{group}.json"))
    }

    /// Saves a snapshot under `group`, replacing any previous save.
    pub fn save(&self, group: &str, snapshot: &ParameterSnapshot) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let json = serde_json::to_vec_pretty(snapshot)?;
        fs::write(self.path_for(group), json)?;
        Ok(())
    }

    /// Loads the snapshot saved under `group`.
    pub fn load(&self, group: &str) -> Result<ParameterSnapshot> {
        let bytes = fs::read(self.path_for(group))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// True when a snapshot exists for `group`.
    pub fn contains(&self, group: &str) -> bool {
        self.path_for(group).is_file()
    }

    /// The store's base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
