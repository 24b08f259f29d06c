//! The paleogeography-editing operations, as plan builders.
//!
//! Each module exposes a `plan(&ParameterSnapshot, &OpEnv)` (or a small set
//! of them) returning an [`OperationPlan`](crate::plan::OperationPlan).
//! Builders do all user-input validation up front so a bad start is
//! rejected before a worker is spawned; the heavy lifting happens inside
//! the step bodies on the worker thread.

pub mod artefacts;
pub mod compile;
pub mod features;
pub mod shoreline;
pub mod standard;
pub mod topo_modify;

use std::sync::{Arc, Mutex, MutexGuard};

use paleogeo_core::Grid;

/// Mutable state threaded through the steps of one plan.
///
/// Steps run strictly in order on one worker thread; the mutex only
/// satisfies `Send` bounds, it is never contended.
#[derive(Debug, Clone, Default)]
pub(crate) struct Stage {
    inner: Arc<Mutex<StageInner>>,
}

#[derive(Debug, Default)]
pub(crate) struct StageInner {
    /// The grid being edited.
    pub grid: Option<Grid>,
    /// Rasterized mask (1.0 inside) aligned with `grid`.
    pub mask: Option<Grid>,
    /// Scratch grid (distance fields, copy sources).
    pub scratch: Option<Grid>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, StageInner> {
        self.inner.lock().expect("stage lock poisoned")
    }
}

impl StageInner {
    /// The working grid, which an earlier step must have produced.
    pub fn grid(&self) -> Result<&Grid, crate::error::OpsError> {
        self.grid
            .as_ref()
            .ok_or_else(|| crate::error::OpsError::Artifact("no working grid staged".into()))
    }

    /// The rasterized mask, which an earlier step must have produced.
    pub fn mask(&self) -> Result<&Grid, crate::error::OpsError> {
        self.mask
            .as_ref()
            .ok_or_else(|| crate::error::OpsError::Artifact("no mask staged".into()))
    }
}

#[cfg(test)]
pub(crate) mod test_env;
