//! Remove Artefacts: void suspicious cells inside masks and re-interpolate.
//!
//! The user outlines artefacts (spikes, seams, reconstruction noise) with
//! polygons and picks a comparison; matching in-mask cells are set to
//! no-data and refilled from their surroundings. While a run is pending,
//! additional polygons can be queued on the [`ArtefactSession`] instead of
//! starting a second run.

use std::sync::{Arc, Mutex};

use paleogeo_core::ParameterSnapshot;

use super::Stage;
use crate::env::OpEnv;
use crate::error::{OpsError, Result};
use crate::geoprocess::MaskLayer;
use crate::plan::{OperationKind, OperationPlan, ProcessingStep};

/// Parameter names used by this operation.
pub mod params {
    /// Base raster layer.
    pub const BASE: &str = "base";
    /// `(layer, enabled)` artefact mask pairs.
    pub const MASKS: &str = "masks";
    /// Comparison threshold in meters.
    pub const THRESHOLD: &str = "threshold";
    /// Remove cells above the threshold (below when false).
    pub const ABOVE: &str = "above";
    /// Interpolation reach in cells.
    pub const FILL_DISTANCE: &str = "fill_distance";
    /// Output path.
    pub const OUTPUT: &str = "output";
}

/// Collects artefact polygons added while a run is already active.
///
/// A second start request is a no-op on the controller; the incremental
/// workflow queues masks here and the next plan build drains them.
#[derive(Debug, Clone, Default)]
pub struct ArtefactSession {
    pending: Arc<Mutex<Vec<MaskLayer>>>,
}

impl ArtefactSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one more artefact mask for the next run.
    pub fn queue_mask(&self, mask: MaskLayer) {
        self.pending.lock().expect("session lock poisoned").push(mask);
    }

    /// Number of queued masks.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("session lock poisoned").len()
    }

    fn drain(&self) -> Vec<MaskLayer> {
        std::mem::take(&mut *self.pending.lock().expect("session lock poisoned"))
    }
}

/// Builds the artefact-removal plan, draining any queued session masks.
pub fn plan(
    snapshot: &ParameterSnapshot,
    env: &OpEnv,
    session: &ArtefactSession,
) -> Result<OperationPlan> {
    let kind = OperationKind::RemoveArtefacts;
    let base = snapshot.layer(params::BASE)?.to_string();
    let mask_names: Vec<String> = snapshot
        .layer_flags(params::MASKS)?
        .iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| name.clone())
        .collect();
    let queued = session.drain();
    if mask_names.is_empty() && queued.is_empty() {
        return Err(OpsError::EmptyInput {
            name: params::MASKS,
        });
    }
    let threshold = snapshot.number_or(params::THRESHOLD, 0.0)?;
    let above = snapshot.bool_or(params::ABOVE, true)?;
    let fill_distance = snapshot.number_or(params::FILL_DISTANCE, 20.0)?;
    let output = env.checked_output(snapshot, params::OUTPUT, kind)?;

    let stage = Stage::new();
    let merged_mask = Arc::new(Mutex::new(None::<MaskLayer>));
    let mut plan = OperationPlan::new(kind, Some(output.clone()));

    plan.push(ProcessingStep::essential("collect artefact masks", 25, {
        let stage = stage.clone();
        let env = env.clone();
        let merged_mask = merged_mask.clone();
        move |ctx| {
            let grid = env.layers.raster(&base)?;
            let mut layers = queued.clone();
            for name in &mask_names {
                if ctx.canceled() {
                    return Ok(());
                }
                layers.push(env.geo.fix_geometry(&env.layers.mask(name)?)?);
            }
            let merged = env.geo.merge(&layers)?;
            let mask = env.geo.rasterize(&merged, &grid)?;
            *merged_mask.lock().expect("mask lock poisoned") = Some(merged);
            let mut guard = stage.lock();
            guard.grid = Some(grid);
            guard.mask = Some(mask);
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("void matching cells", 25, {
        let stage = stage.clone();
        move |ctx| {
            let mut guard = stage.lock();
            let mask = guard.mask()?.clone();
            let grid = guard
                .grid
                .as_mut()
                .ok_or_else(|| OpsError::Artifact("no working grid staged".into()))?;
            let mut voided = 0usize;
            for (value, flag) in grid.array_mut().iter_mut().zip(mask.array().iter()) {
                if *flag != 1.0 || value.is_nan() {
                    continue;
                }
                let matches = if above {
                    *value > threshold
                } else {
                    *value < threshold
                };
                if matches {
                    *value = f64::NAN;
                    voided += 1;
                }
            }
            ctx.feedback.info(format!("Voided {voided} artefact cells"));
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("interpolate voids", 30, {
        let stage = stage.clone();
        let env = env.clone();
        move |_ctx| {
            let current = stage.lock().grid()?.clone();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let reach = fill_distance.max(0.0) as usize;
            let filled = env.geo.fill_nodata(&current, reach)?;
            stage.lock().grid = Some(filled);
            Ok(())
        }
    }));

    plan.push(ProcessingStep::best_effort("save artefact polygons", 5, {
        let env = env.clone();
        let merged_mask = merged_mask.clone();
        let polygon_path = output.with_extension("pgv");
        move |_ctx| {
            let guard = merged_mask.lock().expect("mask lock poisoned");
            let mask = guard
                .as_ref()
                .ok_or_else(|| OpsError::Artifact("no merged mask staged".into()))?;
            env.writer.write_mask(&polygon_path, mask)?;
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("write output", 15, {
        let stage = stage.clone();
        let env = env.clone();
        move |_ctx| {
            let guard = stage.lock();
            env.writer.write_grid(&output, guard.grid()?)?;
            Ok(())
        }
    }));

    Ok(plan)
}
