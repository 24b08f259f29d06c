//! Modify Topo/Bathymetry: rewrite elevations inside mask polygons.
//!
//! Two variants share one plan shape: a formula over the current elevation
//! (`H*0.5+120`), or a linear rescale of the in-mask value range to a
//! target `[min, max]`.

use paleogeo_core::{Formula, ParameterSnapshot};

use super::Stage;
use crate::env::OpEnv;
use crate::error::{OpsError, Result};
use crate::plan::{OperationKind, OperationPlan, ProcessingStep};

/// Parameter names used by this operation.
pub mod params {
    /// Base raster layer.
    pub const BASE: &str = "base";
    /// `(layer, enabled)` mask pairs; only enabled masks apply.
    pub const MASKS: &str = "masks";
    /// Formula variant: expression over `H`.
    pub const FORMULA: &str = "formula";
    /// Rescale variant: new minimum.
    pub const NEW_MIN: &str = "new_min";
    /// Rescale variant: new maximum.
    pub const NEW_MAX: &str = "new_max";
    /// Output path.
    pub const OUTPUT: &str = "output";
}

/// How in-mask elevations are rewritten.
#[derive(Debug, Clone, Copy)]
enum Modification {
    Formula(Formula),
    Rescale { new_min: f64, new_max: f64 },
}

/// Builds the modify plan from a captured snapshot.
///
/// The formula variant wins when both are present; a malformed formula or
/// an inverted rescale range is a user-input error that rejects the start.
pub fn plan(snapshot: &ParameterSnapshot, env: &OpEnv) -> Result<OperationPlan> {
    let kind = OperationKind::ModifyTopoBathy;
    let base = snapshot.layer(params::BASE)?.to_string();
    let masks: Vec<String> = snapshot
        .layer_flags(params::MASKS)?
        .iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| name.clone())
        .collect();
    if masks.is_empty() {
        return Err(OpsError::EmptyInput {
            name: params::MASKS,
        });
    }

    let modification = if snapshot.value(params::FORMULA).is_some() {
        Modification::Formula(Formula::parse(snapshot.formula(params::FORMULA)?)?)
    } else {
        let new_min = snapshot.number(params::NEW_MIN)?;
        let new_max = snapshot.number(params::NEW_MAX)?;
        if new_min >= new_max {
            return Err(OpsError::Artifact(format!(
                "rescale range is empty: [{new_min}, {new_max}]"
            )));
        }
        Modification::Rescale { new_min, new_max }
    };
    let output = env.checked_output(snapshot, params::OUTPUT, kind)?;

    let stage = Stage::new();
    let mut plan = OperationPlan::new(kind, Some(output.clone()));

    plan.push(ProcessingStep::essential("load base raster", 15, {
        let stage = stage.clone();
        let env = env.clone();
        move |_ctx| {
            stage.lock().grid = Some(env.layers.raster(&base)?);
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("rasterize masks", 25, {
        let stage = stage.clone();
        let env = env.clone();
        move |ctx| {
            let template = stage.lock().grid()?.clone();
            let mut layers = Vec::with_capacity(masks.len());
            for name in &masks {
                if ctx.canceled() {
                    return Ok(());
                }
                let mask = env.layers.mask(name)?;
                layers.push(env.geo.fix_geometry(&mask)?);
            }
            let merged = env.geo.merge(&layers)?;
            stage.lock().mask = Some(env.geo.rasterize(&merged, &template)?);
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("modify elevations", 40, {
        let stage = stage.clone();
        move |ctx| {
            let mut guard = stage.lock();
            let mask = guard.mask()?.clone();
            let grid = guard.grid.as_mut().ok_or_else(|| {
                OpsError::Artifact("no working grid staged".into())
            })?;
            let changed = apply_modification(grid, &mask, modification);
            ctx.feedback
                .info(format!("Modified {changed} in-mask cells"));
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("write output", 20, {
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

/// Rewrites in-mask cells and returns how many changed.
fn apply_modification(
    grid: &mut paleogeo_core::Grid,
    mask: &paleogeo_core::Grid,
    modification: Modification,
) -> usize {
    let in_mask = |value: &f64, flag: &f64| *flag == 1.0 && !value.is_nan();

    match modification {
        Modification::Formula(formula) => {
            let mut changed = 0;
            for (value, flag) in grid.array_mut().iter_mut().zip(mask.array().iter()) {
                if in_mask(value, flag) {
                    *value = formula.apply(*value);
                    changed += 1;
                }
            }
            changed
        }
        Modification::Rescale { new_min, new_max } => {
            let (mut old_min, mut old_max) = (f64::INFINITY, f64::NEG_INFINITY);
            for (value, flag) in grid.array().iter().zip(mask.array().iter()) {
                if in_mask(value, flag) {
                    old_min = old_min.min(*value);
                    old_max = old_max.max(*value);
                }
            }
            if old_min > old_max {
                return 0; // mask covers no data cells
            }
            let old_span = (old_max - old_min).max(f64::EPSILON);
            let mut changed = 0;
            for (value, flag) in grid.array_mut().iter_mut().zip(mask.array().iter()) {
                if in_mask(value, flag) {
                    *value = new_min + (*value - old_min) / old_span * (new_max - new_min);
                    changed += 1;
                }
            }
            changed
        }
    }
}
