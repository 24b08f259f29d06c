//! Standard Processing: the small maintenance edits between the big ones.
//!
//! Three plans share the load/process/write shape: focal-mean smoothing,
//! gap interpolation, and copy-paste of in-mask cells from another grid.

use paleogeo_core::{Grid, ParameterSnapshot};
use rayon::prelude::*;

use super::Stage;
use crate::env::OpEnv;
use crate::error::{OpsError, Result};
use crate::plan::{OperationKind, OperationPlan, ProcessingStep};

/// Parameter names used by this operation.
pub mod params {
    /// Base raster layer.
    pub const BASE: &str = "base";
    /// Smoothing window radius in cells (window edge is `2r + 1`).
    pub const RADIUS: &str = "radius";
    /// Interpolation reach in cells.
    pub const FILL_DISTANCE: &str = "fill_distance";
    /// Copy-paste source raster layer.
    pub const SOURCE: &str = "source";
    /// Copy-paste mask layer.
    pub const MASK: &str = "mask";
    /// Output path.
    pub const OUTPUT: &str = "output";
}

/// Builds a smoothing plan: uniform focal mean over a square window.
pub fn smooth_plan(snapshot: &ParameterSnapshot, env: &OpEnv) -> Result<OperationPlan> {
    let kind = OperationKind::StandardProcessing;
    let base = snapshot.layer(params::BASE)?.to_string();
    let radius = snapshot.number_or(params::RADIUS, 1.0)?;
    if radius < 1.0 {
        return Err(OpsError::Artifact(format!(
            "smoothing radius must be at least 1 cell, got {radius}"
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let radius = radius as usize;
    let output = env.checked_output(snapshot, params::OUTPUT, kind)?;

    let stage = Stage::new();
    let mut plan = OperationPlan::new(kind, Some(output.clone()));
    push_load(&mut plan, &stage, env, base);
    plan.push(ProcessingStep::essential("smooth elevations", 60, {
        let stage = stage.clone();
        move |_ctx| {
            let current = stage.lock().grid()?.clone();
            stage.lock().grid = Some(focal_mean(&current, radius));
            Ok(())
        }
    }));
    push_write(&mut plan, &stage, env, output);
    Ok(plan)
}

/// Builds a gap-filling plan over the base raster's no-data cells.
pub fn fill_gaps_plan(snapshot: &ParameterSnapshot, env: &OpEnv) -> Result<OperationPlan> {
    let kind = OperationKind::StandardProcessing;
    let base = snapshot.layer(params::BASE)?.to_string();
    let fill_distance = snapshot.number_or(params::FILL_DISTANCE, 10.0)?;
    let output = env.checked_output(snapshot, params::OUTPUT, kind)?;

    let stage = Stage::new();
    let mut plan = OperationPlan::new(kind, Some(output.clone()));
    push_load(&mut plan, &stage, env, base);
    plan.push(ProcessingStep::essential("interpolate gaps", 60, {
        let stage = stage.clone();
        let env = env.clone();
        move |ctx| {
            let current = stage.lock().grid()?.clone();
            let gaps = current.nodata_count();
            if gaps == 0 {
                ctx.feedback.info("No gaps to fill".to_string());
                return Ok(());
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let reach = fill_distance.max(0.0) as usize;
            let filled = env.geo.fill_nodata(&current, reach)?;
            ctx.feedback.info(format!(
                "Interpolated {} of {gaps} no-data cells",
                gaps - filled.nodata_count()
            ));
            stage.lock().grid = Some(filled);
            Ok(())
        }
    }));
    push_write(&mut plan, &stage, env, output);
    Ok(plan)
}

/// Builds a copy-paste plan: in-mask cells of the source overwrite the base.
pub fn copy_paste_plan(snapshot: &ParameterSnapshot, env: &OpEnv) -> Result<OperationPlan> {
    let kind = OperationKind::StandardProcessing;
    let base = snapshot.layer(params::BASE)?.to_string();
    let source = snapshot.layer(params::SOURCE)?.to_string();
    let mask_name = snapshot.layer(params::MASK)?.to_string();
    let output = env.checked_output(snapshot, params::OUTPUT, kind)?;

    let stage = Stage::new();
    let mut plan = OperationPlan::new(kind, Some(output.clone()));
    push_load(&mut plan, &stage, env, base);
    plan.push(ProcessingStep::essential("paste in-mask cells", 60, {
        let stage = stage.clone();
        let env = env.clone();
        move |ctx| {
            let src = env.layers.raster(&source)?;
            let mask_layer = env.geo.fix_geometry(&env.layers.mask(&mask_name)?)?;
            let mut guard = stage.lock();
            let grid = guard
                .grid
                .as_mut()
                .ok_or_else(|| OpsError::Artifact("no working grid staged".into()))?;
            grid.check_same_shape(&src).map_err(OpsError::from)?;
            let mask = env.geo.rasterize(&mask_layer, grid)?;
            let mut pasted = 0usize;
            for ((cell, value), flag) in grid
                .array_mut()
                .iter_mut()
                .zip(src.array().iter())
                .zip(mask.array().iter())
            {
                if *flag == 1.0 {
                    *cell = *value;
                    pasted += 1;
                }
            }
            ctx.feedback
                .info(format!("Pasted {pasted} cells from '{source}'"));
            Ok(())
        }
    }));
    push_write(&mut plan, &stage, env, output);
    Ok(plan)
}

fn push_load(plan: &mut OperationPlan, stage: &Stage, env: &OpEnv, base: String) {
    plan.push(ProcessingStep::essential("load base raster", 20, {
        let stage = stage.clone();
        let env = env.clone();
        move |_ctx| {
            stage.lock().grid = Some(env.layers.raster(&base)?);
            Ok(())
        }
    }));
}

fn push_write(plan: &mut OperationPlan, stage: &Stage, env: &OpEnv, output: std::path::PathBuf) {
    plan.push(ProcessingStep::essential("write output", 20, {
        let stage = stage.clone();
        let env = env.clone();
        move |_ctx| {
            let guard = stage.lock();
            env.writer.write_grid(&output, guard.grid()?)?;
            Ok(())
        }
    }));
}

/// Uniform focal mean over a `(2r + 1)` square window, rows in parallel.
///
/// No-data cells stay no-data and do not pull their neighbors' means
/// toward anything; the window is clipped at the grid edge.
pub fn focal_mean(grid: &Grid, radius: usize) -> Grid {
    let (rows, cols) = grid.shape();
    let src = grid.array();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|r| {
            let r0 = r.saturating_sub(radius);
            let r1 = (r + radius).min(rows.saturating_sub(1));
            (0..cols)
                .map(move |c| {
                    if src[(r, c)].is_nan() {
                        return f64::NAN;
                    }
                    let c0 = c.saturating_sub(radius);
                    let c1 = (c + radius).min(cols.saturating_sub(1));
                    let mut sum = 0.0;
                    let mut count = 0usize;
                    for rr in r0..=r1 {
                        for cc in c0..=c1 {
                            let v = src[(rr, cc)];
                            if !v.is_nan() {
                                sum += v;
                                count += 1;
                            }
                        }
                    }
                    #[allow(clippy::cast_precision_loss)]
                    let mean = sum / count as f64;
                    mean
                })
                .collect::<Vec<_>>()
        })
        .collect();
    let mut out = Grid::from_vec(data, rows, cols)
        .unwrap_or_else(|_| grid.like(f64::NAN));
    out.set_transform(grid.transform());
    out
}
