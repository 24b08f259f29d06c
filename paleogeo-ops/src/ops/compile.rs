//! Compile Topo/Bathymetry: composite several rasters into one grid.
//!
//! The user orders `(layer, category)` pairs by priority; the first raster
//! seeds the composite and every following one only fills cells that are
//! still no-data. An optional gap-filling pass interpolates what remains.

use paleogeo_core::ParameterSnapshot;

use super::Stage;
use crate::env::OpEnv;
use crate::error::{OpsError, Result};
use crate::plan::{OperationKind, OperationPlan, ProcessingStep};

/// Parameter names used by this operation.
pub mod params {
    /// `(layer, category)` pairs, highest priority first.
    pub const RASTERS: &str = "rasters";
    /// Output path.
    pub const OUTPUT: &str = "output";
    /// Interpolate gaps left after compositing.
    pub const FILL_GAPS: &str = "fill_gaps";
    /// Interpolation reach in cells.
    pub const FILL_DISTANCE: &str = "fill_distance";
}

/// Builds the compile plan from a captured snapshot.
pub fn plan(snapshot: &ParameterSnapshot, env: &OpEnv) -> Result<OperationPlan> {
    let kind = OperationKind::CompileTopoBathy;
    let sources: Vec<(String, String)> = snapshot.layer_categories(params::RASTERS)?.to_vec();
    if sources.is_empty() {
        return Err(OpsError::EmptyInput {
            name: params::RASTERS,
        });
    }
    let fill_gaps = snapshot.bool_or(params::FILL_GAPS, false)?;
    let fill_distance = snapshot.number_or(params::FILL_DISTANCE, 10.0)?;
    let output = env.checked_output(snapshot, params::OUTPUT, kind)?;

    let stage = Stage::new();
    let mut plan = OperationPlan::new(kind, Some(output.clone()));

    let composite_weight = if fill_gaps { 65 } else { 80 };
    plan.push(ProcessingStep::essential("composite rasters", composite_weight, {
        let stage = stage.clone();
        let env = env.clone();
        move |ctx| {
            let mut composite: Option<paleogeo_core::Grid> = None;
            for (layer, category) in &sources {
                // Poll between layers: inputs can be large.
                if ctx.canceled() {
                    return Ok(());
                }
                let raster = env.layers.raster(layer)?;
                match composite.as_mut() {
                    None => {
                        ctx.feedback
                            .info(format!("Base {category} raster: '{layer}'"));
                        composite = Some(raster);
                    }
                    Some(base) => {
                        base.check_same_shape(&raster).map_err(OpsError::from)?;
                        let mut filled = 0usize;
                        for (cell, value) in
                            base.array_mut().iter_mut().zip(raster.array().iter())
                        {
                            if cell.is_nan() && !value.is_nan() {
                                *cell = *value;
                                filled += 1;
                            }
                        }
                        ctx.feedback.info(format!(
                            "Added {category} raster '{layer}': {filled} cells filled"
                        ));
                    }
                }
            }
            stage.lock().grid = composite;
            Ok(())
        }
    }));

    if fill_gaps {
        plan.push(ProcessingStep::best_effort("fill remaining gaps", 15, {
            let stage = stage.clone();
            let env = env.clone();
            move |ctx| {
                let current = stage.lock().grid()?.clone();
                let gaps = current.nodata_count();
                if gaps == 0 {
                    return Ok(());
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let reach = fill_distance.max(0.0) as usize;
                let filled = env.geo.fill_nodata(&current, reach)?;
                ctx.feedback
                    .info(format!("Interpolated {gaps} no-data cells"));
                stage.lock().grid = Some(filled);
                Ok(())
            }
        }));
    }

    plan.push(ProcessingStep::essential("write output", 20, {
        let stage = stage.clone();
        let env = env.clone();
        move |ctx| {
            if ctx.canceled() {
                return Ok(());
            }
            let guard = stage.lock();
            env.writer.write_grid(&output, guard.grid()?)?;
            Ok(())
        }
    }));

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Controller, EngineConfig, StartOutcome};
    use crate::ops::test_env::{env_with, TestWorld};
    use paleogeo_core::{Grid, ParamValue, RunResult, RunState};

    fn snapshot_with(world: &TestWorld, pairs: Vec<(String, String)>) -> ParameterSnapshot {
        let mut form = world.form(&[(params::RASTERS, paleogeo_core::ParamKind::LayerCategories)]);
        form.set(params::RASTERS, ParamValue::LayerCategories(pairs))
            .unwrap();
        form.capture().unwrap()
    }

    #[test]
    fn test_composite_prefers_earlier_layers() {
        let mut world = TestWorld::new(4, 4);
        let mut top = Grid::filled(4, 4, f64::NAN);
        top.set(0, 0, 1000.0).unwrap();
        world.add_raster("topo", top);
        world.add_raster("bathy", Grid::filled(4, 4, -4000.0));
        let env = env_with(&world);

        let snapshot = snapshot_with(
            &world,
            vec![
                ("topo".into(), "topography".into()),
                ("bathy".into(), "bathymetry".into()),
            ],
        );
        let mut controller = Controller::new(EngineConfig::default(), move || {
            plan(&snapshot, &env)
        });
        assert_eq!(controller.start(), StartOutcome::Started);
        let state = controller.join();
        let RunState::Finished(RunResult::Success(path)) = state else {
            panic!("expected success, got {state:?}");
        };

        let written = world.written_grid(&path);
        assert_eq!(written.get(0, 0).unwrap(), 1000.0);
        assert_eq!(written.get(2, 2).unwrap(), -4000.0);
        assert_eq!(controller.feedback().progress(), 100);
    }

    #[test]
    fn test_empty_raster_list_rejects_start() {
        let world = TestWorld::new(2, 2);
        let env = env_with(&world);
        let snapshot = snapshot_with(&world, Vec::new());
        let mut controller = Controller::new(EngineConfig::default(), move || {
            plan(&snapshot, &env)
        });
        assert_eq!(controller.start(), StartOutcome::Rejected);
        assert_eq!(
            controller.join(),
            RunState::Finished(RunResult::Failure)
        );
    }

    #[test]
    fn test_shape_mismatch_fails_run() {
        let mut world = TestWorld::new(4, 4);
        world.add_raster("a", Grid::filled(4, 4, 0.0));
        world.add_raster("b", Grid::filled(3, 3, 0.0));
        let env = env_with(&world);
        let snapshot = snapshot_with(
            &world,
            vec![("a".into(), "x".into()), ("b".into(), "y".into())],
        );
        let mut controller = Controller::new(EngineConfig::default(), move || {
            plan(&snapshot, &env)
        });
        controller.start();
        assert_eq!(
            controller.join(),
            RunState::Finished(RunResult::Failure)
        );
    }
}
