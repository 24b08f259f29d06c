//! Set Paleoshorelines: make the coastline match the drawn land polygons.
//!
//! The mask marks where land should be at the reconstructed time. Land
//! cells that sit below sea level are lifted into a shallow positive
//! range; sea cells that stick above sea level are pushed under. Both
//! adjustments are linear rescales of the offending cells, so relative
//! relief inside each group is preserved.

use paleogeo_core::{Grid, ParameterSnapshot};

use super::Stage;
use crate::env::OpEnv;
use crate::error::{OpsError, Result};
use crate::plan::{OperationKind, OperationPlan, ProcessingStep};

/// Parameter names used by this operation.
pub mod params {
    /// Base raster layer.
    pub const BASE: &str = "base";
    /// `(layer, enabled)` paleoshoreline mask pairs.
    pub const SHORELINES: &str = "shorelines";
    /// Highest elevation lifted land cells may reach, in meters.
    pub const MAX_LAND_ELEV: &str = "max_land_elev";
    /// Deepest level sunk sea cells may reach, in meters (positive depth).
    pub const MAX_SEA_DEPTH: &str = "max_sea_depth";
    /// Output path.
    pub const OUTPUT: &str = "output";
}

/// Builds the paleoshoreline plan from a captured snapshot.
pub fn plan(snapshot: &ParameterSnapshot, env: &OpEnv) -> Result<OperationPlan> {
    let kind = OperationKind::SetPaleoshorelines;
    let base = snapshot.layer(params::BASE)?.to_string();
    let shorelines: Vec<String> = snapshot
        .layer_flags(params::SHORELINES)?
        .iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| name.clone())
        .collect();
    if shorelines.is_empty() {
        return Err(OpsError::EmptyInput {
            name: params::SHORELINES,
        });
    }
    let max_land = snapshot.number_or(params::MAX_LAND_ELEV, 10.0)?;
    let max_depth = snapshot.number_or(params::MAX_SEA_DEPTH, 10.0)?;
    if max_land <= 0.0 || max_depth <= 0.0 {
        return Err(OpsError::Artifact(format!(
            "shoreline limits must be positive, got land {max_land} / depth {max_depth}"
        )));
    }
    let output = env.checked_output(snapshot, params::OUTPUT, kind)?;

    let stage = Stage::new();
    let mut plan = OperationPlan::new(kind, Some(output.clone()));

    plan.push(ProcessingStep::essential("rasterize shorelines", 25, {
        let stage = stage.clone();
        let env = env.clone();
        move |ctx| {
            let grid = env.layers.raster(&base)?;
            let mut layers = Vec::with_capacity(shorelines.len());
            for name in &shorelines {
                if ctx.canceled() {
                    return Ok(());
                }
                layers.push(env.geo.fix_geometry(&env.layers.mask(name)?)?);
            }
            let merged = env.geo.merge(&layers)?;
            let mask = env.geo.rasterize(&merged, &grid)?;
            let mut guard = stage.lock();
            guard.grid = Some(grid);
            guard.mask = Some(mask);
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("adjust elevations", 50, {
        let stage = stage.clone();
        move |ctx| {
            let mut guard = stage.lock();
            let mask = guard.mask()?.clone();
            let grid = guard
                .grid
                .as_mut()
                .ok_or_else(|| OpsError::Artifact("no working grid staged".into()))?;
            let lifted = rescale_offenders(grid, &mask, true, max_land * 0.01, max_land);
            let sunk = rescale_offenders(grid, &mask, false, -max_depth, -max_depth * 0.01);
            ctx.feedback.info(format!(
                "Lifted {lifted} submerged land cells, sank {sunk} emerged sea cells"
            ));
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("write output", 25, {
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

/// Rescales the cells on the wrong side of sea level into `[lo, hi]`.
///
/// With `land` true the offenders are in-mask cells at or below zero;
/// otherwise out-of-mask cells at or above zero. Returns how many cells
/// moved. The rescale is monotone, so a cell that was higher than another
/// before stays higher after.
fn rescale_offenders(grid: &mut Grid, mask: &Grid, land: bool, lo: f64, hi: f64) -> usize {
    let offending = |value: f64, flag: f64| {
        if value.is_nan() {
            return false;
        }
        if land {
            flag == 1.0 && value <= 0.0
        } else {
            flag != 1.0 && value >= 0.0
        }
    };

    let (mut old_min, mut old_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for (value, flag) in grid.array().iter().zip(mask.array().iter()) {
        if offending(*value, *flag) {
            old_min = old_min.min(*value);
            old_max = old_max.max(*value);
        }
    }
    if old_min > old_max {
        return 0;
    }
    let old_span = (old_max - old_min).max(f64::EPSILON);
    let mut moved = 0;
    for (value, flag) in grid.array_mut().iter_mut().zip(mask.array().iter()) {
        if offending(*value, *flag) {
            *value = lo + (*value - old_min) / old_span * (hi - lo);
            moved += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Controller, EngineConfig};
    use crate::geoprocess::{MaskLayer, Polygon};
    use crate::ops::test_env::{env_with, TestWorld};
    use paleogeo_core::{ParamKind, ParamValue, RunResult, RunState};

    fn snapshot(world: &TestWorld) -> ParameterSnapshot {
        let mut form = world.form(&[
            (params::BASE, ParamKind::Layer),
            (params::SHORELINES, ParamKind::LayerFlags),
        ]);
        form.set(params::BASE, ParamValue::Layer("base".into()))
            .unwrap();
        form.set(
            params::SHORELINES,
            ParamValue::LayerFlags(vec![("land".into(), true)]),
        )
        .unwrap();
        form.capture().unwrap()
    }

    #[test]
    fn test_coastline_matches_mask() {
        let mut world = TestWorld::new(6, 6);
        let mut base = Grid::filled(6, 6, -500.0);
        // One peak in open water, one hill already above sea on land.
        base.set(0, 5, 300.0).unwrap();
        base.set(4, 1, 250.0).unwrap();
        world.add_raster("base", base);
        // Land occupies map x,y in [0, 3): grid rows 3..6, cols 0..3.
        world.add_mask(
            "land",
            MaskLayer::new("land", vec![Polygon::rectangle(0.0, 0.0, 3.0, 3.0)]),
        );
        let env = env_with(&world);
        let snapshot = snapshot(&world);

        let mut controller = Controller::new(EngineConfig::default(), move || {
            plan(&snapshot, &env)
        });
        controller.start();
        let RunState::Finished(RunResult::Success(path)) = controller.join() else {
            panic!("run failed: {:?}", controller.feedback().messages());
        };
        let out = world.written_grid(&path);

        // Submerged land lifted into (0, 10].
        let lifted = out.get(4, 0).unwrap();
        assert!(lifted > 0.0 && lifted <= 10.0, "{lifted}");
        // Land that was already above sea level is untouched.
        assert_eq!(out.get(4, 1).unwrap(), 250.0);
        // The open-water peak is pushed below sea level.
        assert!(out.get(0, 5).unwrap() < 0.0);
        // Open water that was already submerged is untouched.
        assert_eq!(out.get(0, 0).unwrap(), -500.0);
    }

    #[test]
    fn test_relief_order_survives_rescale() {
        let mut grid = Grid::filled(1, 3, f64::NAN);
        grid.set(0, 0, -900.0).unwrap();
        grid.set(0, 1, -100.0).unwrap();
        grid.set(0, 2, 400.0).unwrap();
        let mask = Grid::filled(1, 3, 1.0);

        let moved = rescale_offenders(&mut grid, &mask, true, 0.1, 10.0);
        assert_eq!(moved, 2);
        let deep = grid.get(0, 0).unwrap();
        let shallow = grid.get(0, 1).unwrap();
        assert!(deep > 0.0 && shallow > 0.0);
        assert!(deep < shallow);
        // Already-dry land is left alone.
        assert_eq!(grid.get(0, 2).unwrap(), 400.0);
    }

    #[test]
    fn test_no_enabled_shorelines_rejects_plan() {
        let mut world = TestWorld::new(2, 2);
        world.add_raster("base", Grid::new(2, 2));
        let env = env_with(&world);
        let mut form = world.form(&[
            (params::BASE, ParamKind::Layer),
            (params::SHORELINES, ParamKind::LayerFlags),
        ]);
        form.set(params::BASE, ParamValue::Layer("base".into()))
            .unwrap();
        form.set(params::SHORELINES, ParamValue::LayerFlags(Vec::new()))
            .unwrap();
        let snapshot = form.capture().unwrap();
        assert!(matches!(
            plan(&snapshot, &env),
            Err(OpsError::EmptyInput { .. })
        ));
    }
}
