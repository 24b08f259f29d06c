//! Create Topo/Bathymetry: shape a new geological feature from a mask.
//!
//! A sea gets a shelf-to-abyss depth profile, a mountain range a
//! foothill-to-crest height profile. Both taper linearly with distance
//! from the feature edge; the margin width controls the taper reach.

use paleogeo_core::{Grid, ParameterSnapshot};

use super::Stage;
use crate::env::OpEnv;
use crate::error::{OpsError, Result};
use crate::plan::{OperationKind, OperationPlan, ProcessingStep};

/// Parameter names used by this operation.
pub mod params {
    /// Base raster layer.
    pub const BASE: &str = "base";
    /// Feature outline mask layer.
    pub const MASK: &str = "mask";
    /// Create a mountain range instead of a sea.
    pub const MOUNTAIN: &str = "mountain";
    /// Elevation at the feature edge (shelf depth / foothill height).
    pub const EDGE_LEVEL: &str = "edge_level";
    /// Elevation deep inside the feature (abyss depth / crest height).
    pub const CORE_LEVEL: &str = "core_level";
    /// Taper reach from the edge, in map units.
    pub const MARGIN_WIDTH: &str = "margin_width";
    /// Densification interval for the outline, in map units.
    pub const DENSIFY_INTERVAL: &str = "densify_interval";
    /// Output path.
    pub const OUTPUT: &str = "output";
}

/// Builds the create plan from a captured snapshot.
pub fn plan(snapshot: &ParameterSnapshot, env: &OpEnv) -> Result<OperationPlan> {
    let kind = OperationKind::CreateTopoBathy;
    let base = snapshot.layer(params::BASE)?.to_string();
    let mask_name = snapshot.layer(params::MASK)?.to_string();
    let mountain = snapshot.bool_or(params::MOUNTAIN, false)?;
    let default_edge = if mountain { 500.0 } else { -200.0 };
    let default_core = if mountain { 4000.0 } else { -4500.0 };
    let edge_level = snapshot.number_or(params::EDGE_LEVEL, default_edge)?;
    let core_level = snapshot.number_or(params::CORE_LEVEL, default_core)?;
    let margin_width = snapshot.number_or(params::MARGIN_WIDTH, 5.0)?;
    let densify_interval = snapshot.number_or(params::DENSIFY_INTERVAL, 1.0)?;
    if margin_width <= 0.0 {
        return Err(OpsError::Artifact(format!(
            "margin width must be positive, got {margin_width}"
        )));
    }
    let output = env.checked_output(snapshot, params::OUTPUT, kind)?;

    let stage = Stage::new();
    let prepared = std::sync::Arc::new(std::sync::Mutex::new(None::<crate::geoprocess::MaskLayer>));

    let mut plan = OperationPlan::new(kind, Some(output.clone()));

    plan.push(ProcessingStep::essential("prepare outline", 15, {
        let env = env.clone();
        let prepared = prepared.clone();
        move |ctx| {
            let raw = env.layers.mask(&mask_name)?;
            let fixed = env.geo.fix_geometry(&raw)?;
            // Densification sharpens the distance field but is optional.
            let dense = match env.geo.densify(&fixed, densify_interval) {
                Ok(dense) => dense,
                Err(err) => {
                    ctx.feedback.warning(format!(
                        "Densification failed ({err}); using the un-densified outline"
                    ));
                    fixed
                }
            };
            *prepared.lock().expect("outline lock poisoned") = Some(dense);
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("rasterize and measure", 35, {
        let stage = stage.clone();
        let env = env.clone();
        let prepared = prepared.clone();
        move |ctx| {
            let grid = env.layers.raster(&base)?;
            let mask_layer = prepared
                .lock()
                .expect("outline lock poisoned")
                .clone()
                .ok_or_else(|| OpsError::Artifact("outline not prepared".into()))?;
            let mask = env.geo.rasterize(&mask_layer, &grid)?;
            if ctx.canceled() {
                return Ok(());
            }
            // Distance from the outside: inverted mask cells are the hubs.
            let mut inverse = mask.clone();
            for cell in inverse.array_mut().iter_mut() {
                *cell = 1.0 - *cell;
            }
            let distance = env.geo.distance_to_hub(&inverse)?;
            let mut guard = stage.lock();
            guard.grid = Some(grid);
            guard.mask = Some(mask);
            guard.scratch = Some(distance);
            Ok(())
        }
    }));

    plan.push(ProcessingStep::essential("shape feature profile", 30, {
        let stage = stage.clone();
        move |ctx| {
            let mut guard = stage.lock();
            let mask = guard.mask()?.clone();
            let distance = guard
                .scratch
                .clone()
                .ok_or_else(|| OpsError::Artifact("no distance field staged".into()))?;
            let grid = guard
                .grid
                .as_mut()
                .ok_or_else(|| OpsError::Artifact("no working grid staged".into()))?;
            let shaped = shape_profile(grid, &mask, &distance, edge_level, core_level, margin_width);
            ctx.feedback
                .info(format!("Shaped {shaped} cells inside the feature outline"));
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

/// Writes the linear edge-to-core profile into in-mask cells; returns the
/// number of cells written.
fn shape_profile(
    grid: &mut Grid,
    mask: &Grid,
    distance: &Grid,
    edge_level: f64,
    core_level: f64,
    margin_width: f64,
) -> usize {
    let mut shaped = 0;
    for ((value, flag), d) in grid
        .array_mut()
        .iter_mut()
        .zip(mask.array().iter())
        .zip(distance.array().iter())
    {
        if *flag != 1.0 {
            continue;
        }
        let t = (d / margin_width).clamp(0.0, 1.0);
        *value = edge_level + (core_level - edge_level) * t;
        shaped += 1;
    }
    shaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Controller, EngineConfig};
    use crate::geoprocess::{MaskLayer, Polygon};
    use crate::ops::test_env::{env_with, TestWorld};
    use approx::assert_relative_eq;
    use paleogeo_core::{ParamKind, ParamValue, RunResult, RunState};

    fn sea_snapshot(world: &TestWorld) -> ParameterSnapshot {
        let mut form = world.form(&[
            (params::BASE, ParamKind::Layer),
            (params::MASK, ParamKind::Layer),
        ]);
        form.register(paleogeo_core::ParamDef::optional(
            params::MARGIN_WIDTH,
            ParamKind::Number,
        ))
        .unwrap();
        form.set(params::BASE, ParamValue::Layer("base".into()))
            .unwrap();
        form.set(params::MASK, ParamValue::Layer("sea".into()))
            .unwrap();
        form.set(params::MARGIN_WIDTH, ParamValue::Number(3.0))
            .unwrap();
        form.capture().unwrap()
    }

    #[test]
    fn test_sea_profile_deepens_inward() {
        let mut world = TestWorld::new(12, 12);
        world.add_raster("base", Grid::filled(12, 12, 300.0));
        world.add_mask(
            "sea",
            MaskLayer::new("sea", vec![Polygon::rectangle(1.0, 1.0, 11.0, 11.0)]),
        );
        let env = env_with(&world);
        let snapshot = sea_snapshot(&world);

        let mut controller = Controller::new(EngineConfig::default(), move || {
            plan(&snapshot, &env)
        });
        controller.start();
        let RunState::Finished(RunResult::Success(path)) = controller.join() else {
            panic!("run failed: {:?}", controller.feedback().messages());
        };
        let out = world.written_grid(&path);

        // Untouched outside the outline.
        assert_relative_eq!(out.get(0, 0).unwrap(), 300.0);
        // The feature interior reaches the default abyss level.
        assert_relative_eq!(out.get(6, 6).unwrap(), -4500.0);
        // Cells near the edge stay shallower than the core.
        let near_edge = out.get(10, 6).unwrap();
        assert!(near_edge > -4500.0 && near_edge <= -200.0, "{near_edge}");
    }

    #[test]
    fn test_zero_margin_rejected() {
        let mut world = TestWorld::new(4, 4);
        world.add_raster("base", Grid::new(4, 4));
        world.add_mask(
            "sea",
            MaskLayer::new("sea", vec![Polygon::rectangle(0.0, 0.0, 2.0, 2.0)]),
        );
        let env = env_with(&world);
        let mut form = world.form(&[
            (params::BASE, ParamKind::Layer),
            (params::MASK, ParamKind::Layer),
        ]);
        form.register(paleogeo_core::ParamDef::optional(
            params::MARGIN_WIDTH,
            ParamKind::Number,
        ))
        .unwrap();
        form.set(params::BASE, ParamValue::Layer("base".into()))
            .unwrap();
        form.set(params::MASK, ParamValue::Layer("sea".into()))
            .unwrap();
        form.set(params::MARGIN_WIDTH, ParamValue::Number(0.0))
            .unwrap();
        let snapshot = form.capture().unwrap();
        assert!(plan(&snapshot, &env).is_err());
    }
}
