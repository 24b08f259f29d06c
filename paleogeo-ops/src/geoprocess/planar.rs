//! In-memory geoprocessing toolbox over planar coordinates.
//!
//! A deliberately small stand-in for the host toolbox: good enough for
//! headless runs, demos, and tests. Rasterization samples cell centers
//! with an even-odd test; interpolation is iterative neighborhood
//! averaging; distances are Chebyshev cell distances scaled by cell size.

use paleogeo_core::{Grid, Result as CoreResult};

use super::{GeoProcessing, MaskLayer, Polygon};
use crate::error::{OpsError, Result};

/// The built-in toolbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarToolbox;

impl PlanarToolbox {
    /// Creates a toolbox.
    pub fn new() -> Self {
        Self
    }
}

impl GeoProcessing for PlanarToolbox {
    fn rasterize(&self, mask: &MaskLayer, template: &Grid) -> Result<Grid> {
        let mut out = template.like(0.0);
        let transform = template.transform();
        let (rows, cols) = template.shape();
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = transform.cell_center(row, col);
                if mask.contains(x, y) {
                    set_cell(&mut out, row, col, 1.0)?;
                }
            }
        }
        Ok(out)
    }

    fn buffer(&self, mask: &MaskLayer, distance: f64) -> Result<MaskLayer> {
        // Radial offset from each ring's centroid: crude, but preserves
        // topology for the convex-ish masks the operations feed it.
        let mut polygons = Vec::with_capacity(mask.polygons.len());
        for polygon in &mask.polygons {
            let (cx, cy) = polygon.centroid();
            let exterior = polygon
                .exterior
                .iter()
                .map(|&(x, y)| {
                    let dx = x - cx;
                    let dy = y - cy;
                    let len = dx.hypot(dy);
                    if len < f64::EPSILON {
                        (x, y)
                    } else {
                        let factor = ((len + distance) / len).max(0.0);
                        (cx + dx * factor, cy + dy * factor)
                    }
                })
                .collect();
            polygons.push(Polygon::new(exterior));
        }
        Ok(MaskLayer::new(mask.name.clone(), polygons))
    }

    fn fix_geometry(&self, mask: &MaskLayer) -> Result<MaskLayer> {
        let mut polygons = Vec::with_capacity(mask.polygons.len());
        for polygon in &mask.polygons {
            let mut ring: Vec<(f64, f64)> = Vec::with_capacity(polygon.exterior.len());
            for &(x, y) in &polygon.exterior {
                if !x.is_finite() || !y.is_finite() {
                    return Err(OpsError::geoprocessing(
                        "fix_geometry",
                        format!("non-finite vertex in '{}'", mask.name),
                    ));
                }
                if ring.last() != Some(&(x, y)) {
                    ring.push((x, y));
                }
            }
            // Drop an explicit closing vertex; rings are implicitly closed.
            if ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            if ring.len() >= 3 {
                polygons.push(Polygon::new(ring));
            }
        }
        Ok(MaskLayer::new(mask.name.clone(), polygons))
    }

    fn merge(&self, masks: &[MaskLayer]) -> Result<MaskLayer> {
        let name = masks
            .first()
            .map_or_else(|| "merged".to_string(), |m| m.name.clone());
        let polygons = masks.iter().flat_map(|m| m.polygons.clone()).collect();
        Ok(MaskLayer::new(name, polygons))
    }

    fn difference(&self, a: &MaskLayer, b: &MaskLayer) -> Result<MaskLayer> {
        // Polygon-granularity difference: keep polygons of `a` whose
        // centroid falls outside `b`.
        let polygons = a
            .polygons
            .iter()
            .filter(|p| {
                let (cx, cy) = p.centroid();
                !b.contains(cx, cy)
            })
            .cloned()
            .collect();
        Ok(MaskLayer::new(a.name.clone(), polygons))
    }

    fn densify(&self, mask: &MaskLayer, interval: f64) -> Result<MaskLayer> {
        if interval <= 0.0 {
            return Err(OpsError::geoprocessing(
                "densify",
                format!("interval must be positive, got {interval}"),
            ));
        }
        let mut polygons = Vec::with_capacity(mask.polygons.len());
        for polygon in &mask.polygons {
            let ring = &polygon.exterior;
            let mut dense = Vec::with_capacity(ring.len() * 2);
            for i in 0..ring.len() {
                let (x0, y0) = ring[i];
                let (x1, y1) = ring[(i + 1) % ring.len()];
                dense.push((x0, y0));
                let length = (x1 - x0).hypot(y1 - y0);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let pieces = (length / interval).ceil() as usize;
                for k in 1..pieces {
                    #[allow(clippy::cast_precision_loss)]
                    let t = k as f64 / pieces as f64;
                    dense.push((x0 + (x1 - x0) * t, y0 + (y1 - y0) * t));
                }
            }
            polygons.push(Polygon::new(dense));
        }
        Ok(MaskLayer::new(mask.name.clone(), polygons))
    }

    fn fill_nodata(&self, grid: &Grid, max_distance: usize) -> Result<Grid> {
        let mut current = grid.clone();
        for _ in 0..max_distance {
            if current.nodata_count() == 0 {
                break;
            }
            current = dilate_once(&current)?;
        }
        Ok(current)
    }

    fn distance_to_hub(&self, mask_grid: &Grid) -> Result<Grid> {
        let (rows, cols) = mask_grid.shape();
        let cell_size = mask_grid.transform().cell_size;
        let mut distance = vec![usize::MAX; rows * cols];
        let mut queue = std::collections::VecDeque::new();

        for row in 0..rows {
            for col in 0..cols {
                if mask_grid.get(row, col)? == 1.0 {
                    distance[row * cols + col] = 0;
                    queue.push_back((row, col));
                }
            }
        }
        if queue.is_empty() {
            return Err(OpsError::geoprocessing(
                "distance_to_hub",
                "mask grid has no hub cells",
            ));
        }

        while let Some((row, col)) = queue.pop_front() {
            let next = distance[row * cols + col] + 1;
            for (dr, dc) in NEIGHBORS {
                let (nr, nc) = (row.wrapping_add_signed(dr), col.wrapping_add_signed(dc));
                if nr < rows && nc < cols && distance[nr * cols + nc] > next {
                    distance[nr * cols + nc] = next;
                    queue.push_back((nr, nc));
                }
            }
        }

        let mut out = mask_grid.like(0.0);
        for row in 0..rows {
            for col in 0..cols {
                #[allow(clippy::cast_precision_loss)]
                let d = distance[row * cols + col] as f64 * cell_size;
                set_cell(&mut out, row, col, d)?;
            }
        }
        Ok(out)
    }
}

const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// One pass of NaN filling: each NaN cell with at least one data neighbor
/// takes the mean of its data neighbors.
fn dilate_once(grid: &Grid) -> Result<Grid> {
    let (rows, cols) = grid.shape();
    let mut out = grid.clone();
    for row in 0..rows {
        for col in 0..cols {
            if !grid.is_nodata(row, col) {
                continue;
            }
            let mut sum = 0.0;
            let mut count = 0u32;
            for (dr, dc) in NEIGHBORS {
                let (nr, nc) = (row.wrapping_add_signed(dr), col.wrapping_add_signed(dc));
                if nr < rows && nc < cols && !grid.is_nodata(nr, nc) {
                    sum += grid.get(nr, nc)?;
                    count += 1;
                }
            }
            if count > 0 {
                set_cell(&mut out, row, col, sum / f64::from(count))?;
            }
        }
    }
    Ok(out)
}

fn set_cell(grid: &mut Grid, row: usize, col: usize, value: f64) -> Result<()> {
    let result: CoreResult<()> = grid.set(row, col, value);
    result.map_err(OpsError::from)
}
