//! Geoprocessing service contracts.
//!
//! The host application's vector/raster toolbox is consumed through the
//! [`GeoProcessing`] trait; every call is fallible and wrapped by the
//! step-level error handling of the runner. [`planar::PlanarToolbox`]
//! provides a small in-memory implementation so the crate runs standalone.

pub mod planar;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use paleogeo_core::Grid;

use crate::error::Result;

/// A closed polygon ring in map coordinates, implicitly closed between the
/// last and first vertex. Holes are not modeled.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    /// Exterior ring vertices.
    pub exterior: Vec<(f64, f64)>,
}

impl Polygon {
    /// Builds a ring from vertices.
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Self { exterior }
    }

    /// An axis-aligned rectangle, handy in tests and demos.
    pub fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    /// Centroid of the vertex set.
    pub fn centroid(&self) -> (f64, f64) {
        if self.exterior.is_empty() {
            return (0.0, 0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.exterior.len() as f64;
        let (sx, sy) = self
            .exterior
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    }

    /// Even-odd point-in-polygon test.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let ring = &self.exterior;
        if ring.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let (xi, yi) = ring[i];
            let (xj, yj) = ring[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// A named vector mask: polygons delimiting where a raster is modified.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskLayer {
    /// Layer name as known to the host project.
    pub name: String,
    /// Mask polygons.
    pub polygons: Vec<Polygon>,
}

impl MaskLayer {
    /// Creates a named mask layer.
    pub fn new(name: impl Into<String>, polygons: Vec<Polygon>) -> Self {
        Self {
            name: name.into(),
            polygons,
        }
    }

    /// True when any polygon contains the point.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygons.iter().any(|p| p.contains(x, y))
    }
}

/// The host toolbox contract. Calls are synchronous and potentially slow;
/// workers treat each one as a blocking unit of work and re-check the
/// cancellation token after it returns.
pub trait GeoProcessing: Send + Sync {
    /// Burns a mask into a grid shaped like `template`: 1.0 inside, 0.0
    /// outside.
    fn rasterize(&self, mask: &MaskLayer, template: &Grid) -> Result<Grid>;

    /// Inflates (positive distance) or deflates polygons.
    fn buffer(&self, mask: &MaskLayer, distance: f64) -> Result<MaskLayer>;

    /// Repairs degenerate rings.
    fn fix_geometry(&self, mask: &MaskLayer) -> Result<MaskLayer>;

    /// Union of several mask layers.
    fn merge(&self, masks: &[MaskLayer]) -> Result<MaskLayer>;

    /// Polygons of `a` minus the area of `b`.
    fn difference(&self, a: &MaskLayer, b: &MaskLayer) -> Result<MaskLayer>;

    /// Inserts vertices so no segment exceeds `interval`.
    fn densify(&self, mask: &MaskLayer, interval: f64) -> Result<MaskLayer>;

    /// Fills NaN cells from nearby data, out to `max_distance` cells.
    fn fill_nodata(&self, grid: &Grid, max_distance: usize) -> Result<Grid>;

    /// Distance (in map units) from every cell to the nearest cell where
    /// `mask_grid` is 1.0.
    fn distance_to_hub(&self, mask_grid: &Grid) -> Result<Grid>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_in_rectangle() {
        let rect = Polygon::rectangle(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(5.0, 5.0));
        assert!(!rect.contains(15.0, 5.0));
        assert!(!rect.contains(-0.1, 5.0));
    }

    #[test]
    fn test_degenerate_ring_contains_nothing() {
        let line = Polygon::new(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(!line.contains(0.5, 0.5));
    }

    #[test]
    fn test_mask_any_polygon() {
        let mask = MaskLayer::new(
            "m",
            vec![
                Polygon::rectangle(0.0, 0.0, 1.0, 1.0),
                Polygon::rectangle(5.0, 5.0, 6.0, 6.0),
            ],
        );
        assert!(mask.contains(0.5, 0.5));
        assert!(mask.contains(5.5, 5.5));
        assert!(!mask.contains(3.0, 3.0));
    }
}
