//! Elevation grid type.

use ndarray::Array2;

use crate::error::{Error, Result};

/// Affine placement of a grid in map coordinates.
///
/// Only the parts the editing operations need: top-left origin and a square
/// cell size. Rotation terms are not supported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X coordinate of the top-left corner.
    pub origin_x: f64,
    /// Y coordinate of the top-left corner.
    pub origin_y: f64,
    /// Edge length of one cell in map units.
    pub cell_size: f64,
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            cell_size: 1.0,
        }
    }
}

impl GeoTransform {
    /// Map coordinates of the center of cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        #[allow(clippy::cast_precision_loss)]
        let (r, c) = (row as f64, col as f64);
        (
            self.origin_x + (c + 0.5) * self.cell_size,
            self.origin_y - (r + 0.5) * self.cell_size,
        )
    }
}

/// A 2D elevation raster with NaN as the no-data value.
///
/// Data is stored row-major; row 0 is the northern edge. All editing
/// operations work on `f64` elevations in meters (negative below sea level).
#[derive(Debug, Clone)]
pub struct Grid {
    data: Array2<f64>,
    transform: GeoTransform,
}

impl Grid {
    /// Creates a grid of zeros.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
        }
    }

    /// Creates a grid filled with one value.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
        }
    }

    /// Wraps an existing array.
    pub fn from_array(data: Array2<f64>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
        }
    }

    /// Builds a grid from a flat row-major vector.
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|_| Error::InvalidDimensions { rows, cols })?;
        Ok(Self::from_array(array))
    }

    /// A grid with the same shape and transform, filled with `value`.
    pub fn like(&self, value: f64) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), value),
            transform: self.transform,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)` pair.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// The grid's placement in map coordinates.
    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    /// Replaces the placement.
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Reads one cell.
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.data
            .get((row, col))
            .copied()
            .ok_or_else(|| self.out_of_bounds(row, col))
    }

    /// Writes one cell.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let (rows, cols) = self.data.dim();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds {
                row,
                col,
                rows,
                cols,
            }),
        }
    }

    /// True when the cell holds no data.
    pub fn is_nodata(&self, row: usize, col: usize) -> bool {
        self.data.get((row, col)).map_or(true, |v| v.is_nan())
    }

    /// Count of NaN cells.
    pub fn nodata_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }

    /// Read-only view of the backing array.
    pub fn array(&self) -> &Array2<f64> {
        &self.data
    }

    /// Mutable view of the backing array.
    pub fn array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    /// Consumes the grid, returning the backing array.
    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    /// Checks that `other` has this grid's shape.
    pub fn check_same_shape(&self, other: &Grid) -> Result<()> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            let (a_rows, a_cols) = self.shape();
            let (b_rows, b_cols) = other.shape();
            Err(Error::ShapeMismatch {
                a_rows,
                a_cols,
                b_rows,
                b_cols,
            })
        }
    }

    /// Value-wise comparison within `tolerance`, treating NaN as equal to NaN.
    ///
    /// This is the comparison the artifact round-trip tests rely on: no-data
    /// cells must survive a write/read cycle.
    pub fn approx_eq(&self, other: &Grid, tolerance: f64) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a.is_nan() && b.is_nan()) || (a - b).abs() <= tolerance)
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        let (rows, cols) = self.data.dim();
        Error::IndexOutOfBounds {
            row,
            col,
            rows,
            cols,
        }
    }
}
