//! Depth image grid
//!
//! A [`DepthImage`] stores one reading per pixel, indexed `(row, col)`.
//! Readings that are NaN, infinite or not strictly positive are invalid:
//! dropouts, saturated returns and masked pixels all use this convention.
//! Rendered images use `f64::INFINITY` where no surface was hit.

use nalgebra::DMatrix;

use crate::errors::TrackerError;

/// Whether a depth reading carries a measurement
#[inline]
pub fn is_valid_reading(depth: f64) -> bool {
    depth.is_finite() && depth > 0.0
}

/// Dense depth grid in meters
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    data: DMatrix<f64>,
}

impl DepthImage {
    /// Wrap a `height x width` matrix
    pub fn from_matrix(data: DMatrix<f64>) -> Self {
        Self { data }
    }

    /// Image of the given size filled with one value
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            data: DMatrix::from_element(height, width, value),
        }
    }

    /// Image with no valid reading
    pub fn invalid(width: usize, height: usize) -> Self {
        Self::filled(width, height, f64::NAN)
    }

    /// Build from row-major readings
    pub fn from_row_major(
        width: usize,
        height: usize,
        readings: &[f64],
    ) -> Result<Self, TrackerError> {
        if readings.len() != width * height {
            return Err(TrackerError::dimension_mismatch(
                width * height,
                readings.len(),
                "depth image readings",
            ));
        }
        Ok(Self {
            data: DMatrix::from_row_slice(height, width, readings),
        })
    }

    /// Number of columns
    #[inline]
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// Number of rows
    #[inline]
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Reading at `(row, col)`
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// Overwrite the reading at `(row, col)`
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, depth: f64) {
        self.data[(row, col)] = depth;
    }

    /// Underlying matrix
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Readings in row-major order
    pub fn row_major(&self) -> impl Iterator<Item = f64> + '_ {
        let w = self.width();
        (0..self.height()).flat_map(move |r| (0..w).map(move |c| self.data[(r, c)]))
    }

    /// Number of valid readings
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&d| is_valid_reading(d)).count()
    }

    /// Apply `f` to every reading
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            data: self.data.map(f),
        }
    }

    /// Fail with `DimensionMismatch` unless the image is `width x height`
    pub fn check_shape(
        &self,
        width: usize,
        height: usize,
        context: &str,
    ) -> Result<(), TrackerError> {
        if self.height() != height {
            return Err(TrackerError::dimension_mismatch(
                height,
                self.height(),
                format!("{} rows", context),
            ));
        }
        if self.width() != width {
            return Err(TrackerError::dimension_mismatch(
                width,
                self.width(),
                format!("{} columns", context),
            ));
        }
        Ok(())
    }
}
