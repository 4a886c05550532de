//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{CellValue, GeoTransform};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major order together with
/// the affine transform of the grid. The nodata convention is the shared
/// `-9999` sentinel (see [`CellValue`]); there is no per-raster override
/// because every artifact in this pipeline uses the same sentinel.
#[derive(Debug, Clone)]
pub struct Raster<T: CellValue> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
}

impl<T: CellValue> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
        }
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
        }
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            data: array,
            transform: GeoTransform::default(),
        })
    }

    /// Create a raster with this raster's grid, filled with a value.
    ///
    /// The destination type may differ from the source type; the transform
    /// carries over so the output stays congruent with the template.
    pub fn like<U: CellValue>(&self, fill_value: U) -> Raster<U> {
        Raster {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster has zero extent
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Check if cell at (row, col) contains the nodata sentinel
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        Ok(self.get(row, col)?.is_nodata())
    }

    /// Whether this raster and another describe the same grid
    /// (dimensions and geotransform).
    pub fn same_grid_as<U: CellValue>(&self, other: &Raster<U>) -> bool {
        self.shape() == other.shape() && self.transform.approx_eq(&other.transform)
    }

    /// Verify congruence with another raster, failing with
    /// [`Error::Alignment`] on mismatch.
    pub fn check_aligned_with<U: CellValue>(&self, other: &Raster<U>) -> Result<()> {
        if self.same_grid_as(other) {
            return Ok(());
        }
        Err(Error::Alignment {
            expected: format!("{:?} @ {:?}", self.shape(), self.transform),
            actual: format!("{:?} @ {:?}", other.shape(), other.transform),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_like_carries_grid() {
        let mut template: Raster<i32> = Raster::new(4, 6);
        template.set_transform(GeoTransform::new(10.0, 20.0, 30.0, -30.0));

        let out: Raster<f64> = template.like(f64::nodata());
        assert!(template.same_grid_as(&out));
        assert!(out.get(0, 0).unwrap().is_nodata());
    }

    #[test]
    fn test_alignment_check() {
        let a: Raster<i32> = Raster::new(4, 6);
        let b: Raster<i32> = Raster::new(4, 7);
        assert!(a.check_aligned_with(&b).is_err());

        let mut c: Raster<i32> = Raster::new(4, 6);
        assert!(a.check_aligned_with(&c).is_ok());

        c.set_transform(GeoTransform::new(500.0, 0.0, 1.0, -1.0));
        assert!(a.check_aligned_with(&c).is_err());
    }

    #[test]
    fn test_from_vec_dimension_mismatch() {
        let result = Raster::from_vec(vec![1i32, 2, 3], 2, 2);
        assert!(result.is_err());
    }
}
