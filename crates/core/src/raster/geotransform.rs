//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates:
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// For north-up images `pixel_height` is negative. Rotation terms are not
/// modeled; every raster this pipeline consumes is produced on the same
/// north-up grid as the elevation template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a new north-up GeoTransform
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Create from GDAL-style array
    /// [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    ///
    /// Rotation coefficients are ignored.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            origin_y: coeffs[3],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            0.0,
            self.origin_y,
            0.0,
            self.pixel_height,
        ]
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Whether two transforms describe the same grid, within a tolerance
    /// of half a cell on the origin and 1e-6 relative on the cell size.
    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        let origin_tol = self.cell_size().max(other.cell_size()) * 0.5;
        let scale_tol = self.cell_size().max(other.cell_size()) * 1e-6;

        (self.origin_x - other.origin_x).abs() <= origin_tol
            && (self.origin_y - other.origin_y).abs() <= origin_tol
            && (self.pixel_width - other.pixel_width).abs() <= scale_tol
            && (self.pixel_height - other.pixel_height).abs() <= scale_tol
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
