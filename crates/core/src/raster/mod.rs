//! Raster grid types

mod element;
mod geotransform;
mod grid;

pub use element::{CellValue, NODATA_SENTINEL};
pub use geotransform::GeoTransform;
pub use grid::Raster;
