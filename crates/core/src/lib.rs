//! # floodprep core
//!
//! Core types and I/O for the floodprep flood-routing preparation toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced raster grid
//! - `GeoTransform`: affine georeferencing with congruence checks
//! - `StreamInfoTable`: the per-tile stream cell table and its text form
//! - GeoTIFF I/O for the rasters the pipeline reads and writes
//! - The shared error taxonomy

pub mod error;
pub mod io;
pub mod raster;
pub mod stream_info;

pub use error::{Error, Result};
pub use raster::{CellValue, GeoTransform, Raster, NODATA_SENTINEL};
pub use stream_info::{StreamCell, StreamInfoTable};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{CellValue, GeoTransform, Raster, NODATA_SENTINEL};
    pub use crate::stream_info::{StreamCell, StreamInfoTable};
}
