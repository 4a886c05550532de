//! Raster index construction
//!
//! Builds the stream-info cell table from a rasterized stream network:
//! one row per pixel carrying a stream id, in raster scan order
//! (row-major, top-to-bottom, left-to-right). Scan order is the contract
//! the joiner and the solver rely on for index alignment, so it is never
//! re-sorted downstream.

use floodprep_core::io::read_geotiff;
use floodprep_core::raster::Raster;
use floodprep_core::stream_info::{StreamCell, StreamInfoTable};
use floodprep_core::{Error, Result};
use std::path::Path;

/// Build the cell table from a rasterized stream-network raster.
///
/// Pixels with value >= 0 are stream cells; the nodata sentinel and any
/// other negative value mean "no stream". `index` is the position of the
/// cell in the flattened row-major grid, which is the 1-D DEM index the
/// solver consumes.
pub fn build_index(streams: &Raster<i32>) -> StreamInfoTable {
    let (rows, cols) = streams.shape();
    let mut cells = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            let value = streams.data()[(row, col)];
            if value >= 0 {
                cells.push(StreamCell::new(
                    (row * cols + col) as u64,
                    row as u32,
                    col as u32,
                    value,
                ));
            }
        }
    }

    StreamInfoTable::new(cells)
}

/// Read a rasterized stream network and build its cell table.
///
/// Fails with [`Error::SourceNotFound`] when the raster cannot be opened
/// and [`Error::InvalidGeometry`] when it has zero extent.
pub fn index_from_file<P: AsRef<Path>>(path: P) -> Result<StreamInfoTable> {
    let path = path.as_ref();
    let streams: Raster<i32> = read_geotiff(path)?;
    if streams.is_empty() {
        return Err(Error::InvalidGeometry {
            path: path.to_path_buf(),
            reason: "zero extent".into(),
        });
    }
    Ok(build_index(&streams))
}

#[cfg(test)]
mod tests {
    use super::*;
    use floodprep_core::CellValue;

    fn stream_raster() -> Raster<i32> {
        // 3x4 grid, ids 70/71, everything else no-stream
        let mut raster = Raster::filled(3, 4, i32::nodata());
        raster.set(0, 1, 70).unwrap();
        raster.set(1, 1, 70).unwrap();
        raster.set(1, 2, 71).unwrap();
        raster.set(2, 3, 71).unwrap();
        raster
    }

    #[test]
    fn test_scan_order() {
        let table = build_index(&stream_raster());

        let positions: Vec<(u32, u32)> = table.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(positions, vec![(0, 1), (1, 1), (1, 2), (2, 3)]);

        let indices: Vec<u64> = table.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 5, 6, 11]);
    }

    #[test]
    fn test_rerun_is_identical() {
        let raster = stream_raster();
        let a = build_index(&raster);
        let b = build_index(&raster);
        assert_eq!(a, b);
    }

    #[test]
    fn test_negative_values_excluded() {
        let mut raster = stream_raster();
        raster.set(2, 0, -5).unwrap();
        let table = build_index(&raster);
        assert!(table.iter().all(|c| c.stream_id >= 0));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_zero_is_a_valid_id() {
        let mut raster = Raster::filled(2, 2, i32::nodata());
        raster.set(0, 0, 0).unwrap();
        let table = build_index(&raster);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cells()[0].stream_id, 0);
    }

    #[test]
    fn test_missing_file() {
        let err = index_from_file("/no/such/streams.tif").unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }
}
