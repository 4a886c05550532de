//! Batch runner
//!
//! Fans tile preparation out across a rayon pool, one whole tile per
//! unit of work. Tiles share no mutable state; a failing tile is
//! reported and skipped while the rest of the batch continues. Result
//! order is not significant and callers must not depend on it.

use crate::config::BatchConfig;
use crate::pipeline::{prepare_tile, TileSummary};
use floodprep_core::{Error, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info_span, warn};

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Tiles that completed, with what they produced
    pub succeeded: Vec<(String, TileSummary)>,
    /// Tiles that failed, with the rendered error
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Discover tile directories under a watershed directory.
///
/// Tiles follow the `watershed-subbasin` naming convention; anything
/// else is skipped with a warning so a stray directory cannot fail the
/// batch.
pub fn discover_tiles(watershed_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(watershed_dir).map_err(|_| Error::SourceNotFound {
        path: watershed_dir.to_path_buf(),
    })?;

    let mut tiles = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.split('-').count() == 2 {
            tiles.push(path);
        } else {
            warn!(directory = %name, "not a watershed-subbasin directory, skipping");
        }
    }

    tiles.sort();
    Ok(tiles)
}

/// Run a whole batch, calling `on_tile_done(name, ok)` as each tile
/// finishes (from worker threads, in completion order).
pub fn run_batch_with<F>(config: &BatchConfig, on_tile_done: F) -> Result<BatchReport>
where
    F: Fn(&str, bool) + Sync,
{
    let tiles = discover_tiles(&config.watershed_dir)?;
    if tiles.is_empty() {
        warn!(
            watershed = %config.watershed_dir.display(),
            "no tile directories found"
        );
        return Ok(BatchReport::default());
    }

    let results: Vec<(String, std::result::Result<TileSummary, String>)> = tiles
        .par_iter()
        .map(|tile_dir| {
            let tile_config = config.tile_config(tile_dir);
            let name = tile_config.name.clone();
            // every log line below carries the tile identity
            let span = info_span!("tile", tile = %name);
            let result = span.in_scope(|| prepare_tile(&tile_config));

            match result {
                Ok(summary) => {
                    on_tile_done(&name, true);
                    (name, Ok(summary))
                }
                Err(e) => {
                    error!(tile = %name, error = %e, "tile preparation failed");
                    on_tile_done(&name, false);
                    (name, Err(e.to_string()))
                }
            }
        })
        .collect();

    let mut report = BatchReport::default();
    for (name, result) in results {
        match result {
            Ok(summary) => report.succeeded.push((name, summary)),
            Err(e) => report.failed.push((name, e)),
        }
    }
    Ok(report)
}

/// Run a whole batch without progress callbacks.
pub fn run_batch(config: &BatchConfig) -> Result<BatchReport> {
    run_batch_with(config, |_, _| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FlowSourceSpec, STREAMS_RASTER_NAME, STREAM_INFO_NAME};
    use floodprep_core::io::write_geotiff;
    use floodprep_core::raster::{CellValue, Raster};
    use floodprep_streamflow::join::MissingIdPolicy;
    use floodprep_streamflow::sources::ReturnPeriod;

    fn write_tile(dir: &Path, id: i32) {
        std::fs::create_dir_all(dir).unwrap();
        let mut streams: Raster<i32> = Raster::filled(2, 2, i32::nodata());
        streams.set(0, 0, id).unwrap();
        write_geotiff(&streams, dir.join(STREAMS_RASTER_NAME)).unwrap();
    }

    fn write_return_periods(path: &Path, ids: &[i32]) {
        let mut nc = netcdf::create(path).unwrap();
        nc.add_dimension("rivid", ids.len()).unwrap();
        let mut id_var = nc.add_variable::<i32>("rivid", &["rivid"]).unwrap();
        id_var.put_values(ids, ..).unwrap();
        let values: Vec<f64> = ids.iter().map(|&id| id as f64 * 10.0).collect();
        let mut rp = nc
            .add_variable::<f64>("return_period_2", &["rivid"])
            .unwrap();
        rp.put_values(&values, ..).unwrap();
    }

    #[test]
    fn test_discovery_filters_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("korea-hongcheon")).unwrap();
        std::fs::create_dir(dir.path().join("badname")).unwrap();
        std::fs::create_dir(dir.path().join("usa-gaysmills")).unwrap();
        std::fs::write(dir.path().join("a-file"), "x").unwrap();

        let tiles = discover_tiles(dir.path()).unwrap();
        let names: Vec<_> = tiles
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["korea-hongcheon", "usa-gaysmills"]);
    }

    #[test]
    fn test_missing_watershed_dir() {
        let err = discover_tiles(Path::new("/no/such/watersheds")).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_partial_failure_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let rp_path = dir.path().join("return_periods.nc");
        write_return_periods(&rp_path, &[1, 2]);

        // two good tiles, one with an unreadable stream raster
        write_tile(&dir.path().join("ws-one"), 1);
        write_tile(&dir.path().join("ws-two"), 2);
        let broken = dir.path().join("ws-broken");
        std::fs::create_dir(&broken).unwrap();
        std::fs::write(broken.join(STREAMS_RASTER_NAME), b"not a tiff").unwrap();

        let config = BatchConfig {
            watershed_dir: dir.path().to_path_buf(),
            flow_source: FlowSourceSpec::ReturnPeriod {
                file: rp_path,
                period: ReturnPeriod::TwoYear,
            },
            missing_policy: MissingIdPolicy::ZeroFill,
            write_flow_raster: false,
        };

        let report = run_batch(&config).unwrap();
        assert_eq!(report.total(), 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "ws-broken");
        assert!(!report.all_succeeded());

        // the good tiles produced their artifacts regardless
        assert!(dir.path().join("ws-one").join(STREAM_INFO_NAME).exists());
        assert!(dir.path().join("ws-two").join(STREAM_INFO_NAME).exists());
        assert!(!broken.join(STREAM_INFO_NAME).exists());
    }

    #[test]
    fn test_empty_watershed_is_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = BatchConfig {
            watershed_dir: dir.path().to_path_buf(),
            flow_source: FlowSourceSpec::ReturnPeriod {
                file: dir.path().join("rp.nc"),
                period: ReturnPeriod::TwoYear,
            },
            missing_policy: MissingIdPolicy::ZeroFill,
            write_flow_raster: false,
        };
        let report = run_batch(&config).unwrap();
        assert_eq!(report.total(), 0);
        assert!(report.all_succeeded());
    }
}
