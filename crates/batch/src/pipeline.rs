//! Per-tile preparation pipeline
//!
//! One tile runs strictly sequentially: read the rasterized stream
//! network, verify congruence with the elevation template, build the cell
//! table, derive one flow per stream id from the configured source, join,
//! and persist. A tile either completes or fails as a whole; there is no
//! partial resume.

use crate::config::{FlowSourceSpec, TileConfig};
use floodprep_core::io::{read_geotiff, write_geotiff};
use floodprep_core::raster::Raster;
use floodprep_core::{Error, Result};
use floodprep_streamflow::join::{append_flow, flow_raster};
use floodprep_streamflow::raster_index::build_index;
use floodprep_streamflow::sources::{
    extract_ensemble_flows, extract_peak_flows, extract_return_period_flows, PeakFlows,
};
use tracing::{debug, info};

/// What one completed tile produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSummary {
    /// Stream cells in the tile
    pub cells: usize,
    /// Distinct stream ids in the tile
    pub stream_ids: usize,
    /// Requested ids the flow source did not cover
    pub unmapped_ids: usize,
}

/// Run one tile's preparation end to end.
pub fn prepare_tile(config: &TileConfig) -> Result<TileSummary> {
    let streams: Raster<i32> = read_geotiff(&config.streams_raster)?;

    if let Some(dem_path) = &config.dem_raster {
        let dem: Raster<f32> = read_geotiff(dem_path)?;
        dem.check_aligned_with(&streams)?;
    }

    let mut table = build_index(&streams);
    if table.is_empty() {
        return Err(Error::Table(format!(
            "no stream cells in {}",
            config.streams_raster.display()
        )));
    }
    let ids = table.unique_ids();
    debug!(cells = table.len(), ids = ids.len(), "built raster index");

    let flows = extract_flows(config, &ids)?;

    append_flow(&mut table, &flows, config.missing_policy)?;
    table.write_to(&config.stream_info)?;

    if let Some(out_path) = &config.flow_raster_out {
        let out = flow_raster(&streams, &table, &flows, config.missing_policy)?;
        write_geotiff(&out, out_path)?;
    }

    info!(
        tile = %config.name,
        cells = table.len(),
        unmapped = flows.missing().len(),
        "tile prepared"
    );

    Ok(TileSummary {
        cells: table.len(),
        stream_ids: ids.len(),
        unmapped_ids: flows.missing().len(),
    })
}

fn extract_flows(config: &TileConfig, ids: &[i32]) -> Result<PeakFlows> {
    match &config.flow_source {
        FlowSourceSpec::Ensemble { directory, spec } => {
            extract_ensemble_flows(directory, ids, *spec)
        }
        FlowSourceSpec::Deterministic { file, window } => {
            extract_peak_flows(file, ids, *window)
        }
        FlowSourceSpec::ReturnPeriod { file, period } => {
            extract_return_period_flows(file, ids, *period)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowSourceSpec;
    use floodprep_core::raster::{CellValue, GeoTransform};
    use floodprep_streamflow::join::MissingIdPolicy;
    use floodprep_streamflow::sources::ReturnPeriod;
    use std::path::Path;

    fn write_streams_raster(path: &Path, transform: GeoTransform) {
        let mut streams: Raster<i32> = Raster::filled(3, 3, i32::nodata());
        streams.set_transform(transform);
        streams.set(0, 0, 5).unwrap();
        streams.set(1, 1, 6).unwrap();
        write_geotiff(&streams, path).unwrap();
    }

    fn write_return_periods(path: &Path) {
        let mut nc = netcdf::create(path).unwrap();
        nc.add_dimension("rivid", 2).unwrap();
        let mut ids = nc.add_variable::<i32>("rivid", &["rivid"]).unwrap();
        ids.put_values(&[5, 6], ..).unwrap();
        let mut rp = nc
            .add_variable::<f64>("return_period_20", &["rivid"])
            .unwrap();
        rp.put_values(&[50.0, 60.0], ..).unwrap();
    }

    fn tile_config(dir: &Path) -> TileConfig {
        TileConfig {
            name: "test-tile".into(),
            streams_raster: dir.join("rasterized_streamfile.tif"),
            dem_raster: None,
            stream_info: dir.join("stream_info.txt"),
            flow_source: FlowSourceSpec::ReturnPeriod {
                file: dir.join("return_periods.nc"),
                period: ReturnPeriod::TwentyYear,
            },
            missing_policy: MissingIdPolicy::Abort,
            flow_raster_out: Some(dir.join("streamflow.tif")),
        }
    }

    #[test]
    fn test_tile_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = tile_config(dir.path());
        write_streams_raster(&config.streams_raster, GeoTransform::default());
        write_return_periods(&dir.path().join("return_periods.nc"));

        let summary = prepare_tile(&config).unwrap();
        assert_eq!(
            summary,
            TileSummary {
                cells: 2,
                stream_ids: 2,
                unmapped_ids: 0
            }
        );

        let table =
            floodprep_core::stream_info::StreamInfoTable::read_from(&config.stream_info)
                .unwrap();
        let flows: Vec<f64> = table.iter().map(|c| c.flow.unwrap()).collect();
        assert_eq!(flows, vec![50.0, 60.0]);

        let raster: Raster<f64> =
            read_geotiff(config.flow_raster_out.as_ref().unwrap()).unwrap();
        assert_eq!(raster.get(0, 0).unwrap(), 50.0);
        assert_eq!(raster.get(1, 1).unwrap(), 60.0);
        assert!(raster.get(2, 2).unwrap().is_nodata());
    }

    #[test]
    fn test_misaligned_dem_fails_tile() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = tile_config(dir.path());
        write_streams_raster(&config.streams_raster, GeoTransform::default());
        write_return_periods(&dir.path().join("return_periods.nc"));

        // elevation template on a shifted grid
        let dem_path = dir.path().join("elevation.tif");
        let mut dem: Raster<f32> = Raster::filled(3, 3, 100.0);
        dem.set_transform(GeoTransform::new(9999.0, 0.0, 1.0, -1.0));
        write_geotiff(&dem, &dem_path).unwrap();
        config.dem_raster = Some(dem_path);

        let err = prepare_tile(&config).unwrap_err();
        assert!(matches!(err, Error::Alignment { .. }));
    }

    #[test]
    fn test_missing_streams_raster_fails_tile() {
        let dir = tempfile::tempdir().unwrap();
        let config = tile_config(dir.path());
        let err = prepare_tile(&config).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_failed_tile_leaves_no_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = tile_config(dir.path());
        write_streams_raster(&config.streams_raster, GeoTransform::default());
        // no return-period file: extraction fails after indexing
        let _ = prepare_tile(&config).unwrap_err();
        assert!(!config.stream_info.exists());
    }
}
