//! Batch and per-tile configuration
//!
//! All configuration is explicit structs constructed once per run; a
//! tile's flow source is an enum, so selecting more than one mode is
//! unrepresentable rather than a runtime validation failure.

use floodprep_streamflow::aggregation::AggregationSpec;
use floodprep_streamflow::join::MissingIdPolicy;
use floodprep_streamflow::sources::{PeakSearchWindow, ReturnPeriod};
use std::path::{Path, PathBuf};

/// Conventional per-tile artifact names inside a tile directory.
pub const STREAMS_RASTER_NAME: &str = "rasterized_streamfile.tif";
pub const STREAM_INFO_NAME: &str = "stream_info.txt";
pub const ELEVATION_NAME: &str = "elevation.tif";
pub const FLOW_RASTER_NAME: &str = "streamflow.tif";

/// Where a tile's representative flows come from. Exactly one mode.
#[derive(Debug, Clone)]
pub enum FlowSourceSpec {
    /// Ensemble forecast archive: one file per member
    Ensemble {
        directory: PathBuf,
        spec: AggregationSpec,
    },
    /// Single deterministic run, reduced to its peak per id
    Deterministic {
        file: PathBuf,
        window: PeakSearchWindow,
    },
    /// Precomputed return-period table
    ReturnPeriod {
        file: PathBuf,
        period: ReturnPeriod,
    },
}

/// Everything one tile's preparation needs.
#[derive(Debug, Clone)]
pub struct TileConfig {
    /// Tile identifier used in logs and reports
    pub name: String,
    /// Rasterized stream network for this tile
    pub streams_raster: PathBuf,
    /// Elevation template; when present the stream raster must be
    /// congruent with it, and raster output inherits its grid
    pub dem_raster: Option<PathBuf>,
    /// Destination of the stream-info table
    pub stream_info: PathBuf,
    /// Flow source for this run
    pub flow_source: FlowSourceSpec,
    /// What to do with stream ids the source does not cover
    pub missing_policy: MissingIdPolicy,
    /// Optional streamflow raster destination
    pub flow_raster_out: Option<PathBuf>,
}

/// Batch-level configuration: one watershed directory of tile
/// subdirectories sharing a flow source.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory holding one subdirectory per watershed tile
    pub watershed_dir: PathBuf,
    /// Flow source shared by every tile in the batch
    pub flow_source: FlowSourceSpec,
    /// Missing-id policy shared by every tile
    pub missing_policy: MissingIdPolicy,
    /// Also write the per-tile streamflow raster
    pub write_flow_raster: bool,
}

impl BatchConfig {
    /// The tile configuration for one discovered tile directory,
    /// following the conventional artifact names.
    pub fn tile_config(&self, tile_dir: &Path) -> TileConfig {
        let name = tile_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| tile_dir.display().to_string());

        let dem = tile_dir.join(ELEVATION_NAME);
        TileConfig {
            name,
            streams_raster: tile_dir.join(STREAMS_RASTER_NAME),
            dem_raster: dem.exists().then_some(dem),
            stream_info: tile_dir.join(STREAM_INFO_NAME),
            flow_source: self.flow_source.clone(),
            missing_policy: self.missing_policy,
            flow_raster_out: self
                .write_flow_raster
                .then(|| tile_dir.join(FLOW_RASTER_NAME)),
        }
    }
}
