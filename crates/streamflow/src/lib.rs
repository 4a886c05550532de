//! # floodprep streamflow
//!
//! Streamflow derivation for flood-routing preparation: builds the
//! raster-indexed stream cell table, derives one representative flow per
//! stream id from forecast/deterministic/return-period sources, and joins
//! the result back onto the cell table or a streamflow raster.
//!
//! The per-tile flow is: rasterized stream network → [`raster_index`] →
//! unique id list → [`sources`] (+ [`aggregation`] for ensembles) →
//! [`join`].

pub mod aggregation;
pub mod axis;
pub mod join;
pub mod raster_index;
pub mod resample;
pub mod sources;

pub use aggregation::{reduce_ensemble, AggregationSpec, Reducer};
pub use axis::{detect_axis_order, AxisOrder};
pub use join::{append_flow, flow_raster, MissingIdPolicy};
pub use raster_index::{build_index, index_from_file};
pub use sources::{
    extract_ensemble_flows, extract_peak_flows, extract_return_period_flows, PeakFlows,
    PeakSearchWindow, ReturnPeriod,
};
