//! Deterministic-run extraction
//!
//! Reads a single model-run discharge file and reduces each requested
//! stream id's series to its peak (maximum) flow, optionally restricted
//! to a caller-supplied date window. With exactly one realization there
//! is no ensemble to collapse, so no aggregation spec is involved.

use crate::axis::detect_axis_order;
use crate::sources::{
    find_discharge_variable, ids_per_batch, open_dataset, read_id_coordinate, read_series,
    PeakFlows,
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use floodprep_core::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Optional date bounds for the peak search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeakSearchWindow {
    /// Earliest timestep to consider (inclusive)
    pub start: Option<NaiveDateTime>,
    /// Latest timestep to consider (inclusive)
    pub end: Option<NaiveDateTime>,
}

impl PeakSearchWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Extract the peak flow per requested stream id from one model run.
///
/// Requested ids absent from the file (or whose series holds no finite
/// sample) are reported as missing for the joiner's policy to resolve.
pub fn extract_peak_flows(
    path: &Path,
    ids: &[i32],
    window: PeakSearchWindow,
) -> Result<PeakFlows> {
    let file = open_dataset(path)?;
    let coord = read_id_coordinate(&file, path)?;
    let positions: HashMap<i32, usize> =
        coord.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let var = find_discharge_variable(&file, path)?;
    let dims = var.dimensions();
    let dim_names: Vec<String> = dims.iter().map(|d| d.name()).collect();
    let dim_refs: Vec<&str> = dim_names.iter().map(String::as_str).collect();
    let order = detect_axis_order(&dim_refs)?;
    let time_len = dims[order.time_axis].len();

    let (t0, t1) = time_range(&file, &dim_names[order.time_axis], time_len, window, path)?;
    if t0 >= t1 {
        return Err(Error::Other(format!(
            "{}: peak search window selects no timesteps",
            path.display()
        )));
    }

    let (found, mut missing): (Vec<i32>, Vec<i32>) = ids
        .iter()
        .copied()
        .partition(|id| positions.contains_key(id));

    let mut values = BTreeMap::new();
    let step = ids_per_batch(found.len(), t1 - t0);
    for batch in found.chunks(step.max(1)) {
        debug!(
            first = batch.first(),
            last = batch.last(),
            of = found.len(),
            "extracting stream id batch"
        );
        for &id in batch {
            let pos = positions[&id];
            let series = read_series(&var, order.id_major(), pos, path)?;
            let peak = series[t0..t1.min(series.len())]
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(f64::NEG_INFINITY, f64::max);
            if peak.is_finite() {
                values.insert(id, peak);
            } else {
                missing.push(id);
            }
        }
    }

    missing.sort_unstable();
    missing.dedup();
    Ok(PeakFlows::new(values, missing))
}

/// Resolve the peak-search window to a half-open timestep range.
///
/// An unbounded window spans the whole series without touching the time
/// axis; a bounded one requires a decodable CF-style time variable.
fn time_range(
    file: &netcdf::File,
    time_dim: &str,
    time_len: usize,
    window: PeakSearchWindow,
    path: &Path,
) -> Result<(usize, usize)> {
    if window.is_unbounded() {
        return Ok((0, time_len));
    }

    let var = file
        .variable(time_dim)
        .ok_or_else(|| Error::MissingVariable {
            name: time_dim.to_string(),
            path: path.to_path_buf(),
        })?;
    let offsets = var
        .get_values::<f64, _>(..)
        .map_err(|e| Error::Netcdf(format!("{}: {time_dim}: {e}", path.display())))?;

    let units = match var.attribute("units").map(|a| a.value()) {
        Some(Ok(netcdf::AttributeValue::Str(s))) => s,
        _ => {
            return Err(Error::Netcdf(format!(
                "{}: time variable has no readable 'units' attribute",
                path.display()
            )))
        }
    };
    let (base, seconds_per_unit) = parse_time_units(&units, path)?;

    let stamps: Vec<NaiveDateTime> = offsets
        .iter()
        .map(|&off| base + TimeDelta::seconds((off * seconds_per_unit) as i64))
        .collect();

    let t0 = match window.start {
        Some(start) => stamps.iter().position(|&s| s >= start).unwrap_or(time_len),
        None => 0,
    };
    let t1 = match window.end {
        Some(end) => stamps
            .iter()
            .rposition(|&s| s <= end)
            .map(|i| i + 1)
            .unwrap_or(0),
        None => time_len,
    };

    Ok((t0, t1.min(time_len)))
}

/// Decode a CF-style time `units` attribute, e.g.
/// "seconds since 1970-01-01 00:00:00".
fn parse_time_units(units: &str, path: &Path) -> Result<(NaiveDateTime, f64)> {
    let bad = || {
        Error::Netcdf(format!(
            "{}: cannot parse time units '{units}'",
            path.display()
        ))
    };

    let (unit, base) = units.split_once(" since ").ok_or_else(bad)?;
    let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "s" => 1.0,
        "minutes" | "minute" | "min" => 60.0,
        "hours" | "hour" | "h" => 3600.0,
        "days" | "day" | "d" => 86400.0,
        _ => return Err(bad()),
    };

    let base = base.trim().trim_end_matches(" UTC");
    let parsed = NaiveDateTime::parse_from_str(base, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(base, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(base, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|_| bad())?;

    Ok((parsed, seconds_per_unit))
}
