//! Discharge sources
//!
//! Three interchangeable ways to obtain one representative flow per
//! stream id: an ensemble forecast archive, a single deterministic model
//! run, or a precomputed return-period table. Mode selection is the
//! caller's responsibility; each mode lives in its own submodule.

mod deterministic;
mod ensemble;
mod return_period;

pub use deterministic::{extract_peak_flows, PeakSearchWindow};
pub use ensemble::{extract_ensemble_flows, CONTROL_MEMBER_THRESHOLD};
pub use return_period::{extract_return_period_flows, ReturnPeriod};

use floodprep_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Upper bound on `ids_per_batch * time_len` when a series variable is
/// read in id batches, keeping one batch's worth of samples in memory.
pub const CHUNK_ELEMENT_BUDGET: usize = 16_000_000;

/// Variable names recognized as the discharge series.
pub(crate) const DISCHARGE_LABELS: [&str; 3] = ["Qout", "streamflow", "discharge"];

/// Variable names recognized as the stream-id coordinate.
pub(crate) const ID_COORD_LABELS: [&str; 4] = ["rivid", "COMID", "station_id", "river_id"];

/// One scalar flow per stream id, plus the requested ids the source did
/// not cover. Whether missing ids zero-fill or abort is the joiner's
/// policy decision, not the source's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakFlows {
    values: BTreeMap<i32, f64>,
    missing: Vec<i32>,
}

impl PeakFlows {
    pub fn new(values: BTreeMap<i32, f64>, missing: Vec<i32>) -> Self {
        Self { values, missing }
    }

    /// The flow for one stream id, if the source covered it
    pub fn get(&self, stream_id: i32) -> Option<f64> {
        self.values.get(&stream_id).copied()
    }

    /// Requested ids absent from the source
    pub fn missing(&self) -> &[i32] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.values.iter().map(|(&id, &v)| (id, v))
    }
}

impl FromIterator<(i32, f64)> for PeakFlows {
    fn from_iter<I: IntoIterator<Item = (i32, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
            missing: Vec::new(),
        }
    }
}

/// Number of stream ids per extraction batch so that a batch's samples
/// stay under [`CHUNK_ELEMENT_BUDGET`]. Batches never split one id's
/// series; at least one id is always processed.
pub(crate) fn ids_per_batch(n_ids: usize, time_len: usize) -> usize {
    (CHUNK_ELEMENT_BUDGET / time_len.max(1)).clamp(1, n_ids.max(1))
}

/// Open a netcdf dataset, mapping open failures to the tile-fatal
/// source-not-found error.
pub(crate) fn open_dataset(path: &Path) -> Result<netcdf::File> {
    netcdf::open(path).map_err(|_| Error::SourceNotFound {
        path: path.to_path_buf(),
    })
}

/// Read the stream-id coordinate array, trying each recognized label.
pub(crate) fn read_id_coordinate(file: &netcdf::File, path: &Path) -> Result<Vec<i32>> {
    for label in ID_COORD_LABELS {
        if let Some(var) = file.variable(label) {
            return var
                .get_values::<i32, _>(..)
                .map_err(|e| Error::Netcdf(format!("{}: {label}: {e}", path.display())));
        }
    }
    Err(Error::MissingVariable {
        name: ID_COORD_LABELS.join("|"),
        path: path.to_path_buf(),
    })
}

/// Locate the discharge variable by its recognized labels.
pub(crate) fn find_discharge_variable<'f>(
    file: &'f netcdf::File,
    path: &Path,
) -> Result<netcdf::Variable<'f>> {
    for label in DISCHARGE_LABELS {
        if let Some(var) = file.variable(label) {
            return Ok(var);
        }
    }
    Err(Error::MissingVariable {
        name: DISCHARGE_LABELS.join("|"),
        path: path.to_path_buf(),
    })
}

/// Read one id's full series from a 2-D discharge variable, honoring the
/// detected axis order.
pub(crate) fn read_series(
    var: &netcdf::Variable<'_>,
    id_major: bool,
    id_pos: usize,
    path: &Path,
) -> Result<Vec<f64>> {
    let result = if id_major {
        var.get_values::<f64, _>((id_pos, ..))
    } else {
        var.get_values::<f64, _>((.., id_pos))
    };
    result.map_err(|e| Error::Netcdf(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_per_batch_bounds() {
        // small series: everything fits in one batch
        assert_eq!(ids_per_batch(4000, 100), 4000);
        // large series: budget divides down
        assert_eq!(ids_per_batch(10_000, 8_000_000), 2);
        assert_eq!(ids_per_batch(10_000, 32_000_000), 1);
        assert_eq!(ids_per_batch(10_000, 16_000), 1000);
        // never zero
        assert_eq!(ids_per_batch(0, 0), 1);
    }

    #[test]
    fn test_batches_never_split_a_series() {
        let n_ids = 10_000;
        let time_len = 16_000;
        let step = ids_per_batch(n_ids, time_len);
        assert!(step * time_len <= CHUNK_ELEMENT_BUDGET);
        // whole ids only: the batch size is an id count, not a sample count
        assert_eq!(CHUNK_ELEMENT_BUDGET / time_len, step);
    }

    #[test]
    fn test_peak_flows_lookup() {
        let flows: PeakFlows = [(7, 12.5), (9, 3.0)].into_iter().collect();
        assert_eq!(flows.get(7), Some(12.5));
        assert_eq!(flows.get(8), None);
        assert_eq!(flows.len(), 2);
    }
}
