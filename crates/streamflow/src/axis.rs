//! Axis-order detection for discharge variables.
//!
//! Forecast archives are not consistent about whether the discharge
//! variable is laid out (time, stream-id) or (stream-id, time), so the
//! orientation is detected from the dimension names rather than assumed.
//! Detection is a pure function over the label list and nothing else.

use floodprep_core::{Error, Result};

/// Dimension labels recognized as the time axis.
const TIME_LABELS: [&str; 1] = ["time"];

/// Dimension labels recognized as the stream-id axis.
const ID_LABELS: [&str; 4] = ["rivid", "comid", "station_id", "river_id"];

/// Which axis of a 2-D discharge variable is which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisOrder {
    /// Index of the time axis (0 or 1)
    pub time_axis: usize,
    /// Index of the stream-id axis (0 or 1)
    pub id_axis: usize,
}

impl AxisOrder {
    /// Whether the variable is laid out (stream-id, time)
    pub fn id_major(&self) -> bool {
        self.id_axis == 0
    }
}

fn is_time_label(name: &str) -> bool {
    TIME_LABELS.iter().any(|l| name.eq_ignore_ascii_case(l))
}

fn is_id_label(name: &str) -> bool {
    ID_LABELS.iter().any(|l| name.eq_ignore_ascii_case(l))
}

/// Detect the orientation of a 2-D discharge variable from its dimension
/// names.
///
/// Exactly one dimension must match a recognized time label and exactly
/// one must match a recognized stream-id label (case-insensitively);
/// anything else is a malformed source.
pub fn detect_axis_order(dim_names: &[&str]) -> Result<AxisOrder> {
    if dim_names.len() != 2 {
        return Err(Error::Netcdf(format!(
            "discharge variable must be 2-D, found {} dimensions ({})",
            dim_names.len(),
            dim_names.join(", ")
        )));
    }

    let time_axis = match (is_time_label(dim_names[0]), is_time_label(dim_names[1])) {
        (true, false) => 0,
        (false, true) => 1,
        (true, true) => {
            return Err(Error::Netcdf(format!(
                "both dimensions look like a time axis ({})",
                dim_names.join(", ")
            )))
        }
        (false, false) => {
            return Err(Error::Netcdf(format!(
                "no recognized time axis among ({})",
                dim_names.join(", ")
            )))
        }
    };

    let id_axis = 1 - time_axis;
    if !is_id_label(dim_names[id_axis]) {
        return Err(Error::Netcdf(format!(
            "no recognized stream-id axis among ({})",
            dim_names.join(", ")
        )));
    }

    Ok(AxisOrder { time_axis, id_axis })
}
