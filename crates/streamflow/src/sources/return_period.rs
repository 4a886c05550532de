//! Return-period extraction
//!
//! Looks up one precomputed statistical discharge per stream id from a
//! return-period table file. The table is externally generated from a
//! historical run and never mutated here.

use crate::sources::{open_dataset, read_id_coordinate, PeakFlows};
use floodprep_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Recognized exceedance categories and their variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnPeriod {
    TwoYear,
    TenYear,
    TwentyYear,
    /// Historical maximum rather than a fitted return period
    MaxFlow,
}

impl ReturnPeriod {
    /// The variable holding this category in the table file.
    pub fn variable_name(&self) -> &'static str {
        match self {
            ReturnPeriod::TwoYear => "return_period_2",
            ReturnPeriod::TenYear => "return_period_10",
            ReturnPeriod::TwentyYear => "return_period_20",
            ReturnPeriod::MaxFlow => "max_flow",
        }
    }
}

impl FromStr for ReturnPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "return_period_2" => Ok(ReturnPeriod::TwoYear),
            "return_period_10" => Ok(ReturnPeriod::TenYear),
            "return_period_20" => Ok(ReturnPeriod::TwentyYear),
            "max_flow" => Ok(ReturnPeriod::MaxFlow),
            other => Err(Error::Other(format!(
                "invalid return period '{other}' (expected return_period_2, \
                 return_period_10, return_period_20 or max_flow)"
            ))),
        }
    }
}

impl fmt::Display for ReturnPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.variable_name())
    }
}

/// Look up one category's discharge for each requested stream id.
///
/// Ids absent from the table are reported as missing; whether that
/// zero-fills or aborts is the joiner's policy.
pub fn extract_return_period_flows(
    path: &Path,
    ids: &[i32],
    period: ReturnPeriod,
) -> Result<PeakFlows> {
    let file = open_dataset(path)?;

    let var = file
        .variable(period.variable_name())
        .ok_or_else(|| Error::MissingVariable {
            name: period.variable_name().to_string(),
            path: path.to_path_buf(),
        })?;
    let data = var
        .get_values::<f64, _>(..)
        .map_err(|e| Error::Netcdf(format!("{}: {}: {e}", path.display(), period)))?;

    let coord = read_id_coordinate(&file, path)?;
    if data.len() != coord.len() {
        return Err(Error::Netcdf(format!(
            "{}: {} has {} values for {} stream ids",
            path.display(),
            period,
            data.len(),
            coord.len()
        )));
    }

    let by_id: BTreeMap<i32, f64> = coord.iter().copied().zip(data.iter().copied()).collect();

    let mut values = BTreeMap::new();
    let mut missing = Vec::new();
    for &id in ids {
        match by_id.get(&id) {
            Some(&flow) => {
                values.insert(id, flow);
            }
            None => missing.push(id),
        }
    }

    missing.sort_unstable();
    missing.dedup();
    Ok(PeakFlows::new(values, missing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_categories() {
        assert_eq!(
            "return_period_20".parse::<ReturnPeriod>().unwrap(),
            ReturnPeriod::TwentyYear
        );
        assert_eq!(
            "max_flow".parse::<ReturnPeriod>().unwrap(),
            ReturnPeriod::MaxFlow
        );
        assert!("return_period_50".parse::<ReturnPeriod>().is_err());
    }

    #[test]
    fn test_variable_names() {
        assert_eq!(ReturnPeriod::TwoYear.variable_name(), "return_period_2");
        assert_eq!(ReturnPeriod::TenYear.variable_name(), "return_period_10");
        assert_eq!(ReturnPeriod::TwentyYear.variable_name(), "return_period_20");
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = extract_return_period_flows(
            Path::new("/no/such/return_periods.nc"),
            &[1],
            ReturnPeriod::TwentyYear,
        )
        .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }
}
