//! Two-stage ensemble reduction
//!
//! Collapses a `[member][timestep]` discharge matrix into one scalar per
//! stream id. Stage 1 reduces across members independently at each
//! timestep, producing a single series; stage 2 reduces that series over
//! time. Both stages draw from the same reducer family. Standard
//! deviation is the population form (divide by N).

use floodprep_core::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use std::fmt;
use std::str::FromStr;

/// A reduction rule applied along one axis.
///
/// The std variants compute the mean themselves, so a spec combining
/// "std without mean" is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Max,
    Min,
    Mean,
    MeanPlusStd,
    MeanMinusStd,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Max => "max",
            Reducer::Min => "min",
            Reducer::Mean => "mean",
            Reducer::MeanPlusStd => "mean_plus_std",
            Reducer::MeanMinusStd => "mean_minus_std",
        }
    }
}

impl FromStr for Reducer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "max" => Ok(Reducer::Max),
            "min" => Ok(Reducer::Min),
            "mean" => Ok(Reducer::Mean),
            "mean_plus_std" => Ok(Reducer::MeanPlusStd),
            "mean_minus_std" => Ok(Reducer::MeanMinusStd),
            other => Err(Error::InvalidAggregationSpec(format!(
                "unknown reducer '{other}' (expected max, min, mean, \
                 mean_plus_std or mean_minus_std)"
            ))),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an ensemble collapses into one scalar per stream id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationSpec {
    /// Stage 1: reduction across ensemble members, per timestep
    pub across_members: Reducer,
    /// Stage 2: reduction of the resulting series over time
    pub across_time: Reducer,
}

impl AggregationSpec {
    pub fn new(across_members: Reducer, across_time: Reducer) -> Self {
        Self {
            across_members,
            across_time,
        }
    }
}

impl Default for AggregationSpec {
    fn default() -> Self {
        // The operational forecast configuration: spread-adjusted mean
        // per timestep, peak over the forecast window.
        Self::new(Reducer::MeanPlusStd, Reducer::Max)
    }
}

/// Stage 1: reduce the member axis (rows) per timestep.
fn reduce_members(matrix: &ArrayView2<'_, f64>, reducer: Reducer) -> Array1<f64> {
    match reducer {
        Reducer::Max => matrix.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| acc.max(v)),
        Reducer::Min => matrix.fold_axis(Axis(0), f64::INFINITY, |&acc, &v| acc.min(v)),
        Reducer::Mean => mean_axis0(matrix),
        Reducer::MeanPlusStd => mean_axis0(matrix) + std_axis0(matrix),
        Reducer::MeanMinusStd => mean_axis0(matrix) - std_axis0(matrix),
    }
}

/// Stage 2: reduce a series over time into one scalar.
fn reduce_series(series: &ArrayView1<'_, f64>, reducer: Reducer) -> f64 {
    let n = series.len() as f64;
    match reducer {
        Reducer::Max => series.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)),
        Reducer::Min => series.fold(f64::INFINITY, |acc, &v| acc.min(v)),
        Reducer::Mean => series.sum() / n,
        Reducer::MeanPlusStd => {
            let mean = series.sum() / n;
            mean + population_std(series, mean)
        }
        Reducer::MeanMinusStd => {
            let mean = series.sum() / n;
            mean - population_std(series, mean)
        }
    }
}

fn mean_axis0(matrix: &ArrayView2<'_, f64>) -> Array1<f64> {
    let n = matrix.nrows() as f64;
    matrix.sum_axis(Axis(0)) / n
}

fn std_axis0(matrix: &ArrayView2<'_, f64>) -> Array1<f64> {
    matrix.std_axis(Axis(0), 0.0)
}

fn population_std(series: &ArrayView1<'_, f64>, mean: f64) -> f64 {
    let n = series.len() as f64;
    (series.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Collapse a `[member][timestep]` matrix into one scalar.
///
/// Fails on an empty matrix; an ensemble with zero members or zero
/// timesteps has no defined reduction.
pub fn reduce_ensemble(matrix: &ArrayView2<'_, f64>, spec: AggregationSpec) -> Result<f64> {
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return Err(Error::InvalidAggregationSpec(format!(
            "cannot reduce an empty ensemble ({} members x {} timesteps)",
            matrix.nrows(),
            matrix.ncols()
        )));
    }

    let series = reduce_members(matrix, spec.across_members);
    Ok(reduce_series(&series.view(), spec.across_time))
}
