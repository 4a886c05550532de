//! Ensemble-forecast extraction
//!
//! Scans a forecast directory for one netcdf file per ensemble member,
//! assembles a `[member][timestep]` matrix per requested stream id over
//! the shared analysis window, and collapses each matrix with the
//! caller's aggregation spec. A malformed member is skipped with a
//! warning and the extraction proceeds; an empty directory or a fully
//! unusable member set is fatal for the tile.

use crate::aggregation::{reduce_ensemble, AggregationSpec};
use crate::axis::detect_axis_order;
use crate::resample::{analysis_window, resample_control_series};
use crate::sources::{
    find_discharge_variable, open_dataset, read_id_coordinate, read_series, PeakFlows,
};
use floodprep_core::{Error, Result};
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Member indices at or above this value carry the high-resolution
/// control forecast rather than a regular perturbed member.
pub const CONTROL_MEMBER_THRESHOLD: u32 = 52;

/// One member file's contribution: its index and one series per
/// requested-and-found stream id.
struct MemberSeries {
    member: u32,
    series: Vec<Vec<f64>>,
}

/// Derive one representative flow per requested stream id from an
/// ensemble forecast directory.
///
/// Returned flows are keyed by id; requested ids absent from the archive
/// are reported as missing for the joiner's policy to resolve.
pub fn extract_ensemble_flows(
    dir: &Path,
    ids: &[i32],
    spec: AggregationSpec,
) -> Result<PeakFlows> {
    let files = member_files(dir)?;
    if files.is_empty() {
        return Err(Error::SourceNotFound {
            path: dir.to_path_buf(),
        });
    }

    // Regular members first: they establish the expected series length
    // and therefore the analysis window the control is resampled into.
    let (regular, control): (Vec<_>, Vec<_>) = files
        .into_iter()
        .filter_map(|path| match member_index(&path) {
            Some(member) => Some((path, member)),
            None => {
                warn!(path = %path.display(), "cannot parse member index, skipping");
                None
            }
        })
        .partition(|&(_, member)| member < CONTROL_MEMBER_THRESHOLD);

    let mut found_ids: Option<Vec<i32>> = None;
    let mut missing: Vec<i32> = Vec::new();
    let mut time_len: Option<usize> = None;
    let mut members: Vec<MemberSeries> = Vec::new();

    for (path, member) in &regular {
        match read_member(path, ids, &mut found_ids, &mut missing) {
            Ok((series, len)) => {
                let expected = *time_len.get_or_insert(len);
                if len != expected {
                    warn!(
                        path = %path.display(),
                        len, expected, "member series length differs, skipping"
                    );
                    continue;
                }
                let window = analysis_window(expected).min(expected);
                members.push(MemberSeries {
                    member: *member,
                    series: series
                        .into_iter()
                        .map(|s| s[..window.min(s.len())].to_vec())
                        .collect(),
                });
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping malformed member"),
        }
    }

    let Some(time_len) = time_len else {
        return Err(Error::Other(format!(
            "no usable ensemble members in {}",
            dir.display()
        )));
    };
    let window = analysis_window(time_len).min(time_len);

    for (path, member) in &control {
        match read_member(path, ids, &mut found_ids, &mut missing) {
            Ok((series, _)) => {
                let resampled: Vec<Vec<f64>> = series
                    .into_iter()
                    .map(|s| resample_control_series(&s, window))
                    .collect();
                if resampled.iter().any(|s| s.len() != window) {
                    warn!(
                        path = %path.display(),
                        "control series does not span the analysis window, skipping"
                    );
                    continue;
                }
                members.push(MemberSeries {
                    member: *member,
                    series: resampled,
                });
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping malformed member"),
        }
    }

    // Deterministic member order regardless of directory listing order.
    members.sort_by_key(|m| m.member);
    debug!(
        n_members = members.len(),
        window, "assembled ensemble matrix"
    );

    let found_ids = found_ids.unwrap_or_default();
    let mut values = BTreeMap::new();
    for (pos, &id) in found_ids.iter().enumerate() {
        let mut matrix = Array2::zeros((members.len(), window));
        for (m, member) in members.iter().enumerate() {
            for (t, &v) in member.series[pos].iter().enumerate() {
                matrix[(m, t)] = v;
            }
        }
        values.insert(id, reduce_ensemble(&matrix.view(), spec)?);
    }

    missing.sort_unstable();
    missing.dedup();
    Ok(PeakFlows::new(values, missing))
}

/// Forecast member files in the directory: regular files with a `.nc`
/// extension (case-insensitive), sorted descending by name.
fn member_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|_| Error::SourceNotFound {
        path: dir.to_path_buf(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("nc"))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    files.reverse();
    Ok(files)
}

/// Ensemble member index from the trailing `_<n>` of the file stem.
fn member_index(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .rsplit('_')
        .next()?
        .parse()
        .ok()
}

/// Read one member file: per-id series (in `found_ids` order) and the
/// file's time-axis length.
///
/// The first readable file fixes which requested ids the archive covers;
/// later files must cover the same set or are rejected as malformed.
fn read_member(
    path: &Path,
    requested: &[i32],
    found_ids: &mut Option<Vec<i32>>,
    missing: &mut Vec<i32>,
) -> Result<(Vec<Vec<f64>>, usize)> {
    let file = open_dataset(path)?;
    let coord = read_id_coordinate(&file, path)?;
    let positions: HashMap<i32, usize> =
        coord.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let ids = match found_ids {
        Some(ids) => ids.clone(),
        None => {
            let (found, absent): (Vec<i32>, Vec<i32>) = requested
                .iter()
                .copied()
                .partition(|id| positions.contains_key(id));
            missing.extend(absent);
            *found_ids = Some(found.clone());
            found
        }
    };

    let var = find_discharge_variable(&file, path)?;
    let dims = var.dimensions();
    let dim_names: Vec<String> = dims.iter().map(|d| d.name()).collect();
    let dim_refs: Vec<&str> = dim_names.iter().map(String::as_str).collect();
    let order = detect_axis_order(&dim_refs)?;
    let time_len = dims[order.time_axis].len();

    let mut series = Vec::with_capacity(ids.len());
    for id in &ids {
        let pos = positions.get(id).copied().ok_or(Error::MalformedMember {
            path: path.to_path_buf(),
            reason: format!("stream id {id} missing from member coordinate"),
        })?;
        series.push(read_series(&var, order.id_major(), pos, path)?);
    }

    Ok((series, time_len))
}
