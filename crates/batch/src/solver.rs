//! Solver input-file generation and invocation
//!
//! The external flood-routing solver takes a single `key value` text
//! file naming its inputs and tuning parameters. The parameter set is an
//! explicit enumerated schema: unknown keys fail fast with the offending
//! name instead of being silently absorbed.

use floodprep_core::io::temp_write;
use floodprep_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Enumerated solver parameters. Unset fields are omitted from the
/// generated input file; the solver applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverParams {
    pub dem_raster_file_path: Option<PathBuf>,
    pub stream_info_file_path: Option<PathBuf>,
    pub manning_n_raster_file_path: Option<PathBuf>,
    /// Cross-section sampling distance
    pub x_section_dist: Option<f64>,
    pub default_manning_n: Option<f64>,
    /// Cells around the center searched for the cross-section low point
    pub low_spot_range: Option<u32>,
    /// Reuse the previous depth when a cross-section is slightly over
    pub use_prev_d_4_xsect: Option<bool>,
    /// Degrees (+/-) swept to catch all boundary orientations
    pub degree_manipulation: Option<f64>,
    /// Interval between swept degrees
    pub degree_interval: Option<f64>,
    /// Cells sampled past the water depth in each cross-section
    pub cells_past_water_depth: Option<u32>,
    /// Limits runaway overflow in erroneous reaches
    pub q_limit: Option<f64>,
    /// Drop cross-sections that do not fully connect
    pub eliminate_xsection: Option<bool>,
    pub xsect_file_path: Option<PathBuf>,
    pub out_flood_map_raster_path: Option<PathBuf>,
    pub out_flood_depth_raster_path: Option<PathBuf>,
    pub out_flood_map_shapefile_path: Option<PathBuf>,
}

impl SolverParams {
    /// The `key value` pairs of every set field, in schema order.
    fn pairs(&self) -> Vec<(&'static str, String)> {
        fn path(v: &Option<PathBuf>) -> Option<String> {
            v.as_ref().map(|p| p.display().to_string())
        }
        fn num<T: ToString>(v: &Option<T>) -> Option<String> {
            v.as_ref().map(|n| n.to_string())
        }
        fn flag(v: &Option<bool>) -> Option<String> {
            v.map(|b| if b { "1" } else { "0" }.to_string())
        }

        [
            ("dem_raster_file_path", path(&self.dem_raster_file_path)),
            ("stream_info_file_path", path(&self.stream_info_file_path)),
            (
                "manning_n_raster_file_path",
                path(&self.manning_n_raster_file_path),
            ),
            ("x_section_dist", num(&self.x_section_dist)),
            ("default_manning_n", num(&self.default_manning_n)),
            ("low_spot_range", num(&self.low_spot_range)),
            ("use_prev_d_4_xsect", flag(&self.use_prev_d_4_xsect)),
            ("degree_manipulation", num(&self.degree_manipulation)),
            ("degree_interval", num(&self.degree_interval)),
            ("cells_past_water_depth", num(&self.cells_past_water_depth)),
            ("q_limit", num(&self.q_limit)),
            ("eliminate_xsection", flag(&self.eliminate_xsection)),
            ("xsect_file_path", path(&self.xsect_file_path)),
            (
                "out_flood_map_raster_path",
                path(&self.out_flood_map_raster_path),
            ),
            (
                "out_flood_depth_raster_path",
                path(&self.out_flood_depth_raster_path),
            ),
            (
                "out_flood_map_shapefile_path",
                path(&self.out_flood_map_shapefile_path),
            ),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect()
    }

    /// Set one field by its input-file key. Unknown keys and unparseable
    /// values fail with the offending name.
    fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| Error::Solver(format!("bad value '{value}' for '{key}'")))
        }
        fn parse_flag(key: &str, value: &str) -> Result<bool> {
            match value {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(Error::Solver(format!("bad value '{value}' for '{key}'"))),
            }
        }

        match key {
            "dem_raster_file_path" => self.dem_raster_file_path = Some(value.into()),
            "stream_info_file_path" => self.stream_info_file_path = Some(value.into()),
            "manning_n_raster_file_path" => {
                self.manning_n_raster_file_path = Some(value.into())
            }
            "x_section_dist" => self.x_section_dist = Some(parse_num(key, value)?),
            "default_manning_n" => self.default_manning_n = Some(parse_num(key, value)?),
            "low_spot_range" => self.low_spot_range = Some(parse_num(key, value)?),
            "use_prev_d_4_xsect" => self.use_prev_d_4_xsect = Some(parse_flag(key, value)?),
            "degree_manipulation" => self.degree_manipulation = Some(parse_num(key, value)?),
            "degree_interval" => self.degree_interval = Some(parse_num(key, value)?),
            "cells_past_water_depth" => {
                self.cells_past_water_depth = Some(parse_num(key, value)?)
            }
            "q_limit" => self.q_limit = Some(parse_num(key, value)?),
            "eliminate_xsection" => self.eliminate_xsection = Some(parse_flag(key, value)?),
            "xsect_file_path" => self.xsect_file_path = Some(value.into()),
            "out_flood_map_raster_path" => {
                self.out_flood_map_raster_path = Some(value.into())
            }
            "out_flood_depth_raster_path" => {
                self.out_flood_depth_raster_path = Some(value.into())
            }
            "out_flood_map_shapefile_path" => {
                self.out_flood_map_shapefile_path = Some(value.into())
            }
            other => {
                return Err(Error::Solver(format!(
                    "unknown solver parameter '{other}'"
                )))
            }
        }
        Ok(())
    }

    /// Write the input file: one `key value` line per set field.
    pub fn write_input_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut body = String::new();
        for (key, value) in self.pairs() {
            body.push_str(key);
            body.push(' ');
            body.push_str(&value);
            body.push('\n');
        }
        temp_write(path.as_ref(), body.as_bytes())
    }

    /// Fill unset fields from an existing input file, then rewrite it so
    /// the file reflects the merged parameter set. Comment (`#`) and
    /// blank lines are ignored; unknown keys are rejected.
    pub fn update_input_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|_| Error::SourceNotFound {
            path: path.to_path_buf(),
        })?;

        let existing = Self::parse(&text)?;
        self.merge_unset_from(&existing);
        self.write_input_file(path)
    }

    fn parse(text: &str) -> Result<Self> {
        let mut params = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once(char::is_whitespace).ok_or_else(|| {
                Error::Solver(format!("parameter '{line}' has no value"))
            })?;
            params.set_field(key, value.trim())?;
        }
        Ok(params)
    }

    fn merge_unset_from(&mut self, other: &Self) {
        macro_rules! take_if_unset {
            ($($field:ident),* $(,)?) => {
                $(if self.$field.is_none() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        take_if_unset!(
            dem_raster_file_path,
            stream_info_file_path,
            manning_n_raster_file_path,
            x_section_dist,
            default_manning_n,
            low_spot_range,
            use_prev_d_4_xsect,
            degree_manipulation,
            degree_interval,
            cells_past_water_depth,
            q_limit,
            eliminate_xsection,
            xsect_file_path,
            out_flood_map_raster_path,
            out_flood_depth_raster_path,
            out_flood_map_shapefile_path,
        );
    }
}

/// Invokes the external solver executable with a generated input file.
#[derive(Debug, Clone)]
pub struct SolverRunner {
    executable: PathBuf,
}

impl SolverRunner {
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Run the solver against an input file, capturing its output.
    pub fn run(&self, input_file: &Path) -> Result<()> {
        info!(input = %input_file.display(), "running solver");
        let output = Command::new(&self.executable)
            .arg(input_file)
            .output()
            .map_err(|e| {
                Error::Solver(format!(
                    "cannot spawn {}: {e}",
                    self.executable.display()
                ))
            })?;

        if !output.status.success() {
            return Err(Error::Solver(format!(
                "solver exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(target: "solver", "{line}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> SolverParams {
        SolverParams {
            dem_raster_file_path: Some("/tile/elevation.tif".into()),
            stream_info_file_path: Some("/tile/stream_info.txt".into()),
            q_limit: Some(1.1),
            eliminate_xsection: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_write_then_parse_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INPUT.txt");

        let params = sample_params();
        params.write_input_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("dem_raster_file_path /tile/elevation.tif\n"));
        assert!(text.contains("q_limit 1.1\n"));
        assert!(text.contains("eliminate_xsection 1\n"));
        // unset fields are omitted entirely
        assert!(!text.contains("manning_n_raster_file_path"));

        let parsed = SolverParams::parse(&text).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn test_unknown_key_rejected_by_name() {
        let err = SolverParams::parse("warp_speed 9\n").unwrap_err();
        assert!(err.to_string().contains("warp_speed"));
    }

    #[test]
    fn test_comments_and_blanks_ignored() {
        let parsed = SolverParams::parse("# a comment\n\nq_limit 2.5\n").unwrap();
        assert_eq!(parsed.q_limit, Some(2.5));
    }

    #[test]
    fn test_update_keeps_explicit_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INPUT.txt");
        std::fs::write(&path, "q_limit 9.0\nlow_spot_range 3\n").unwrap();

        let mut params = sample_params();
        params.update_input_file(&path).unwrap();

        // explicit value wins over the file's
        assert_eq!(params.q_limit, Some(1.1));
        // unset field filled from the file
        assert_eq!(params.low_spot_range, Some(3));

        // and the file now holds the merged set
        let merged = SolverParams::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(merged, params);
    }

    #[test]
    fn test_missing_update_file() {
        let mut params = sample_params();
        let err = params.update_input_file("/no/such/INPUT.txt").unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_runner_reports_spawn_failure() {
        let runner = SolverRunner::new("/no/such/solver");
        let err = runner.run(Path::new("/no/such/INPUT.txt")).unwrap_err();
        assert!(matches!(err, Error::Solver(_)));
    }
}
