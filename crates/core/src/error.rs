//! Error types for floodprep

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for floodprep operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source not found or unreadable: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("invalid raster geometry in {path}: {reason}")]
    InvalidGeometry { path: PathBuf, reason: String },

    #[error("invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("raster grids not aligned: expected {expected}, got {actual}")]
    Alignment { expected: String, actual: String },

    #[error("stream id {stream_id} has no flow value in the source")]
    MissingStreamId { stream_id: i32 },

    #[error("malformed ensemble member {path}: {reason}")]
    MalformedMember { path: PathBuf, reason: String },

    #[error("invalid aggregation spec: {0}")]
    InvalidAggregationSpec(String),

    #[error("variable '{name}' not found in {path}")]
    MissingVariable { name: String, path: PathBuf },

    #[error("netcdf error: {0}")]
    Netcdf(String),

    #[error("stream info table error: {0}")]
    Table(String),

    #[error("solver error: {0}")]
    Solver(String),

    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for floodprep operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_identifiers() {
        let err = Error::MissingStreamId { stream_id: 42 };
        assert!(err.to_string().contains("42"));

        let err = Error::Alignment {
            expected: "(10, 10)".into(),
            actual: "(10, 12)".into(),
        };
        assert!(err.to_string().contains("(10, 12)"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
