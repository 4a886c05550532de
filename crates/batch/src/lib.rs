//! # floodprep batch
//!
//! Batch orchestration for flood-routing preparation: walks a watershed
//! directory of tile subdirectories, runs each tile's
//! index → extract → aggregate → join pipeline in a rayon pool, and
//! isolates per-tile failures so one corrupt input never aborts the
//! batch. Also owns the external solver's input-file schema and
//! invocation.

pub mod config;
pub mod pipeline;
pub mod runner;
pub mod solver;

pub use config::{BatchConfig, FlowSourceSpec, TileConfig};
pub use pipeline::{prepare_tile, TileSummary};
pub use runner::{discover_tiles, run_batch, run_batch_with, BatchReport};
pub use solver::{SolverParams, SolverRunner};
