//! floodprep CLI - flood-routing batch preparation

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{ArgGroup, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use floodprep_batch::{run_batch_with, BatchConfig, FlowSourceSpec};
use floodprep_core::io::{read_geotiff, write_geotiff};
use floodprep_core::raster::Raster;
use floodprep_core::stream_info::StreamInfoTable;
use floodprep_streamflow::aggregation::{AggregationSpec, Reducer};
use floodprep_streamflow::join::{append_flow, flow_raster, MissingIdPolicy};
use floodprep_streamflow::raster_index::{build_index, index_from_file};
use floodprep_streamflow::sources::{
    extract_ensemble_flows, extract_peak_flows, extract_return_period_flows, PeakFlows,
    PeakSearchWindow, ReturnPeriod,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "floodprep")]
#[command(author, version, about = "Flood-routing batch preparation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a rasterized stream network
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Build the stream-info table from a rasterized stream network
    Index {
        /// Rasterized stream network (integer GeoTIFF)
        input: PathBuf,
        /// Output stream-info table
        output: PathBuf,
    },
    /// Derive streamflow and join it onto an existing stream-info table
    Flow {
        #[command(subcommand)]
        source: FlowCommands,
    },
    /// Prepare every tile directory under a watershed directory
    #[command(group(
        ArgGroup::new("source")
            .required(true)
            .args(["forecast_dir", "run_file", "return_period_file"])
    ))]
    Prepare {
        /// Watershed directory holding one subdirectory per tile
        watershed_dir: PathBuf,
        /// Ensemble forecast directory (one netcdf file per member)
        #[arg(long)]
        forecast_dir: Option<PathBuf>,
        /// Single deterministic run file
        #[arg(long)]
        run_file: Option<PathBuf>,
        /// Return-period table file
        #[arg(long, requires = "period")]
        return_period_file: Option<PathBuf>,
        /// Return-period category, e.g. return_period_20
        #[arg(long)]
        period: Option<String>,
        /// Stage-1 reducer across ensemble members
        #[arg(long, default_value = "mean_plus_std")]
        method_x: String,
        /// Stage-2 reducer over time
        #[arg(long, default_value = "max")]
        method_y: String,
        /// Earliest date considered for the peak search (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,
        /// Latest date considered for the peak search (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
        /// Unmapped stream id policy: zero-fill or abort
        #[arg(long, default_value = "zero-fill")]
        policy: String,
        /// Also write a streamflow raster per tile
        #[arg(long)]
        flow_raster: bool,
        /// Worker threads (default: all cores)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
}

#[derive(Subcommand)]
enum FlowCommands {
    /// Aggregate an ensemble forecast archive
    Ensemble {
        /// Stream-info table to update
        table: PathBuf,
        /// Forecast directory (one netcdf file per member)
        forecast_dir: PathBuf,
        /// Stage-1 reducer across ensemble members
        #[arg(long, default_value = "mean_plus_std")]
        method_x: String,
        /// Stage-2 reducer over time
        #[arg(long, default_value = "max")]
        method_y: String,
        #[command(flatten)]
        common: FlowCommonArgs,
    },
    /// Take peak flows from a single deterministic run
    Single {
        /// Stream-info table to update
        table: PathBuf,
        /// Deterministic run file
        run_file: PathBuf,
        /// Earliest date considered for the peak search (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,
        /// Latest date considered for the peak search (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
        #[command(flatten)]
        common: FlowCommonArgs,
    },
    /// Look flows up in a precomputed return-period table
    ReturnPeriod {
        /// Stream-info table to update
        table: PathBuf,
        /// Return-period table file
        file: PathBuf,
        /// Category, e.g. return_period_20
        #[arg(long, default_value = "return_period_20")]
        period: String,
        #[command(flatten)]
        common: FlowCommonArgs,
    },
}

#[derive(clap::Args)]
struct FlowCommonArgs {
    /// Unmapped stream id policy: zero-fill or abort
    #[arg(long, default_value = "zero-fill")]
    policy: String,
    /// Also write a streamflow raster to this path
    #[arg(long)]
    flow_raster: Option<PathBuf>,
    /// Stream raster used as the grid template for --flow-raster
    #[arg(long, requires = "flow_raster")]
    streams: Option<PathBuf>,
}

// ─── Argument parsing helpers ───────────────────────────────────────────

fn parse_policy(s: &str) -> Result<MissingIdPolicy> {
    match s {
        "zero-fill" => Ok(MissingIdPolicy::ZeroFill),
        "abort" => Ok(MissingIdPolicy::Abort),
        other => bail!("invalid policy '{other}' (expected zero-fill or abort)"),
    }
}

fn parse_date(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn parse_window(start: Option<&str>, end: Option<&str>) -> Result<PeakSearchWindow> {
    Ok(PeakSearchWindow {
        start: start.map(parse_date).transpose()?,
        end: end.map(parse_date).transpose()?,
    })
}

fn parse_aggregation(method_x: &str, method_y: &str) -> Result<AggregationSpec> {
    Ok(AggregationSpec::new(
        method_x.parse::<Reducer>()?,
        method_y.parse::<Reducer>()?,
    ))
}

// ─── Command implementations ────────────────────────────────────────────

fn run_info(input: &PathBuf) -> Result<()> {
    let raster: Raster<i32> = read_geotiff(input)?;
    let table = build_index(&raster);
    let gt = raster.transform();

    println!("File:         {}", input.display());
    println!("Dimensions:   {} rows x {} cols", raster.rows(), raster.cols());
    println!("Origin:       ({}, {})", gt.origin_x, gt.origin_y);
    println!("Cell size:    {}", gt.cell_size());
    println!("Stream cells: {}", table.len());
    println!("Stream ids:   {}", table.unique_ids().len());
    Ok(())
}

fn run_index(input: &PathBuf, output: &PathBuf) -> Result<()> {
    let start = Instant::now();
    let table = index_from_file(input)?;
    table.write_to(output)?;
    info!(
        cells = table.len(),
        ids = table.unique_ids().len(),
        "stream-info table written"
    );
    println!(
        "Indexed {} stream cells ({} ids) in {:.2?}",
        table.len(),
        table.unique_ids().len(),
        start.elapsed()
    );
    Ok(())
}

fn join_and_write(
    table_path: &PathBuf,
    flows: &PeakFlows,
    common: &FlowCommonArgs,
) -> Result<()> {
    let policy = parse_policy(&common.policy)?;

    let mut table = StreamInfoTable::read_from(table_path)?;
    append_flow(&mut table, flows, policy)?;
    table.write_to(table_path)?;

    if let Some(raster_out) = &common.flow_raster {
        let streams_path = common
            .streams
            .as_ref()
            .context("--flow-raster needs --streams as the grid template")?;
        let streams: Raster<i32> = read_geotiff(streams_path)?;
        let out = flow_raster(&streams, &table, flows, policy)?;
        write_geotiff(&out, raster_out)?;
        println!("Streamflow raster written to {}", raster_out.display());
    }

    if !flows.missing().is_empty() {
        println!(
            "{} stream ids had no flow in the source",
            flows.missing().len()
        );
    }
    println!("Flow joined onto {}", table_path.display());
    Ok(())
}

fn run_flow(source: &FlowCommands) -> Result<()> {
    match source {
        FlowCommands::Ensemble {
            table,
            forecast_dir,
            method_x,
            method_y,
            common,
        } => {
            let spec = parse_aggregation(method_x, method_y)?;
            let ids = StreamInfoTable::read_from(table)?.unique_ids();
            let flows = extract_ensemble_flows(forecast_dir, &ids, spec)?;
            join_and_write(table, &flows, common)
        }
        FlowCommands::Single {
            table,
            run_file,
            start_date,
            end_date,
            common,
        } => {
            let window = parse_window(start_date.as_deref(), end_date.as_deref())?;
            let ids = StreamInfoTable::read_from(table)?.unique_ids();
            let flows = extract_peak_flows(run_file, &ids, window)?;
            join_and_write(table, &flows, common)
        }
        FlowCommands::ReturnPeriod {
            table,
            file,
            period,
            common,
        } => {
            let period = period.parse::<ReturnPeriod>()?;
            let ids = StreamInfoTable::read_from(table)?.unique_ids();
            let flows = extract_return_period_flows(file, &ids, period)?;
            join_and_write(table, &flows, common)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_prepare(
    watershed_dir: PathBuf,
    forecast_dir: Option<PathBuf>,
    run_file: Option<PathBuf>,
    return_period_file: Option<PathBuf>,
    period: Option<String>,
    method_x: &str,
    method_y: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
    policy: &str,
    write_flow_raster: bool,
    jobs: Option<usize>,
) -> Result<()> {
    let flow_source = if let Some(directory) = forecast_dir {
        FlowSourceSpec::Ensemble {
            directory,
            spec: parse_aggregation(method_x, method_y)?,
        }
    } else if let Some(file) = run_file {
        FlowSourceSpec::Deterministic {
            file,
            window: parse_window(start_date, end_date)?,
        }
    } else if let Some(file) = return_period_file {
        let period = period.context("--return-period-file needs --period")?;
        FlowSourceSpec::ReturnPeriod {
            file,
            period: period.parse::<ReturnPeriod>()?,
        }
    } else {
        bail!("one of --forecast-dir, --run-file or --return-period-file is required");
    };

    if let Some(jobs) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("cannot size the worker pool")?;
    }

    let config = BatchConfig {
        watershed_dir,
        flow_source,
        missing_policy: parse_policy(policy)?,
        write_flow_raster,
    };

    let tiles = floodprep_batch::discover_tiles(&config.watershed_dir)?;
    let bar = ProgressBar::new(tiles.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let start = Instant::now();
    let report = run_batch_with(&config, |name, _ok| {
        bar.set_message(name.to_string());
        bar.inc(1);
    })?;
    bar.finish_and_clear();

    println!(
        "Prepared {}/{} tiles in {:.2?}",
        report.succeeded.len(),
        report.total(),
        start.elapsed()
    );
    for (name, error) in &report.failed {
        println!("  FAILED {name}: {error}");
    }
    if !report.all_succeeded() {
        bail!("{} tile(s) failed", report.failed.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("cannot install tracing subscriber")?;

    match cli.command {
        Commands::Info { input } => run_info(&input),
        Commands::Index { input, output } => run_index(&input, &output),
        Commands::Flow { source } => run_flow(&source),
        Commands::Prepare {
            watershed_dir,
            forecast_dir,
            run_file,
            return_period_file,
            period,
            method_x,
            method_y,
            start_date,
            end_date,
            policy,
            flow_raster,
            jobs,
        } => run_prepare(
            watershed_dir,
            forecast_dir,
            run_file,
            return_period_file,
            period,
            &method_x,
            &method_y,
            start_date.as_deref(),
            end_date.as_deref(),
            &policy,
            flow_raster,
            jobs,
        ),
    }
}
