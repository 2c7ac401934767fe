//! tbcalo command-line interface.
//!
//! Flattens test-beam event files, runs the per-run calorimeter analysis and
//! exposes the individual table operations as subcommands.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::redundant_closure_for_method_calls,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tbcalo_algorithms::{
    analyze_run, dedup, first_element, flatten_events, group, inner_join, plane_occupancy, select,
    AggregationPlan, HitSelection, Histogram, Reduction, RunAnalysis,
};
use tbcalo_core::table::{Table, Value};
use tbcalo_io::config::{EVENTS_ARRAY_EXT, EVENTS_EXT, HITS_CACHE_EXT};
use tbcalo_io::{
    check_extension, read_events, read_run_events, write_table, RunConfig, RunScanner, RunSummary,
    TableWriter,
};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    TbcaloIo(#[from] tbcalo_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] tbcalo_core::Error),

    #[error("no input file for run {run} (tried {tried})")]
    MissingRun { run: u32, tried: String },

    #[error("no runs found matching {0}")]
    NoRuns(String),

    #[error("{0}: HDF5 support not compiled in (enable the `hdf5` feature)")]
    Hdf5Disabled(PathBuf),
}

/// Test-beam calorimeter hit analysis.
#[derive(Parser)]
#[command(name = "tbcalo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Run configuration (JSON); defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (debug log level unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse runs and write histograms, heatmaps and a summary per run
    Process {
        /// Run numbers to process; all runs matching the input pattern if omitted
        #[arg(short, long = "run")]
        runs: Vec<u32>,

        /// Override the input file pattern of the configuration
        #[arg(short, long)]
        input_pattern: Option<String>,

        /// Override the results directory of the configuration
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read flattened hit caches (.h5) instead of raw event files
        #[arg(long)]
        from_cache: bool,

        /// Also write the flattened hits of each run to an .h5 cache
        #[arg(long, conflicts_with = "from_cache")]
        save_cache: bool,
    },

    /// Flatten an event file into one row per hit
    Flatten {
        /// Input event file (.jsonl or .json)
        input: PathBuf,

        /// Output file (.csv, .jsonl or .h5)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Select hits by plane, channel and amplitude
    Select {
        /// Input hit table
        input: PathBuf,

        /// Output file (.csv, .jsonl or .h5)
        #[arg(short, long)]
        output: PathBuf,

        /// Plane(s) to keep
        #[arg(short, long = "plane")]
        planes: Vec<i64>,

        /// Channel(s) to keep
        #[arg(long = "channel")]
        channels: Vec<i64>,

        /// Inclusive lower amplitude bound
        #[arg(long)]
        amplitude_min: Option<f64>,

        /// Inclusive upper amplitude bound
        #[arg(long)]
        amplitude_max: Option<f64>,

        /// Drop duplicate rows after selecting
        #[arg(long)]
        dedup: bool,
    },

    /// Group hit rows back into one row per key
    Group {
        /// Input hit table
        input: PathBuf,

        /// Output file (.csv or .jsonl)
        #[arg(short, long)]
        output: PathBuf,

        /// Key column(s); defaults to the event id column
        #[arg(short, long = "by")]
        by: Vec<String>,

        /// Column(s) collected into lists; defaults to the hit columns
        #[arg(long = "collect")]
        collect: Vec<String>,

        /// Column(s) removed before grouping; defaults to the plane energy
        #[arg(long = "drop")]
        drop: Vec<String>,

        /// Fail if a non-collected column varies within a group
        #[arg(long)]
        strict: bool,
    },

    /// Write per-layer channel occupancy grids as CSV
    Heatmap {
        /// Input hit table
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Layer(s) to map; the configured layers if omitted
        #[arg(short, long = "layer")]
        layers: Vec<i64>,
    },

    /// Inner-join two tables on a key column each
    Merge {
        /// Left table
        left: PathBuf,

        /// Right table
        right: PathBuf,

        /// Output file (.csv or .jsonl)
        #[arg(short, long)]
        output: PathBuf,

        /// Key column of the left table
        #[arg(long)]
        left_on: String,

        /// Key column of the right table
        #[arg(long)]
        right_on: String,

        /// List column(s) reduced to their first element in both tables before joining
        #[arg(long = "first")]
        first: Vec<String>,
    },

    /// Show information about an event or hit file
    Info {
        /// Input file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    run(cli)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.global.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    debug!("configuration: {:?}", config);

    match cli.command {
        Commands::Process {
            runs,
            input_pattern,
            output,
            from_cache,
            save_cache,
        } => {
            if let Some(pattern) = input_pattern {
                config.input_pattern = pattern;
            }
            if let Some(dir) = output {
                config.results_dir = dir;
            }
            process_runs(&config, runs, from_cache, save_cache)?;
        }

        Commands::Flatten { input, output } => {
            let start = Instant::now();
            let events = read_run_events(&input, &config.columns)?;
            let hits = flatten_events(&events, &config.flatten_config())?;
            save_table(&output, &hits)?;
            println!(
                "Flattened {} events into {} hits in {:.2}s",
                events.n_rows(),
                hits.n_rows(),
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Select {
            input,
            output,
            planes,
            channels,
            amplitude_min,
            amplitude_max,
            dedup: drop_duplicates,
        } => {
            let hits = load_table(&input)?;
            let mut selection = HitSelection::new();
            if !planes.is_empty() {
                selection = selection.planes(planes);
            }
            if !channels.is_empty() {
                selection = selection.channels(channels);
            }
            if let Some(min) = amplitude_min {
                selection = selection.amplitude_min(min);
            }
            if let Some(max) = amplitude_max {
                selection = selection.amplitude_max(max);
            }

            let mut selected = select(&hits, &selection, &config.columns)?;
            if drop_duplicates {
                selected = dedup(&selected);
            }
            save_table(&output, &selected)?;
            println!("Selected {} of {} rows", selected.n_rows(), hits.n_rows());
        }

        Commands::Group {
            input,
            output,
            by,
            collect,
            drop,
            strict,
        } => {
            let hits = load_table(&input)?;
            let columns = &config.columns;
            let keys = if by.is_empty() {
                vec![columns.event_id.clone()]
            } else {
                by
            };
            let collect = if collect.is_empty() {
                columns.hit_columns().map(String::from).to_vec()
            } else {
                collect
            };
            let drop = if drop.is_empty() {
                vec![columns.plane_energy.clone()]
            } else {
                drop
            };
            let mut plan = AggregationPlan::new(keys)
                .collect(collect)
                .drop_columns(drop);
            if strict {
                plan = plan.with_default(Reduction::FirstConsistent);
            }

            let grouped = group(&hits, &plan)?;
            write_table(&output, &grouped)?;
            println!("Grouped {} rows into {} rows", hits.n_rows(), grouped.n_rows());
        }

        Commands::Heatmap {
            input,
            output,
            layers,
        } => {
            let hits = load_table(&input)?;
            let geometry = config.geometry()?;
            let layers = if layers.is_empty() {
                config.layers.clone()
            } else {
                layers
            };

            fs::create_dir_all(&output)?;
            for layer in layers {
                let grid = plane_occupancy(&hits, layer, &config.columns, &geometry)?;
                let path = output.join(format!("layer_{}.csv", config.layer_name(layer)));
                TableWriter::create(&path)?.write_grid_csv(&grid)?;
                println!("Layer {}: {} hits -> {}", layer, grid.sum(), path.display());
            }
        }

        Commands::Merge {
            left,
            right,
            output,
            left_on,
            right_on,
            first,
        } => {
            let mut left_table = load_table(&left)?;
            let mut right_table = load_table(&right)?;
            for column in &first {
                if left_table.has_column(column) {
                    left_table = first_element(&left_table, column)?;
                }
                if right_table.has_column(column) {
                    right_table = first_element(&right_table, column)?;
                }
            }

            let merged = inner_join(&left_table, &right_table, &left_on, &right_on)?;
            write_table(&output, &merged)?;
            println!(
                "Merged {} x {} rows into {} rows",
                left_table.n_rows(),
                right_table.n_rows(),
                merged.n_rows()
            );
        }

        Commands::Info { input } => {
            let size = fs::metadata(&input)?.len();
            let table = load_table(&input)?;

            println!("File: {}", input.display());
            println!("Size: {} bytes ({:.2} MB)", size, size as f64 / 1_000_000.0);
            println!("Rows: {}", table.n_rows());
            println!("Columns: {}", table.names().join(", "));
            if let Some(run) = RunScanner::run_number(&input) {
                println!("Run: {}", run);
            }

            let columns = &config.columns;
            if let Some(ids) = table.column(&columns.event_id) {
                let events: HashSet<_> = ids.iter().filter(|v| !v.is_null()).collect();
                println!("Events: {}", events.len());
            }
            if let Some(planes) = table.column(&columns.plane) {
                let planes: BTreeSet<i64> = planes
                    .iter()
                    .flat_map(|v| match v.as_list() {
                        Some(items) => items.iter().filter_map(|p| p.as_i64()).collect::<Vec<_>>(),
                        None => v.as_i64().into_iter().collect::<Vec<_>>(),
                    })
                    .collect();
                println!("Planes: {:?}", planes);
            }
        }
    }

    Ok(())
}

fn process_runs(
    config: &RunConfig,
    runs: Vec<u32>,
    from_cache: bool,
    save_cache: bool,
) -> Result<()> {
    let runs = if runs.is_empty() {
        discover_runs(config, from_cache)?
    } else {
        runs
    };
    let params = config.analysis_params()?;
    let total = Instant::now();

    for &run in &runs {
        let start = Instant::now();
        info!("processing run {run}");

        let hits = if from_cache {
            load_table(&config.input_path(run, HITS_CACHE_EXT))?
        } else {
            let events = read_run_events(raw_input(config, run)?, &config.columns)?;
            flatten_events(&events, &config.flatten_config())?
        };
        if save_cache {
            save_table(&config.input_path(run, HITS_CACHE_EXT), &hits)?;
        }

        let analysis = analyze_run(&hits, &params)?;
        let out_dir = config.run_results_dir(run);
        write_products(config, run, &analysis, &out_dir)?;

        println!(
            "Run {}: {} hits, {} events in {:.2}s -> {}",
            run,
            analysis.n_hits,
            analysis.n_events,
            start.elapsed().as_secs_f64(),
            out_dir.display()
        );
    }

    println!(
        "Processed {} runs in {:.2}s",
        runs.len(),
        total.elapsed().as_secs_f64()
    );
    Ok(())
}

fn discover_runs(config: &RunConfig, from_cache: bool) -> Result<Vec<u32>> {
    let extensions: &[&str] = if from_cache {
        &[HITS_CACHE_EXT]
    } else {
        &[EVENTS_EXT, EVENTS_ARRAY_EXT]
    };
    let mut runs = BTreeSet::new();
    for ext in extensions {
        runs.extend(RunScanner::run_numbers(&config.input_glob(ext))?);
    }
    if runs.is_empty() {
        return Err(CliError::NoRuns(config.input_glob(extensions[0])));
    }
    Ok(runs.into_iter().collect())
}

fn raw_input(config: &RunConfig, run: u32) -> Result<PathBuf> {
    let candidates = [EVENTS_EXT, EVENTS_ARRAY_EXT].map(|ext| config.input_path(run, ext));
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| CliError::MissingRun {
            run,
            tried: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

fn write_products(
    config: &RunConfig,
    run: u32,
    analysis: &RunAnalysis,
    out_dir: &Path,
) -> Result<()> {
    let hists_dir = out_dir.join("1D_hists");
    let heatmap_dir = out_dir.join("Heatmaps");
    let channel_dir = out_dir.join("energy_per_channel");
    for dir in [&hists_dir, &heatmap_dir, &channel_dir] {
        fs::create_dir_all(dir)?;
    }

    if let Some(shower) = &analysis.shower {
        write_histogram(&out_dir.join("Shower_energy_distribution.csv"), shower)?;
    }
    write_table(
        out_dir.join("Average_Longitudinal_Profile.csv"),
        &profile_table(analysis)?,
    )?;

    for layer in &analysis.layers {
        let name = config.layer_name(layer.layer);
        match &layer.energy {
            Some(energy) => write_histogram(
                &hists_dir.join(format!("Layer_{}_energy_distribution.csv", layer.layer)),
                energy,
            )?,
            None => warn!("run {run}: no energy in layer {name}"),
        }

        TableWriter::create(heatmap_dir.join(format!("layer_{name}.csv")))?
            .write_grid_csv(&layer.occupancy)?;

        let layer_dir = channel_dir.join(format!("layer_{name}"));
        fs::create_dir_all(&layer_dir)?;
        for channel in &layer.channels {
            let file = format!(
                "Channel_{}_layer_{}_energy_distribution.csv",
                channel.channel, layer.layer
            );
            write_histogram(&layer_dir.join(file), &channel.histogram)?;
        }
        debug!(
            "run {run}: layer {name} wrote {} channel histograms",
            layer.channels.len()
        );
    }

    #[cfg(feature = "hdf5")]
    {
        let grids: Vec<(String, _)> = analysis
            .layers
            .iter()
            .map(|layer| {
                (
                    format!("layer_{}", config.layer_name(layer.layer)),
                    layer.occupancy.clone(),
                )
            })
            .collect();
        tbcalo_io::write_grids_hdf5(heatmap_dir.join("occupancy.h5"), &grids, Some(1))?;
    }

    let summary = RunSummary::new(run, analysis, |layer| config.layer_name(layer));
    TableWriter::create(out_dir.join("summary.json"))?.write_json(&summary)?;
    Ok(())
}

fn write_histogram(path: &Path, histogram: &Histogram) -> Result<()> {
    TableWriter::create(path)?.write_histogram_csv(histogram)?;
    Ok(())
}

fn profile_table(analysis: &RunAnalysis) -> Result<Table> {
    let profile = &analysis.profile;
    let table = Table::from_columns([
        (
            "layer",
            profile.iter().map(|p| p.layer.into()).collect::<Vec<Value>>(),
        ),
        (
            "entries",
            profile
                .iter()
                .map(|p| i64::try_from(p.entries).unwrap_or(i64::MAX).into())
                .collect::<Vec<Value>>(),
        ),
        ("mean", profile.iter().map(|p| p.mean.into()).collect()),
        ("sem", profile.iter().map(|p| p.sem.into()).collect()),
    ])?;
    Ok(table)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or_else(String::new, |ext| format!(".{}", ext.to_lowercase()))
}

fn is_cache(path: &Path) -> bool {
    extension(path) == HITS_CACHE_EXT
}

/// Loads an event or hit table from `.jsonl`, `.json` or `.h5`.
fn load_table(path: &Path) -> Result<Table> {
    check_extension(&extension(path))?;
    if is_cache(path) {
        return read_cache(path);
    }
    Ok(read_events(path)?)
}

/// Writes a table as CSV, JSON lines or an `.h5` cache.
fn save_table(path: &Path, table: &Table) -> Result<()> {
    if is_cache(path) {
        return write_cache(path, table);
    }
    write_table(path, table)?;
    Ok(())
}

#[cfg(feature = "hdf5")]
fn read_cache(path: &Path) -> Result<Table> {
    Ok(tbcalo_io::read_hits_hdf5(path)?)
}

#[cfg(not(feature = "hdf5"))]
fn read_cache(path: &Path) -> Result<Table> {
    Err(CliError::Hdf5Disabled(path.to_path_buf()))
}

#[cfg(feature = "hdf5")]
fn write_cache(path: &Path, table: &Table) -> Result<()> {
    tbcalo_io::write_hits_hdf5(path, table, &tbcalo_io::HitCacheOptions::default())?;
    Ok(())
}

#[cfg(not(feature = "hdf5"))]
fn write_cache(path: &Path, _table: &Table) -> Result<()> {
    Err(CliError::Hdf5Disabled(path.to_path_buf()))
}
