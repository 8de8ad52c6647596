//! tpcreco CLI
//!
//! Runs the seed fitter and the charge digitizer over JSON event files.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};
use log::{debug, info, LevelFilter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use tpcreco_core::{CellGeometry, ClusterKey, ClusterPoint, CylinderLayer, RawHit, TrackCandidate};
use tpcreco_digi::{CellAccumulator, DiagnosticTotals, Digitizer, DigitizerConfig};
use tpcreco_fit::{FitterConfig, TrackSeedFitter};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] tpcreco_core::Error),

    #[error("{path}: {source}")]
    Input {
        path: PathBuf,
        source: Box<CliError>,
    },
}

/// Track seed fitting and charge digitization for cylindrical gas detectors.
#[derive(Parser)]
#[command(name = "tpcreco")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refit track seeds against their clusters
    Fit {
        /// Track candidates (JSON list)
        #[arg(long)]
        tracks: PathBuf,

        /// Clusters (JSON list of {key, layer, x, y, z})
        #[arg(long)]
        clusters: PathBuf,

        /// Output file for the updated tracks
        #[arg(short, long)]
        output: PathBuf,

        /// Fitter configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Digitize raw hits into readout cells
    Digitize {
        /// Layer descriptions (JSON list)
        #[arg(long)]
        layers: PathBuf,

        /// Raw hits (JSON list)
        #[arg(long)]
        hits: PathBuf,

        /// Digitizer configuration (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Output file for the filled cells
        #[arg(short, long)]
        output: PathBuf,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Print the bin grid of every layer
    Geometry {
        /// Layer descriptions (JSON list)
        #[arg(long)]
        layers: PathBuf,

        /// Digitizer configuration (JSON)
        #[arg(long)]
        config: PathBuf,
    },
}

/// One entry of a clusters file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ClusterEntry {
    key: u64,
    layer: u32,
    x: f64,
    y: f64,
    z: f64,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let verbose = cli.verbose;

    match cli.command {
        Commands::Fit {
            tracks,
            clusters,
            output,
            config,
        } => {
            let config: FitterConfig = match config {
                Some(path) => read_json(&path)?,
                None => FitterConfig::default(),
            };
            let mut candidates: Vec<TrackCandidate> = read_json(&tracks)?;
            let clusters = cluster_map(read_json(&clusters)?);
            info!(
                "{} tracks, {} clusters, layers {}..={}",
                candidates.len(),
                clusters.len(),
                config.min_layer,
                config.max_layer
            );

            let start = Instant::now();
            let fitter = TrackSeedFitter::new(config);
            let stats = fitter.fit_tracks(&mut candidates, &clusters);
            let elapsed = start.elapsed();

            write_json(&output, &candidates)?;

            println!(
                "Fitted {} of {} tracks in {:.2}s",
                stats.tracks_fitted,
                stats.tracks_seen,
                elapsed.as_secs_f64()
            );
            println!("Skipped (too few clusters): {}", stats.skipped_too_few);
            println!("Skipped (degenerate): {}", stats.skipped_degenerate);
        }

        Commands::Digitize {
            layers,
            hits,
            config,
            output,
            seed,
        } => {
            let config: DigitizerConfig = read_json(&config)?;
            let layers: Vec<CylinderLayer> = read_json(&layers)?;
            let hits: Vec<RawHit> = read_json(&hits)?;

            let start = Instant::now();
            let mut digitizer = Digitizer::new(config, &layers, seed)?;
            let mut cells = CellAccumulator::new();
            let mut totals = DiagnosticTotals::default();
            let stats = digitizer.digitize_event_with(&hits, &mut cells, &mut totals)?;
            let elapsed = start.elapsed();

            let charge = cells.total();
            let records = cells.drain_sorted();
            write_json(&output, &records)?;

            println!(
                "Digitized {} hits into {} cells in {:.2}s",
                stats.hits_seen,
                records.len(),
                elapsed.as_secs_f64()
            );
            println!("Deposited: {}", stats.hits_deposited);
            println!("Outside time window: {}", stats.outside_time_window);
            println!("Out of range: {}", stats.out_of_range);
            println!("No ionization: {}", stats.no_ionization);
            println!("Total charge: {:.6e}", charge);

            if verbose {
                eprintln!("  {} cell contributions", stats.cell_contributions);
                eprintln!("  {:.1} electrons generated", totals.electrons);
                if let (Some(rphi), Some(z)) = (totals.mean_sigma_rphi(), totals.mean_sigma_z()) {
                    eprintln!("  mean cloud width: rphi {:.4} cm, z {:.4} cm", rphi, z);
                }
                eprintln!(
                    "  widest window: {} phi x {} z bins",
                    totals.max_window_phi, totals.max_window_z
                );
            }
        }

        Commands::Geometry { layers, config } => {
            let config: DigitizerConfig = read_json(&config)?;
            config.validate()?;
            let layers: Vec<CylinderLayer> = read_json(&layers)?;
            let geometry = CellGeometry::build(&layers, &config.cell_sizes, config.cell_limit)?;

            println!(
                "{:<6} | {:>8} | {:>8} | {:>10} | {:>8} | {:>10} | {:>10}",
                "Layer", "Radius", "Phi bins", "Rphi size", "Z bins", "Z size", "Cells"
            );
            println!("{:-<78}", "");
            for grid in geometry.iter() {
                println!(
                    "{:<6} | {:>8.3} | {:>8} | {:>10.4} | {:>8} | {:>10.4} | {:>10}",
                    grid.layer,
                    grid.radius,
                    grid.phi_bins,
                    grid.effective_rphi_size(),
                    grid.z_bins,
                    grid.effective_z_size(),
                    grid.cell_count()
                );
            }
            println!("Total cells: {}", geometry.iter().map(|g| g.cell_count()).sum::<usize>());
        }
    }

    Ok(())
}

/// Reads a JSON document, tagging failures with the file name.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("reading {}", path.display());
    let tag = |source: CliError| CliError::Input {
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let file = File::open(path).map_err(|e| tag(e.into()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| tag(e.into()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    debug!("writing {}", path.display());
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn cluster_map(entries: Vec<ClusterEntry>) -> HashMap<ClusterKey, ClusterPoint> {
    entries
        .into_iter()
        .map(|c| (ClusterKey(c.key), ClusterPoint::new(c.layer, c.x, c.y, c.z)))
        .collect()
}
