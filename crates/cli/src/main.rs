//! Command-line runner for single-vesicle simulations.
//!
//! `run` executes a JSON configuration and writes the recorded histories to
//! an output directory; `defaults` dumps the built-in reference model as a
//! starting configuration.

mod output;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use vesicle_core::{defaults, ExteriorConfig, Simulation, SimulationConfig, VesicleConfig};

#[derive(Parser)]
#[command(name = "vesicle-sim", version, about = "Single-vesicle electrochemistry simulator")]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulation from a JSON configuration file
    Run {
        /// Path to the configuration file
        #[arg(long)]
        config: PathBuf,
        /// Output directory for the recorded histories
        #[arg(long)]
        out: PathBuf,
    },
    /// Write the built-in default configuration to a file
    Defaults {
        /// Destination path for the JSON configuration
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Command::Run { config, out } => run(&config, &out),
        Command::Defaults { out } => write_defaults(&out),
    }
}

fn run(config_path: &Path, out: &Path) -> Result<()> {
    let text = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let config = SimulationConfig::from_json(&text)?;
    let mut simulation = Simulation::new(config)?;

    info!(
        name = %simulation.display_name(),
        iterations = simulation.iterations(),
        time_step = simulation.time_step(),
        "running simulation"
    );
    let mut last_decile = 0u32;
    simulation.run_with_progress(|percent| {
        let decile = (percent / 10.0) as u32;
        if decile > last_decile {
            last_decile = decile;
            info!("progress: {percent:.0}%");
        }
    })?;

    output::write_histories(
        out,
        simulation.histories(),
        simulation.time_step(),
        simulation.total_time(),
    )?;
    info!("histories written to {}", out.display());
    Ok(())
}

fn write_defaults(out: &Path) -> Result<()> {
    let config = SimulationConfig {
        vesicle_params: Some(VesicleConfig::default()),
        exterior_params: Some(ExteriorConfig::default()),
        species: Some(defaults::default_species()),
        channels: Some(defaults::default_channels()),
        ion_channel_links: Some(defaults::default_links()),
        ..SimulationConfig::default()
    };
    fs::write(out, config.to_json()?)
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!("default configuration written to {}", out.display());
    Ok(())
}
