use std::path::PathBuf;

use clap::Parser;

use crate::config::RunConfig;

/// Parse coordinates string in format "ra,dec"
fn parse_coordinates(s: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err("Coordinates must be in format 'ra,dec'".to_string());
    }

    let ra = parts[0]
        .trim()
        .parse::<f64>()
        .map_err(|_| "Invalid right ascension value".to_string())?;
    let dec = parts[1]
        .trim()
        .parse::<f64>()
        .map_err(|_| "Invalid declination value".to_string())?;

    Ok((ra, dec))
}

fn default_threads() -> usize {
    RunConfig::default().threads
}

/// Arguments of a radiometric simulation run
#[derive(Parser, Debug, Clone)]
pub struct SimulationArgs {
    /// Payload description (JSON)
    #[arg(long)]
    pub payload: PathBuf,

    /// Target list (JSON array of targets)
    #[arg(long)]
    pub targets: PathBuf,

    /// Worker threads for target-level parallelism
    #[arg(long, default_value_t = default_threads())]
    pub threads: usize,

    /// Enable debug output
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Write the channel tables of every target to this JSON file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Store the built instruments in this JSON file
    #[arg(long)]
    pub instrument_cache: Option<PathBuf>,

    /// Load the instruments from --instrument-cache instead of rebuilding
    #[arg(long, default_value_t = false, requires = "instrument_cache")]
    pub reuse: bool,

    /// Sky position (format: "ra,dec" in degrees) for targets without coordinates
    #[arg(long, value_parser = parse_coordinates)]
    pub pointing: Option<(f64, f64)>,
}

impl SimulationArgs {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            threads: self.threads.max(1),
            debug: self.debug,
        }
    }
}
