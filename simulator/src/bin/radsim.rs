//! Radiometric simulation of a target list through a payload
//!
//! Builds every channel of the payload (or restores them from an instrument
//! cache), observes each target in every channel and reports the relative
//! noise per √hr.
//!
//! Usage:
//! ```
//! cargo run --release --bin radsim -- --payload payload.json --targets targets.json [OPTIONS]
//! ```
//!
//! See --help for detailed options.

use clap::Parser;
use log::{info, warn};
use radsim::config::{load_targets, PayloadConfig};
use radsim::instrument::{Instrument, Ready};
use radsim::io::{JsonGroup, OutputGroup};
use radsim::shared_args::SimulationArgs;
use radsim::sims::observe::{build_channels, load_channels, observe_targets, save_channels};
use radsim::table::columns;

/// Command line arguments for the radiometric simulator
#[derive(Parser, Debug)]
#[command(
    name = "radsim",
    about = "Signal and noise budget of point sources observed by a multi-channel payload",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    shared: SimulationArgs,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let level = if args.shared.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let payload = PayloadConfig::from_file(&args.shared.payload)?;
    let cache = args.shared.instrument_cache.as_deref();

    match cache {
        Some(path) if args.shared.reuse && path.exists() => {
            info!("loading instruments from {}", path.display());
            let channels = load_channels(path)?;
            run(&args.shared, &payload, &channels)
        }
        _ => {
            if args.shared.reuse {
                warn!("instrument cache not found, rebuilding");
            }
            let channels = build_channels(&payload)?;
            if let Some(path) = cache {
                save_channels(&channels, path)?;
            }
            run(&args.shared, &payload, &channels)
        }
    }
}

fn run<S: Ready + Sync>(
    args: &SimulationArgs,
    payload: &PayloadConfig,
    channels: &[Instrument<S>],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut targets = load_targets(&args.targets)?;
    if let Some(pointing) = args.pointing {
        for target in targets.iter_mut().filter(|t| t.coordinates.is_none()) {
            target.coordinates = Some(pointing);
        }
    }

    let run = args.run_config();
    let results = observe_targets(channels, payload, &targets, &run)?;

    for result in results.iter().flatten() {
        for table in &result.tables {
            let wl = table.column(columns::WAVELENGTH).unwrap_or_default();
            let noise = table.column(columns::TOTAL_NOISE).unwrap_or_default();
            for (w, n) in wl.iter().zip(noise) {
                println!("{:<24} {:<12} {:>8.4} µm {:>12.4e}", result.name, table.ch_name, w, n);
            }
        }
    }

    if let Some(path) = &args.output {
        let mut root = JsonGroup::new();
        let payload_group = root.create_group("payload")?;
        for channel in channels {
            channel.write(payload_group)?;
        }
        let targets_group = root.create_group("targets")?;
        for result in results.iter().flatten() {
            result.write(targets_group)?;
        }
        root.save(path)?;
    }

    let failed = results.iter().filter(|r| r.is_none()).count();
    info!(
        "{} targets observed, {} failed",
        results.len() - failed,
        failed
    );
    Ok(())
}
