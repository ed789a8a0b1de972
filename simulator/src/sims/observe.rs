//! Target observation pipeline.
//!
//! Channels are built once from the payload and shared read-only. Each target
//! then runs through the same sequence in every channel:
//!
//! 1. Validate the SED and estimate the diffuse foregrounds
//! 2. Propagate the foregrounds through the channel
//! 3. Propagate the point source
//! 4. Sum the per-pixel maxima into `MaxSignal_inPixel`
//! 5. Estimate the noise budget
//!
//! Targets are independent, so a batch runs them on a rayon pool. A target
//! whose pipeline fails is logged and reported as `None`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, PayloadConfig, RunConfig, TargetConfig};
use crate::foreground::{estimate_foregrounds, sky_transmission, ForegroundError};
use crate::instrument::{Built, Instrument, InstrumentError, InstrumentRecord, Loaded, Ready};
use crate::io::{OutputError, OutputGroup};
use crate::noise::{self, NoiseError};
use crate::table::{columns, ChannelTable, TableError};
use crate::target::{Target, TargetError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Foreground(#[from] ForegroundError),
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
    #[error(transparent)]
    Noise(#[from] NoiseError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Channel tables of one observed target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetResult {
    pub name: String,
    pub tables: Vec<ChannelTable>,
}

impl TargetResult {
    pub fn table(&self, channel: &str) -> Option<&ChannelTable> {
        self.tables.iter().find(|t| t.ch_name == channel)
    }

    /// One group per target holding one table per channel.
    pub fn write<O: OutputGroup>(&self, output: &mut O) -> Result<(), OutputError> {
        let group = output.create_group(&self.name)?;
        for table in &self.tables {
            group.write_table(&table.ch_name, table)?;
        }
        Ok(())
    }
}

/// Build every channel of the payload.
pub fn build_channels(payload: &PayloadConfig) -> Result<Vec<Instrument<Built>>, PipelineError> {
    log::info!("building {} channels", payload.channels.len());
    payload
        .channels
        .iter()
        .map(|description| Ok(Instrument::new(description.clone(), payload).build()?))
        .collect()
}

/// Store built channels as a JSON array of instrument records.
pub fn save_channels<S: Ready>(channels: &[Instrument<S>], path: &Path) -> Result<(), PipelineError> {
    let records: Vec<InstrumentRecord> = channels.iter().map(|c| c.record()).collect();
    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer(BufWriter::new(file), &records).map_err(OutputError::from)?;
    log::info!("instruments saved to {}", path.display());
    Ok(())
}

/// Restore channels stored by [`save_channels`].
pub fn load_channels(path: &Path) -> Result<Vec<Instrument<Loaded>>, PipelineError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<InstrumentRecord> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(records.into_iter().map(Instrument::load).collect())
}

/// Run one target through every channel.
pub fn observe_target<S: Ready>(
    channels: &[Instrument<S>],
    payload: &PayloadConfig,
    config: &TargetConfig,
) -> Result<TargetResult, PipelineError> {
    log::info!("observing {}", config.name);
    let mut target = Target::new(config)?;
    let foregrounds = estimate_foregrounds(&payload.common, target.coordinates)?;
    target.sky_transmission = sky_transmission(&foregrounds);
    target.foregrounds = foregrounds;

    let tables = channels
        .iter()
        .map(|channel| observe_in_channel(channel, payload, &target))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TargetResult {
        name: target.name,
        tables,
    })
}

fn observe_in_channel<S: Ready>(
    channel: &Instrument<S>,
    payload: &PayloadConfig,
    target: &Target,
) -> Result<ChannelTable, PipelineError> {
    let mut table = channel.table().clone();
    table.hstack(channel.propagate_diffuse_foreground(target)?)?;
    table.hstack(channel.propagate_target(target)?)?;

    let max_signal = table.sum_matching("Max");
    log::debug!("{}: max signal in pixel {max_signal:?}", channel.name());
    table.set_column(columns::MAX_SIGNAL_IN_PIXEL, max_signal)?;

    let noise = noise::estimate(channel.description(), &payload.common, &table)?;
    table.hstack(noise)?;
    Ok(table)
}

/// Observe every target on `run.threads` workers.
///
/// Results keep the input order; a failed target yields `None`.
pub fn observe_targets<S: Ready + Sync>(
    channels: &[Instrument<S>],
    payload: &PayloadConfig,
    targets: &[TargetConfig],
    run: &RunConfig,
) -> Result<Vec<Option<TargetResult>>, PipelineError> {
    log::info!("observing {} targets on {} threads", targets.len(), run.threads);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(run.threads)
        .build()?;

    let results = pool.install(|| {
        targets
            .par_iter()
            .map(|config| match observe_target(channels, payload, config) {
                Ok(result) => Some(result),
                Err(e) => {
                    log::warn!("target {} skipped: {e}", config.name);
                    None
                }
            })
            .collect::<Vec<_>>()
    });

    let failed = results.iter().filter(|r| r.is_none()).count();
    if failed > 0 {
        log::warn!("{failed} of {} targets failed", targets.len());
    }
    Ok(results)
}
