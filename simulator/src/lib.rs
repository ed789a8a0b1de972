//! Radiometric simulation of multi-channel space payloads
//!
//! This crate estimates the signal and noise budget of point sources observed
//! by photometric and spectroscopic channels. A payload is described by its
//! shared telescope optics and its channels; each channel is built once into
//! wavelength bins, PSF windows and an optical path whose thermal emission is
//! propagated to the detector. Targets are then observed through every
//! channel together with the diffuse foregrounds, and the noise model turns
//! the collected signals into a relative noise per √hr.

pub mod algo;
pub mod config;
pub mod foreground;
pub mod instrument;
pub mod io;
pub mod noise;
pub mod optics;
pub mod photometry;
pub mod shared_args;
pub mod sims;
pub mod table;
pub mod target;
pub mod units;

// Re-exports for easier access
pub use config::{ChannelConfig, PayloadConfig, RunConfig, TargetConfig};
pub use instrument::{Instrument, InstrumentError, InstrumentRecord};
pub use io::{JsonGroup, OutputGroup};
pub use photometry::signal::Signal;
pub use sims::observe::{build_channels, observe_target, observe_targets, TargetResult};
pub use table::ChannelTable;
