//! Detector quantum efficiency curves.
//!
//! Quantum efficiency (QE) is the probability that a photon of a given
//! wavelength is converted into a detected electron. Channels describe it
//! either as a single number or as a table; both forms are normalised here to
//! a curve sampled on the detector's native 6000-point logarithmic grid
//! spanning [detector wl_min, cut-off], which is what every downstream
//! radiometric product consumes.
//!
//! # Data Requirements
//!
//! - Efficiency values in [0.0, 1.0]
//! - Zero efficiency outside the tabulated range

use thiserror::Error;

use super::signal::{Signal, SignalError};
use crate::algo::misc::logspace;

/// Number of samples of the detector-native wavelength grid
pub const NATIVE_GRID_POINTS: usize = 6000;

/// Errors that can occur with quantum efficiency calculations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuantumEfficiencyError {
    #[error("Efficiency values must be between 0.0 and 1.0")]
    OutOfRange,

    #[error("Detector band [{0}, {1}] µm is empty or non-positive")]
    InvalidBand(f64, f64),

    #[error("QE table error: {0}")]
    Table(#[from] SignalError),
}

/// Wavelength-dependent quantum efficiency of a channel detector.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantumEfficiency {
    curve: Signal,
}

/// Logarithmic detector grid from `wl_min` to the cut-off wavelength.
pub fn detector_grid(wl_min: f64, cut_off: f64) -> Result<Vec<f64>, QuantumEfficiencyError> {
    if !(wl_min > 0.0 && cut_off > wl_min) {
        return Err(QuantumEfficiencyError::InvalidBand(wl_min, cut_off));
    }
    Ok(logspace(wl_min, cut_off, NATIVE_GRID_POINTS))
}

impl QuantumEfficiency {
    /// Flat QE over the detector band.
    ///
    /// # Arguments
    /// * `wl_min` - Shortest detected wavelength in µm
    /// * `cut_off` - Detector cut-off wavelength in µm
    /// * `efficiency` - Constant QE value [0.0, 1.0]
    pub fn from_constant(
        wl_min: f64,
        cut_off: f64,
        efficiency: f64,
    ) -> Result<Self, QuantumEfficiencyError> {
        if !(0.0..=1.0).contains(&efficiency) {
            return Err(QuantumEfficiencyError::OutOfRange);
        }
        let grid = detector_grid(wl_min, cut_off)?;
        Ok(Self {
            curve: Signal::constant(grid, efficiency),
        })
    }

    /// Tabulated QE resampled onto the detector grid, zero outside the table.
    pub fn from_table(
        wl_min: f64,
        cut_off: f64,
        wavelengths: &[f64],
        efficiencies: &[f64],
    ) -> Result<Self, QuantumEfficiencyError> {
        if efficiencies.iter().any(|e| !(0.0..=1.0).contains(e)) {
            return Err(QuantumEfficiencyError::OutOfRange);
        }
        let table = Signal::new(wavelengths.to_vec(), efficiencies.to_vec())?;
        let grid = detector_grid(wl_min, cut_off)?;
        let data = table.interp(&grid, 0.0)?;
        Ok(Self {
            curve: Signal { wl_grid: grid, data },
        })
    }

    /// Restore from a previously sampled curve.
    pub fn from_curve(curve: Signal) -> Self {
        Self { curve }
    }

    /// QE at each wavelength, zero outside the detector band.
    pub fn at(&self, wl: &[f64]) -> Result<Vec<f64>, QuantumEfficiencyError> {
        Ok(self.curve.interp(wl, 0.0)?)
    }

    /// The sampled curve.
    pub fn curve(&self) -> &Signal {
        &self.curve
    }
}
