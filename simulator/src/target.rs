//! Point-source targets and their per-target state.

use thiserror::Error;

use crate::algo::misc::sorted_table;
use crate::config::TargetConfig;
use crate::foreground::Foreground;
use crate::photometry::signal::Signal;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TargetError {
    #[error("target '{name}': {reason}")]
    InvalidSed { name: String, reason: String },
}

/// A target ready for observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    /// Spectral energy distribution in W m⁻² µm⁻¹, ascending wavelength
    pub sed: Signal,
    /// (ra, dec) in degrees
    pub coordinates: Option<(f64, f64)>,
    /// Diffuse foregrounds in registration order
    pub foregrounds: Vec<Foreground>,
    /// Combined transmission of the absorbing foregrounds
    pub sky_transmission: Option<Signal>,
}

impl Target {
    /// Validate and sort the SED of `config`.
    ///
    /// # Errors
    /// Mismatched column lengths, fewer than two distinct wavelengths,
    /// non-positive wavelengths or non-finite fluxes.
    pub fn new(config: &TargetConfig) -> Result<Self, TargetError> {
        let invalid = |reason: &str| TargetError::InvalidSed {
            name: config.name.clone(),
            reason: reason.to_string(),
        };
        let sed = &config.sed;
        if sed.wavelength.len() != sed.flux.len() {
            return Err(invalid("wavelength and flux lengths differ"));
        }
        if sed.wavelength.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(invalid("wavelengths must be finite and positive"));
        }
        if sed.flux.iter().any(|f| !f.is_finite()) {
            return Err(invalid("flux must be finite"));
        }
        let (wl_grid, data) = sorted_table(&sed.wavelength, &sed.flux)
            .map_err(|_| invalid("fewer than two distinct wavelengths"))?;

        Ok(Self {
            name: config.name.clone(),
            sed: Signal { wl_grid, data },
            coordinates: config.coordinates,
            foregrounds: Vec::new(),
            sky_transmission: None,
        })
    }
}
