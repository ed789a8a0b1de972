//! Diffuse foregrounds in front of the telescope.
//!
//! Foregrounds are sampled on a 6000-point logarithmic grid spanning the
//! common payload band. Their order is the order of registration in the
//! payload; later entries sit closer to the aperture.

pub mod sky;
pub mod zodiacal;

use thiserror::Error;

use crate::algo::misc::logspace;
use crate::config::{CommonConfig, ForegroundConfig};
use crate::photometry::quantum_efficiency::NATIVE_GRID_POINTS;
use crate::photometry::signal::{Signal, SignalError};

pub use sky::sky_foreground;
pub use zodiacal::{zodiacal_foreground, ZodiacalError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForegroundError {
    #[error("foreground band [{0}, {1}] µm is empty or non-positive")]
    InvalidBand(f64, f64),
    #[error("foreground '{name}': missing column '{column}'")]
    MissingColumn { name: String, column: String },
    #[error(transparent)]
    Zodiacal(#[from] ZodiacalError),
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Radiance of one foreground, and its transmission if it absorbs.
#[derive(Debug, Clone, PartialEq)]
pub struct Foreground {
    pub name: String,
    /// W m⁻² sr⁻¹ µm⁻¹
    pub radiance: Signal,
    pub transmission: Option<Signal>,
}

/// Logarithmic grid over the common payload band.
pub fn foreground_grid(common: &CommonConfig) -> Result<Vec<f64>, ForegroundError> {
    if !(common.wl_min > 0.0 && common.wl_max > common.wl_min) {
        return Err(ForegroundError::InvalidBand(common.wl_min, common.wl_max));
    }
    Ok(logspace(common.wl_min, common.wl_max, NATIVE_GRID_POINTS))
}

/// Every configured foreground, in registration order.
///
/// `coordinates` (ra, dec in degrees) select the zodiacal map entry when a
/// map is configured.
pub fn estimate_foregrounds(
    common: &CommonConfig,
    coordinates: Option<(f64, f64)>,
) -> Result<Vec<Foreground>, ForegroundError> {
    log::info!("estimating foregrounds");
    let wl = foreground_grid(common)?;
    common
        .foregrounds
        .iter()
        .map(|config| match config {
            ForegroundConfig::Zodiacal { zodiac_factor, map } => Ok(zodiacal_foreground(
                &wl,
                *zodiac_factor,
                map.as_ref(),
                coordinates,
            )?),
            ForegroundConfig::Sky { name, data } => sky_foreground(&wl, name, data),
        })
        .collect()
}

/// Combined transmission of every absorbing foreground, if any.
pub fn sky_transmission(foregrounds: &[Foreground]) -> Option<Signal> {
    let mut combined: Option<Signal> = None;
    for transmission in foregrounds.iter().filter_map(|f| f.transmission.as_ref()) {
        match combined.as_mut() {
            Some(total) => total.scale_by(&transmission.data),
            None => combined = Some(transmission.clone()),
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataTable;

    fn common(foregrounds: Vec<ForegroundConfig>) -> CommonConfig {
        CommonConfig {
            wl_min: 0.5,
            wl_max: 8.0,
            telescope_area: 0.6,
            force_channel_wl_edge: false,
            foregrounds,
            custom_noise: Vec::new(),
        }
    }

    fn sky(name: &str, transmission: f64) -> ForegroundConfig {
        ForegroundConfig::Sky {
            name: name.into(),
            data: DataTable::new()
                .with_column("Wavelength", vec![0.1, 20.0])
                .with_column("Radiance", vec![1.0, 1.0])
                .with_column("Transmission", vec![transmission, transmission]),
        }
    }

    #[test]
    fn test_registration_order_kept() {
        let fgs = estimate_foregrounds(
            &common(vec![
                ForegroundConfig::Zodiacal {
                    zodiac_factor: 1.0,
                    map: None,
                },
                sky("earthshine", 0.9),
            ]),
            None,
        )
        .unwrap();
        let names: Vec<_> = fgs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zodi", "earthshine"]);
        assert_eq!(fgs[0].radiance.len(), NATIVE_GRID_POINTS);
        assert!(fgs[0].transmission.is_none());
    }

    #[test]
    fn test_sky_transmission_product() {
        let fgs =
            estimate_foregrounds(&common(vec![sky("a", 0.5), sky("b", 0.8)]), None).unwrap();
        let total = sky_transmission(&fgs).unwrap();
        assert!(total.data.iter().all(|t| (t - 0.4).abs() < 1e-12));
        assert!(sky_transmission(&fgs[..0]).is_none());
    }

    #[test]
    fn test_invalid_band() {
        let mut c = common(Vec::new());
        c.wl_max = 0.1;
        assert_eq!(
            foreground_grid(&c),
            Err(ForegroundError::InvalidBand(0.5, 0.1))
        );
    }
}
