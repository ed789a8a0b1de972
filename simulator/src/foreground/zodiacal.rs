//! Zodiacal light radiance
//!
//! Two-component model of the zodiacal cloud after Glasse et al. (2010): a
//! scattered solar spectrum plus thermal emission of 270 K dust,
//!
//! I(λ) = A · (3.5e-14 · B(λ, 5500 K) + 3.58e-8 · B(λ, 270 K))
//!
//! with a single scaling coefficient A. A map of coefficients over the sky
//! can replace the fixed factor when the target position is known.

use thiserror::Error;

use super::Foreground;
use crate::config::ZodiacalMapConfig;
use crate::photometry::planck::planck;
use crate::photometry::signal::Signal;
use crate::units::{Temperature, TemperatureExt};

/// Scattered sunlight dilution factor
const SCATTERED_WEIGHT: f64 = 3.5e-14;
/// Thermal dust emissivity factor
const THERMAL_WEIGHT: f64 = 3.58e-8;
const SOLAR_TEMPERATURE_K: f64 = 5500.0;
const DUST_TEMPERATURE_K: f64 = 270.0;

/// Errors that can occur when working with zodiacal maps
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZodiacalError {
    #[error("zodiacal map columns have different lengths or are empty")]
    InvalidMap,
}

/// Zodiacal radiance in W m⁻² sr⁻¹ µm⁻¹ for scaling coefficient `a`.
pub fn zodiacal_model(wl: &[f64], a: f64) -> Vec<f64> {
    let sun = Temperature::from_kelvin(SOLAR_TEMPERATURE_K);
    let dust = Temperature::from_kelvin(DUST_TEMPERATURE_K);
    wl.iter()
        .map(|&w| a * (SCATTERED_WEIGHT * planck(w, sun) + THERMAL_WEIGHT * planck(w, dust)))
        .collect()
}

/// Coefficient of the map entry nearest to (ra, dec), in degrees.
pub fn map_coefficient(map: &ZodiacalMapConfig, ra: f64, dec: f64) -> Result<f64, ZodiacalError> {
    if map.ra.is_empty() || map.ra.len() != map.dec.len() || map.ra.len() != map.coeff.len() {
        return Err(ZodiacalError::InvalidMap);
    }
    let nearest = map
        .ra
        .iter()
        .zip(&map.dec)
        .map(|(r, d)| (r - ra).powi(2) + (d - dec).powi(2))
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .ok_or(ZodiacalError::InvalidMap)?;
    Ok(map.coeff[nearest])
}

/// Zodiacal foreground on `wl`.
///
/// Uses the map coefficient when both a map and target coordinates are
/// available, otherwise `zodiac_factor`.
pub fn zodiacal_foreground(
    wl: &[f64],
    zodiac_factor: f64,
    map: Option<&ZodiacalMapConfig>,
    coordinates: Option<(f64, f64)>,
) -> Result<Foreground, ZodiacalError> {
    let a = match (map, coordinates) {
        (Some(map), Some((ra, dec))) => {
            let a = map_coefficient(map, ra, dec)?;
            log::debug!("zodiacal coefficient {a} from map at ({ra}, {dec})");
            a
        }
        _ => {
            log::debug!("zodiac factor: {zodiac_factor}");
            zodiac_factor
        }
    };

    Ok(Foreground {
        name: "zodi".to_string(),
        radiance: Signal {
            wl_grid: wl.to_vec(),
            data: zodiacal_model(wl, a),
        },
        transmission: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_model_scales_linearly() {
        let wl = [0.5, 5.0, 15.0];
        let one = zodiacal_model(&wl, 1.0);
        let two = zodiacal_model(&wl, 2.0);
        for (a, b) in one.iter().zip(&two) {
            assert!(*a > 0.0);
            assert_relative_eq!(2.0 * a, *b, max_relative = 1e-14);
        }
    }

    #[test]
    fn test_thermal_component_dominates_mid_infrared() {
        let dust = Temperature::from_kelvin(270.0);
        let total = zodiacal_model(&[15.0], 1.0)[0];
        assert_relative_eq!(total, 3.58e-8 * planck(15.0, dust), max_relative = 1e-3);
    }

    #[test]
    fn test_map_nearest_entry() {
        let map = ZodiacalMapConfig {
            ra: vec![0.0, 90.0, 180.0],
            dec: vec![0.0, 45.0, -30.0],
            coeff: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(map_coefficient(&map, 85.0, 40.0), Ok(2.0));

        let fg = zodiacal_foreground(&[1.0], 1.0, Some(&map), Some((170.0, -25.0))).unwrap();
        assert_relative_eq!(fg.radiance.data[0], zodiacal_model(&[1.0], 3.0)[0]);

        // without coordinates the factor is used
        let fg = zodiacal_foreground(&[1.0], 1.5, Some(&map), None).unwrap();
        assert_relative_eq!(fg.radiance.data[0], zodiacal_model(&[1.0], 1.5)[0]);
    }

    #[test]
    fn test_invalid_map() {
        let map = ZodiacalMapConfig {
            ra: vec![0.0],
            dec: vec![],
            coeff: vec![1.0],
        };
        assert_eq!(map_coefficient(&map, 0.0, 0.0), Err(ZodiacalError::InvalidMap));
    }
}
