//! Black body spectral radiance.

use crate::units::{Temperature, TemperatureExt};

/// First radiation constant 2hc² in W m⁻² sr⁻¹ µm⁴
const PLANCK_A: f64 = 1.191_042_768e8;
/// Second radiation constant hc/k in µm K
const PLANCK_B: f64 = 14_387.751_6;

/// Planck spectral radiance in W m⁻² sr⁻¹ µm⁻¹.
///
/// # Arguments
/// * `wl_um` - Wavelength in µm
/// * `temperature` - Black body temperature
///
/// # Returns
/// The radiance, or 0.0 where the exponent overflows (deep Wien tail) or the
/// temperature is not positive.
pub fn planck(wl_um: f64, temperature: Temperature) -> f64 {
    let t = temperature.as_kelvin();
    if t <= 0.0 || wl_um <= 0.0 {
        return 0.0;
    }
    let x = PLANCK_B / (wl_um * t);
    let denom = x.exp_m1();
    if !denom.is_finite() {
        return 0.0;
    }
    PLANCK_A / wl_um.powi(5) / denom
}

/// Planck radiance sampled on a wavelength grid.
pub fn planck_curve(wl_um: &[f64], temperature: Temperature) -> Vec<f64> {
    wl_um.iter().map(|&wl| planck(wl, temperature)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wien_peak() {
        // Wien displacement: λ_max T = 2897.77 µm K
        let t = Temperature::from_kelvin(5800.0);
        let wl_peak = 2897.771_955 / 5800.0;
        let peak = planck(wl_peak, t);
        assert!(peak > planck(wl_peak * 0.95, t));
        assert!(peak > planck(wl_peak * 1.05, t));
    }

    #[test]
    fn test_known_value() {
        // 300 K at 10 µm: 9.924 W m⁻² sr⁻¹ µm⁻¹
        let b = planck(10.0, Temperature::from_kelvin(300.0));
        assert_relative_eq!(b, 9.924, max_relative = 1e-3);
    }

    #[test]
    fn test_cold_body_underflows_to_zero() {
        assert_eq!(planck(0.5, Temperature::from_kelvin(1.0)), 0.0);
        assert_eq!(planck(1.0, Temperature::from_kelvin(0.0)), 0.0);
    }
}
