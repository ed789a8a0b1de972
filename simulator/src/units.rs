//! Type-safe physical units and constants for radiometric calculations
//!
//! Internally the model works on plain `f64` arrays with a fixed unit
//! convention (wavelength in µm, radiance in W m⁻² sr⁻¹ µm⁻¹, signal in
//! counts/s). The `uom` types are used where scalar quantities cross that
//! boundary: element temperatures and detector pixel pitch.

use uom::si::f64::*;
use uom::si::length::{meter, micrometer};
use uom::si::thermodynamic_temperature::kelvin;

pub type Temperature = ThermodynamicTemperature;
pub type Length = uom::si::f64::Length;

/// Kelvin in and out of [`Temperature`].
pub trait TemperatureExt {
    fn from_kelvin(kelvin: f64) -> Self;
    fn as_kelvin(&self) -> f64;
}

/// Pixel pitch and wavelength conversions. Configuration values are in µm.
pub trait LengthExt {
    fn from_micrometers(um: f64) -> Self;
    fn as_micrometers(&self) -> f64;
    fn as_meters(&self) -> f64;
}

impl TemperatureExt for Temperature {
    fn from_kelvin(value: f64) -> Self {
        Temperature::new::<kelvin>(value)
    }

    fn as_kelvin(&self) -> f64 {
        self.get::<kelvin>()
    }
}

impl LengthExt for Length {
    fn from_micrometers(um: f64) -> Self {
        Length::new::<micrometer>(um)
    }

    fn as_micrometers(&self) -> f64 {
        self.get::<micrometer>()
    }

    fn as_meters(&self) -> f64 {
        self.get::<meter>()
    }
}

/// SI physical constants (2019 exact values)
pub struct SI;

impl SI {
    /// Planck constant [J s]
    pub const PLANCK: f64 = 6.626_070_15e-34;

    /// Speed of light in vacuum [m/s]
    pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

    /// Seconds per hour, the normalisation of every noise column
    pub const SECONDS_PER_HOUR: f64 = 3600.0;
}

/// Photons per joule at wavelength `wl_um`, λ/(hc) with λ in meters.
pub fn photons_per_joule(wl_um: f64) -> f64 {
    Length::from_micrometers(wl_um).as_meters() / (SI::PLANCK * SI::SPEED_OF_LIGHT)
}

/// Area of a square pixel of pitch `delta_pix_um`, in m².
pub fn pixel_area_m2(delta_pix_um: f64) -> f64 {
    let side = Length::from_micrometers(delta_pix_um).as_meters();
    side * side
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_temperature_round_trip() {
        let t = Temperature::from_kelvin(80.0);
        assert_relative_eq!(t.as_kelvin(), 80.0);
    }

    #[test]
    fn test_length_conversions() {
        let pitch = Length::from_micrometers(18.0);
        assert_relative_eq!(pitch.as_meters(), 18.0e-6);
        assert_relative_eq!(pitch.as_micrometers(), 18.0);
    }

    #[test]
    fn test_pixel_area_and_photon_factor() {
        assert_relative_eq!(pixel_area_m2(10.0), 1.0e-10, max_relative = 1e-12);
        // 1 µm photon carries hc/λ ≈ 1.986e-19 J
        assert_relative_eq!(
            1.0 / photons_per_joule(1.0),
            1.986_445_857e-19,
            max_relative = 1e-9
        );
    }
}
