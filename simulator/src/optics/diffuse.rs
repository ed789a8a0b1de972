//! Conversion of diffuse radiance into detected signal.
//!
//! Shared by the instrument self-emission (see [`super::path::OpticalPath`])
//! and the diffuse foregrounds. Radiance is in W m⁻² sr⁻¹ µm⁻¹ and the
//! outputs are in counts/s, one value per channel bin.

use thiserror::Error;

use super::geometry::omega_pix;
use crate::algo::convolve::convolve_same;
use crate::algo::trapezoid::trap_integrate;
use crate::config::ChannelConfig;
use crate::instrument::{BuiltChannel, ChannelGeometry};
use crate::photometry::signal::{Signal, SignalError};
use crate::table::{columns, TableError};
use crate::units::{photons_per_joule, pixel_area_m2};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DiffuseError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Pixel solution needed to smear radiance through a slit.
#[derive(Debug, Clone, PartialEq)]
pub struct SlitGeometry {
    /// Slit width in µm
    pub width: f64,
    pub delta_pix: f64,
    /// Wavelength at each detector pixel centre, ascending
    pub wl_pix_center: Vec<f64>,
    pub pixel_bandwidth: Vec<f64>,
    /// Spatial window width of each bin in pixels
    pub window_spatial_width: Vec<f64>,
}

/// Quantities every diffuse source needs to become detected signal.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffuseContext {
    /// Pixel area in m²
    pub pixel_area: f64,
    /// Pixel solid angle in sr
    pub omega_pix: f64,
    pub qe: Signal,
    /// Channel transmission on the optical path grid
    pub transmission: Signal,
    /// (left, right) edges of each channel bin
    pub bins: Vec<(f64, f64)>,
    /// Window size of each bin in pixels
    pub window_size: Vec<f64>,
    /// Present when light reaches the detector through a slit
    pub slit: Option<SlitGeometry>,
}

/// Gather the shared conversion quantities for a channel.
pub fn prepare(channel: &ChannelConfig, built: &BuiltChannel) -> Result<DiffuseContext, DiffuseError> {
    log::info!("computing signal");
    let omega = omega_pix(channel.f_num_x, channel.f_num_y);
    log::debug!("omega pix: {omega}");

    let slit = match (built.slit_width, &built.geometry) {
        (Some(width), ChannelGeometry::Spectrometer(geometry)) => Some(SlitGeometry {
            width,
            delta_pix: channel.detector.delta_pix,
            wl_pix_center: geometry.wl_pix_center.clone(),
            pixel_bandwidth: geometry.pixel_bandwidth.clone(),
            window_spatial_width: geometry.window_spatial_width.clone(),
        }),
        (Some(_), ChannelGeometry::Photometer(_)) => {
            log::warn!("{}: slit ignored in a photometer", channel.name);
            None
        }
        (None, _) => None,
    };

    Ok(DiffuseContext {
        pixel_area: pixel_area_m2(channel.detector.delta_pix),
        omega_pix: omega,
        qe: built.qe.clone(),
        transmission: built.transmission.clone(),
        bins: built.table.bin_edges()?,
        window_size: built.table.require(columns::WINDOW_SIZE)?.to_vec(),
        slit,
    })
}

impl DiffuseContext {
    pub fn zeros(&self) -> Vec<f64> {
        vec![0.0; self.bins.len()]
    }

    /// Radiance collected over `solid_angle` sr, converted to a detected
    /// photon rate density (counts/s/µm) on the radiance grid.
    pub fn photon_rate(&self, radiance: &Signal, solid_angle: f64) -> Signal {
        let qe = self.qe.spectral_rebin(&radiance.wl_grid);
        let data = radiance
            .data
            .iter()
            .zip(&qe.data)
            .zip(&radiance.wl_grid)
            .map(|((r, q), &wl)| r * solid_angle * self.pixel_area * q * photons_per_joule(wl))
            .collect();
        Signal {
            wl_grid: radiance.wl_grid.clone(),
            data,
        }
    }
}

/// Spread radiance through the slit and bin it.
///
/// The radiance is resampled onto the pixel grid, converted to counts/s per
/// pixel and convolved with a uniform kernel `floor(slit / pitch)` pixels
/// wide (at least one). Each bin collects the pixels whose wavelength falls
/// in [left, right).
///
/// Returns `(max_signal_per_pixel, signal)`.
pub fn convolve_with_slit(
    ctx: &DiffuseContext,
    slit: &SlitGeometry,
    radiance: &Signal,
) -> Result<(Vec<f64>, Vec<f64>), DiffuseError> {
    let wl_pix = &slit.wl_pix_center;
    let rebinned = radiance.spectral_rebin(wl_pix);
    let qe = ctx.qe.interp(wl_pix, 0.0)?;

    let per_pixel: Vec<f64> = rebinned
        .data
        .iter()
        .zip(&qe)
        .zip(wl_pix.iter().zip(&slit.pixel_bandwidth))
        .map(|((r, q), (&wl, dwl))| {
            r * ctx.omega_pix * ctx.pixel_area * q * photons_per_joule(wl) * dwl
        })
        .collect();

    let kernel_width = ((slit.width / slit.delta_pix).floor() as usize).max(1);
    log::debug!("convolving with slit: {kernel_width} pixels");
    let smeared = convolve_same(&per_pixel, &vec![1.0; kernel_width]);

    let mut max_signal = Vec::with_capacity(ctx.bins.len());
    let mut signal = Vec::with_capacity(ctx.bins.len());
    for (k, &(left, right)) in ctx.bins.iter().enumerate() {
        let in_bin: Vec<f64> = wl_pix
            .iter()
            .zip(&smeared)
            .filter(|(&wl, _)| wl >= left && wl < right)
            .map(|(_, &s)| s)
            .collect();
        let spatial = slit.window_spatial_width.get(k).copied().unwrap_or(1.0);
        signal.push(in_bin.iter().sum::<f64>() * spatial);
        if in_bin.is_empty() {
            log::warn!("no detector pixel in bin [{left}, {right}) µm");
            max_signal.push(0.0);
        } else {
            max_signal.push(in_bin.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        }
    }
    Ok((max_signal, signal))
}

/// Integrate a photon rate density over the whole grid.
///
/// Every bin sees the same integrated rate per pixel; the bin signal scales
/// it by the window size. Returns `(max_signal_per_pixel, signal)`.
pub fn integrate_light(rate: &Signal, window_size: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let per_pixel = trap_integrate(&rate.wl_grid, &rate.data);
    log::debug!("integrated rate per pixel: {per_pixel}");
    let signal = window_size.iter().map(|w| per_pixel * w).collect();
    (vec![per_pixel; window_size.len()], signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::misc::linspace;
    use approx::assert_relative_eq;

    fn context(slit: Option<SlitGeometry>) -> DiffuseContext {
        let grid = linspace(1.0, 3.0, 201);
        DiffuseContext {
            pixel_area: 1.0e-10,
            omega_pix: 0.01,
            qe: Signal::constant(grid.clone(), 0.5),
            transmission: Signal::constant(grid, 1.0),
            bins: vec![(1.5, 2.0), (2.0, 2.5)],
            window_size: vec![2.0, 4.0],
            slit,
        }
    }

    #[test]
    fn test_integrate_light_scales_by_window() {
        let rate = Signal::constant(linspace(1.0, 2.0, 11), 3.0);
        let (max, signal) = integrate_light(&rate, &[1.0, 2.5]);
        assert_relative_eq!(max[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(max[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(signal[1], 7.5, epsilon = 1e-12);
    }

    #[test]
    fn test_photon_rate_factors() {
        let ctx = context(None);
        let radiance = Signal::constant(vec![2.0, 2.5], 1.0);
        let rate = ctx.photon_rate(&radiance, std::f64::consts::PI);
        let expected = std::f64::consts::PI * 1.0e-10 * 0.5 * photons_per_joule(2.0);
        assert_relative_eq!(rate.data[0], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_slit_convolution_bins() {
        let wl_pix = linspace(1.525, 2.475, 20);
        let slit = SlitGeometry {
            width: 3.5,
            delta_pix: 1.0,
            wl_pix_center: wl_pix.clone(),
            pixel_bandwidth: vec![0.05; wl_pix.len()],
            window_spatial_width: vec![1.0, 2.0],
        };
        let ctx = context(Some(slit.clone()));
        let radiance = Signal::constant(linspace(1.0, 3.0, 201), 1.0);
        let (max, signal) = convolve_with_slit(&ctx, &slit, &radiance).unwrap();

        // 3-pixel kernel: interior pixels see three neighbours
        let per_pixel = 0.01 * 1.0e-10 * 0.5 * 0.05;
        assert_relative_eq!(
            max[0],
            3.0 * per_pixel * photons_per_joule(1.975),
            max_relative = 1e-9
        );
        // second bin is [2.0, 2.5) and carries twice the spatial width
        assert!(signal[1] > signal[0]);
    }

    #[test]
    fn test_slit_empty_bin_is_zero() {
        let slit = SlitGeometry {
            width: 1.0,
            delta_pix: 1.0,
            wl_pix_center: vec![1.6, 1.7, 1.8],
            pixel_bandwidth: vec![0.1; 3],
            window_spatial_width: vec![1.0, 1.0],
        };
        let ctx = context(Some(slit.clone()));
        let radiance = Signal::constant(linspace(1.0, 3.0, 201), 1.0);
        let (max, signal) = convolve_with_slit(&ctx, &slit, &radiance).unwrap();
        assert_eq!(max[1], 0.0);
        assert_eq!(signal[1], 0.0);
        assert!(signal[0] > 0.0);
    }
}
