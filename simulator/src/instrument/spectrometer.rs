//! Dispersive channels.
//!
//! The detector pixel grid comes from the wavelength solution, a table of
//! detector position x (µm along the dispersion direction) against
//! wavelength. Pixel centres are laid every `delta_pix` between the positions
//! of the channel band edges. Spectral bins are then either the pixels
//! themselves (native), a grid of constant resolving power, or a grid whose
//! resolving power is tabulated against wavelength.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{bin_table, detector_qe, BuiltChannel, ChannelGeometry, ChannelLayout, Efficiency, InstrumentError};
use crate::algo::misc::{arange, interp_extrapolate, linspace};
use crate::algo::spline::CubicSpline;
use crate::algo::trapezoid::trap_integrate_masked;
use crate::config::{ChannelConfig, ResolvingPower, SpectrometerConfig, WavelengthSolution};
use crate::optics::psf::binned_airy_psf;
use crate::photometry::signal::Signal;
use crate::table::{columns, ChannelTable};
use crate::target::Target;
use crate::units::photons_per_joule;

/// Number of wavelengths the PSF gain curve is sampled at
const GAIN_SAMPLES: usize = 10;
/// Spatial half-width in λF units without an encircled energy solution
const DEFAULT_SPATIAL_RADIUS: f64 = 1.22;

/// Pixel solution, windows and PSF gain of a spectrometer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralGeometry {
    pub wl_solution: WavelengthSolution,
    /// Detector position of each pixel centre in µm
    pub pix_center: Vec<f64>,
    /// Wavelength of each pixel centre, ascending
    pub wl_pix_center: Vec<f64>,
    pub pixel_bandwidth: Vec<f64>,
    /// Spectral bin edges
    pub wl_bin: Vec<f64>,
    pub window_spectral_width: Vec<f64>,
    pub window_spatial_width: Vec<f64>,
    /// Fraction of a bin's signal in its brightest pixel, against wavelength
    pub gain: Signal,
}

impl SpectralGeometry {
    fn gain_spline(&self) -> Result<CubicSpline, InstrumentError> {
        Ok(CubicSpline::new(self.gain.wl_grid.clone(), self.gain.data.clone())?)
    }
}

/// Forward (x → wavelength) and inverse maps of a wavelength solution.
struct PixelSolution<'a> {
    solution: &'a WavelengthSolution,
}

impl PixelSolution<'_> {
    fn wavelength(&self, x: &[f64]) -> Result<Vec<f64>, InstrumentError> {
        Ok(interp_extrapolate(x, &self.solution.x, &self.solution.wavelength)?)
    }

    fn position(&self, wl: &[f64]) -> Result<Vec<f64>, InstrumentError> {
        Ok(interp_extrapolate(wl, &self.solution.wavelength, &self.solution.x)?)
    }
}

pub(super) fn build(
    description: &ChannelConfig,
    config: &SpectrometerConfig,
) -> Result<ChannelLayout, InstrumentError> {
    let name = &description.name;
    let wl_solution = config
        .wl_solution
        .as_ref()
        .ok_or_else(|| {
            log::error!("{name}: wavelength solution not indicated");
            InstrumentError::MissingWavelengthSolution(name.clone())
        })?;
    let solution = PixelSolution {
        solution: wl_solution,
    };
    let delta = description.detector.delta_pix;

    let edges = solution.position(&[description.wl_min, description.wl_max])?;
    let (first, last) = if edges[1] < edges[0] {
        (edges[1], edges[0])
    } else {
        (edges[0], edges[1])
    };
    log::debug!("{name}: first pixel {first}, last pixel {last}");

    let mut pix_center = arange(first, last, delta);
    let mut wl_pix_center = solution.wavelength(&pix_center)?;
    if wl_pix_center.is_empty() {
        return Err(InstrumentError::EmptyPixelGrid(name.clone()));
    }
    if wl_pix_center.first() > wl_pix_center.last() {
        pix_center.reverse();
        wl_pix_center.reverse();
    }
    let lower: Vec<f64> = pix_center.iter().map(|c| c - 0.5 * delta).collect();
    let upper: Vec<f64> = pix_center.iter().map(|c| c + 0.5 * delta).collect();
    let pixel_bandwidth: Vec<f64> = solution
        .wavelength(&lower)?
        .iter()
        .zip(solution.wavelength(&upper)?)
        .map(|(a, b)| (a - b).abs())
        .collect();

    let wl_bin = bin_edges(description, &config.target_r, &wl_pix_center, &pixel_bandwidth)?;
    let mut table = bin_table(name, &wl_bin)?;
    let centres = table.require(columns::WAVELENGTH)?.to_vec();

    let qe = detector_qe(description)?;
    table.set_column(columns::QE, qe.at(&centres)?)?;

    let window_spectral_width: Vec<f64> = match config.window_spectral_px {
        Some(px) => vec![px; centres.len()],
        None => solution
            .position(&wl_bin)?
            .windows(2)
            .map(|w| (w[1] - w[0]).abs() / delta)
            .collect(),
    };

    let window_spatial_width: Vec<f64> = match config.window_spatial_px {
        Some(px) => vec![px; centres.len()],
        None => {
            let radius = match &config.enc_e_solution {
                Some(ee) => {
                    log::debug!("{name}: encircled energy solution found");
                    interp_extrapolate(&centres, &ee.wavelength, &ee.radius)?
                }
                None => vec![DEFAULT_SPATIAL_RADIUS; centres.len()],
            };
            let scale = config.window_spatial_scale.unwrap_or(1.0);
            radius
                .iter()
                .zip(&centres)
                .map(|(r, wl)| 2.0 * r * description.f_num_y * wl / delta * scale)
                .collect()
        }
    };

    let window_size: Vec<f64> = window_spectral_width
        .iter()
        .zip(&window_spatial_width)
        .map(|(a, b)| a * b)
        .collect();
    log::debug!("{name}: window size {window_size:?}");
    table.set_column(columns::WINDOW_SIZE, window_size)?;

    let gain = psf_gain(description, config, &wl_pix_center);

    Ok(ChannelLayout {
        table,
        qe: qe.curve().clone(),
        geometry: ChannelGeometry::Spectrometer(SpectralGeometry {
            wl_solution: wl_solution.clone(),
            pix_center,
            wl_pix_center,
            pixel_bandwidth,
            wl_bin,
            window_spectral_width,
            window_spatial_width,
            gain,
        }),
    })
}

/// Spectral bin edges for the requested resolving power.
fn bin_edges(
    description: &ChannelConfig,
    target_r: &ResolvingPower,
    wl_pix_center: &[f64],
    pixel_bandwidth: &[f64],
) -> Result<Vec<f64>, InstrumentError> {
    let channel = description.name.clone();
    let invalid = |reason: &str| InstrumentError::InvalidResolvingPower {
        channel: channel.clone(),
        reason: reason.to_string(),
    };
    let (wl_min, wl_max) = (description.wl_min, description.wl_max);
    let geometric = matches!(target_r, ResolvingPower::Fixed(_) | ResolvingPower::Tabulated { .. });
    if geometric && !(wl_min > 0.0 && wl_max > wl_min && wl_max.is_finite()) {
        return Err(invalid("band must satisfy 0 < wl_min < wl_max"));
    }

    match target_r {
        ResolvingPower::Keyword(k) if k == "native" => {
            log::debug!("{channel}: native spectral resolution");
            let mut edges: Vec<f64> = wl_pix_center
                .iter()
                .zip(pixel_bandwidth)
                .map(|(c, w)| c - 0.5 * w)
                .collect();
            let n = wl_pix_center.len();
            edges.push(wl_pix_center[n - 1] + 0.5 * pixel_bandwidth[n - 1]);
            Ok(edges)
        }
        ResolvingPower::Keyword(other) => {
            log::error!("{channel}: resolving power format unsupported");
            Err(InstrumentError::UnsupportedResolvingPower {
                channel: channel.clone(),
                value: other.clone(),
            })
        }
        ResolvingPower::Fixed(r) => {
            if !(*r > 0.0 && r.is_finite()) {
                return Err(invalid("R must be positive"));
            }
            log::debug!("{channel}: spectral resolution set to {r}");
            let step = 1.0 + 1.0 / r;
            if !(step > 1.0) {
                return Err(invalid("R too large to resolve in double precision"));
            }
            let n = ((wl_max / wl_min).ln() / step.ln()).ceil();
            if !(n.is_finite() && n >= 1.0 && n < i32::MAX as f64) {
                return Err(invalid("bin count out of range"));
            }
            let n = n as usize + 1;
            Ok((0..n).map(|k| wl_min * step.powi(k as i32)).collect())
        }
        ResolvingPower::Tabulated { wavelength, r } => {
            if wavelength.len() != r.len() || wavelength.len() < 2 {
                return Err(invalid("tabulated R needs matching wavelength and r columns"));
            }
            if r.iter().any(|v| !(*v > 0.0)) {
                return Err(invalid("R must be positive"));
            }
            log::debug!("{channel}: wavelength-dependent spectral resolution");
            let mut edges = vec![wl_min];
            let mut edge = wl_min;
            while edge < wl_max {
                let local_r = interp_extrapolate(&[edge], wavelength, r)?[0];
                if !(local_r > 0.0) {
                    return Err(invalid("extrapolated R is not positive"));
                }
                let next = edge * (1.0 + 1.0 / local_r);
                if !(next > edge) {
                    return Err(invalid("tabulated R too large to advance the bin edge"));
                }
                edge = next;
                edges.push(edge);
            }
            Ok(edges)
        }
    }
}

/// Brightest-column fraction of the binned PSF over the pixel wavelengths,
/// scaled by the Strehl ratio when a wavefront error is given.
fn psf_gain(description: &ChannelConfig, config: &SpectrometerConfig, wl_pix_center: &[f64]) -> Signal {
    let wl_lo = wl_pix_center.iter().copied().fold(f64::INFINITY, f64::min);
    let wl_hi = wl_pix_center.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let wl_prf = linspace(wl_lo, wl_hi, GAIN_SAMPLES);

    let data = wl_prf
        .iter()
        .map(|&wl| {
            let psf = binned_airy_psf(
                description.f_num_x,
                description.f_num_y,
                wl,
                description.detector.delta_pix,
            );
            let strehl = config
                .wfe_rms
                .map(|wfe| (-(2.0 * PI * wfe / wl).powi(2)).exp())
                .unwrap_or(1.0);
            psf.column_gain() * strehl
        })
        .collect();
    let gain = Signal {
        wl_grid: wl_prf,
        data,
    };
    log::debug!("{}: PSF gain {:?}", description.name, gain.data);
    gain
}

/// Point-source signal per spectral bin, computed on the SED grid.
pub(super) fn propagate_target(
    built: &BuiltChannel,
    geometry: &SpectralGeometry,
    target: &Target,
    efficiency: &Efficiency,
    telescope_area: f64,
) -> Result<ChannelTable, InstrumentError> {
    let wl = &target.sed.wl_grid;
    let sed = &target.sed.data;

    let density: Vec<f64> = wl
        .iter()
        .zip(sed)
        .zip(efficiency.qe.iter().zip(&efficiency.transmission))
        .map(|((&x, s), (q, t))| telescope_area * t * q * s * photons_per_joule(x))
        .collect();
    let flux_density: Vec<f64> = efficiency.window.iter().zip(sed).map(|(w, s)| w * s).collect();

    let bins = built.table.bin_edges()?;
    let mut star_flux = Vec::with_capacity(bins.len());
    let mut star_signal = Vec::with_capacity(bins.len());
    for &(left, right) in &bins {
        let in_bin = |x: f64| x >= left && x < right;
        star_flux.push(trap_integrate_masked(wl, &flux_density, in_bin));
        star_signal.push(trap_integrate_masked(wl, &density, in_bin));
    }
    log::debug!("star signal: {star_signal:?}");

    let gain = geometry.gain_spline()?;
    let per_pixel = Signal {
        wl_grid: wl.clone(),
        data: density,
    }
    .spectral_rebin(&geometry.wl_pix_center);
    let in_pixel: Vec<f64> = per_pixel
        .data
        .iter()
        .zip(&geometry.pixel_bandwidth)
        .zip(&geometry.wl_pix_center)
        .map(|((d, bw), &x)| d * bw * gain.evaluate(x))
        .collect();

    let max_in_pixel: Vec<f64> = bins
        .iter()
        .map(|&(left, right)| {
            geometry
                .wl_pix_center
                .iter()
                .zip(&in_pixel)
                .filter(|&(&x, _)| x >= left && x < right)
                .map(|(_, &s)| s)
                .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))
                .unwrap_or_else(|| {
                    log::warn!("no detector pixel in bin [{left}, {right}) µm");
                    0.0
                })
        })
        .collect();
    log::debug!("star signal in pixel max: {max_in_pixel:?}");

    let mut out = ChannelTable::new(&built.table.ch_name);
    out.set_column(columns::STAR_FLUX, star_flux)?;
    out.set_column(columns::STAR_SIGNAL, star_signal.clone())?;
    out.set_column(columns::STAR_SIGNAL_IN_APERTURE, star_signal)?;
    out.set_column(columns::STAR_MAX_SIGNAL, max_in_pixel)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelKind, DetectorConfig, QeConfig};

    fn channel(target_r: ResolvingPower) -> ChannelConfig {
        ChannelConfig {
            name: "Spec".into(),
            wl_min: 1.0,
            wl_max: 2.0,
            f_num_x: 20.0,
            f_num_y: 20.0,
            detector: DetectorConfig {
                wl_min: 0.8,
                cut_off: 2.5,
                delta_pix: 18.0,
                qe: QeConfig::Constant(0.7),
                well_depth: 1.0e5,
                freq_ndr: 1.0,
                dark_current: 1.0,
                read_noise: 10.0,
                f_well_depth: Some(0.9),
                frame_time: None,
                multiaccum_m: None,
            },
            optics: Vec::new(),
            noise_x: 0.0,
            custom_noise: Vec::new(),
            kind: ChannelKind::Spectrometer(SpectrometerConfig {
                target_r,
                wl_solution: Some(WavelengthSolution {
                    wavelength: vec![0.9, 2.1],
                    x: vec![0.0, 1200.0],
                }),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_fixed_r_edge_count() {
        let ch = channel(ResolvingPower::Fixed(50.0));
        let edges = bin_edges(&ch, &ResolvingPower::Fixed(50.0), &[], &[]).unwrap();
        let expected = ((2.0f64).ln() / (1.02f64).ln()).ceil() as usize + 1;
        assert_eq!(edges.len(), expected);
        assert_eq!(edges[0], 1.0);
        assert!(edges[edges.len() - 1] >= 2.0);
    }

    #[test]
    fn test_fixed_r_below_precision() {
        let ch = channel(ResolvingPower::default());
        assert!(matches!(
            bin_edges(&ch, &ResolvingPower::Fixed(1.0e17), &[], &[]),
            Err(InstrumentError::InvalidResolvingPower { .. })
        ));
    }

    #[test]
    fn test_tabulated_r_below_precision() {
        let ch = channel(ResolvingPower::default());
        let r = ResolvingPower::Tabulated {
            wavelength: vec![1.0, 2.0],
            r: vec![1.0e17, 1.0e17],
        };
        assert!(matches!(
            bin_edges(&ch, &r, &[], &[]),
            Err(InstrumentError::InvalidResolvingPower { .. })
        ));
    }

    #[test]
    fn test_non_positive_band_start() {
        let mut ch = channel(ResolvingPower::default());
        ch.wl_min = 0.0;
        let tabulated = ResolvingPower::Tabulated {
            wavelength: vec![1.0, 2.0],
            r: vec![20.0, 40.0],
        };
        for r in [ResolvingPower::Fixed(50.0), tabulated] {
            assert!(matches!(
                bin_edges(&ch, &r, &[], &[]),
                Err(InstrumentError::InvalidResolvingPower { .. })
            ));
        }
    }

    #[test]
    fn test_tabulated_r_reaches_band_edge() {
        let ch = channel(ResolvingPower::default());
        let r = ResolvingPower::Tabulated {
            wavelength: vec![1.0, 2.0],
            r: vec![20.0, 40.0],
        };
        let edges = bin_edges(&ch, &r, &[], &[]).unwrap();
        assert!(edges.windows(2).all(|w| w[1] > w[0]));
        assert!(edges[edges.len() - 2] < 2.0 && edges[edges.len() - 1] >= 2.0);
        // first step follows R = 20
        assert!((edges[1] - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_bad_resolving_power() {
        let ch = channel(ResolvingPower::default());
        assert!(matches!(
            bin_edges(&ch, &ResolvingPower::Keyword("high".into()), &[], &[]),
            Err(InstrumentError::UnsupportedResolvingPower { .. })
        ));
        assert!(matches!(
            bin_edges(&ch, &ResolvingPower::Fixed(-3.0), &[], &[]),
            Err(InstrumentError::InvalidResolvingPower { .. })
        ));
    }

    #[test]
    fn test_native_layout() {
        let ch = channel(ResolvingPower::default());
        let ChannelKind::Spectrometer(config) = &ch.kind else {
            unreachable!()
        };
        let layout = build(&ch, config).unwrap();
        let ChannelGeometry::Spectrometer(geometry) = &layout.geometry else {
            panic!("expected a spectrometer geometry");
        };
        // 1000 µm of detector between the band edges at 18 µm pitch
        assert_eq!(geometry.wl_pix_center.len(), 56);
        assert!(geometry.wl_pix_center.windows(2).all(|w| w[1] > w[0]));
        for bw in &geometry.pixel_bandwidth {
            assert!((bw - 0.018).abs() < 1e-9);
        }
        assert_eq!(layout.table.len(), 56);
        assert!(geometry.gain.data.iter().all(|g| *g > 0.0 && *g <= 1.0));
    }

    #[test]
    fn test_missing_wavelength_solution() {
        let mut ch = channel(ResolvingPower::default());
        let config = SpectrometerConfig::default();
        ch.kind = ChannelKind::Spectrometer(config.clone());
        assert!(matches!(
            build(&ch, &config),
            Err(InstrumentError::MissingWavelengthSolution(_))
        ));
    }
}
