//! Channel instruments: wavelength binning, PSF geometry and signal
//! propagation.
//!
//! An [`Instrument`] moves through three states. It starts [`Unbuilt`] from
//! its channel description; [`Instrument::build`] lays out the wavelength
//! bins, the PSF windows and the optical path, yielding a [`Built`]
//! instrument. A previously built instrument can be restored from an
//! [`InstrumentRecord`] as [`Loaded`]. Only an unbuilt instrument can be
//! built; both built and loaded instruments can propagate light.
//!
//! ```text
//! Unbuilt --build()--> Built --record()--> InstrumentRecord --load()--> Loaded
//! ```

pub mod photometer;
pub mod spectrometer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algo::misc::{interp_fill, logspace, InterpError};
use crate::algo::spline::SplineError;
use crate::config::{ChannelConfig, ChannelKind, CommonConfig, ElementConfig, PayloadConfig, QeConfig};
use crate::optics::diffuse::{convolve_with_slit, integrate_light, prepare, DiffuseError};
use crate::optics::path::{OpticalPath, PathError, PathProducts};
use crate::optics::psf::{BinnedPsf, PsfError};
use crate::io::{OutputError, OutputGroup};
use crate::photometry::quantum_efficiency::{QuantumEfficiency, QuantumEfficiencyError, NATIVE_GRID_POINTS};
use crate::photometry::signal::{Signal, SignalError};
use crate::table::{columns, ChannelTable, TableError};
use crate::target::Target;

pub use photometer::PhotometerGeometry;
pub use spectrometer::SpectralGeometry;

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("{0}: wavelength solution not indicated")]
    MissingWavelengthSolution(String),
    #[error("{channel}: resolving power '{value}' is not supported")]
    UnsupportedResolvingPower { channel: String, value: String },
    #[error("{channel}: invalid resolving power: {reason}")]
    InvalidResolvingPower { channel: String, reason: String },
    #[error("{channel}: band [{wl_min}, {wl_max}] µm must satisfy 0 < wl_min < wl_max")]
    InvalidBand { channel: String, wl_min: f64, wl_max: f64 },
    #[error("{0}: at least one wavelength bin is required")]
    NoBins(String),
    #[error("{0}: aperture needs a radius or an encircled energy")]
    MissingAperture(String),
    #[error("{0}: no detector pixel falls inside the channel band")]
    EmptyPixelGrid(String),
    #[error("{0}: built geometry does not match the channel class")]
    GeometryMismatch(String),
    #[error(transparent)]
    QuantumEfficiency(#[from] QuantumEfficiencyError),
    #[error(transparent)]
    Psf(#[from] PsfError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Diffuse(#[from] DiffuseError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Interp(#[from] InterpError),
    #[error(transparent)]
    Spline(#[from] SplineError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Kind-specific geometry kept from the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelGeometry {
    Photometer(PhotometerGeometry),
    Spectrometer(SpectralGeometry),
}

/// Wavelength bins, QE and geometry produced by a kind-specific builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLayout {
    pub table: ChannelTable,
    /// QE on the detector-native grid
    pub qe: Signal,
    pub geometry: ChannelGeometry,
}

/// Everything needed to propagate light through a built channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltChannel {
    pub table: ChannelTable,
    /// QE on the detector-native grid
    pub qe: Signal,
    /// Total channel transmission on the optical path grid
    pub transmission: Signal,
    pub geometry: ChannelGeometry,
    /// Width in µm of a slit in the optical path
    pub slit_width: Option<f64>,
    pub optical_path: Option<PathProducts>,
}

/// Serialisable form of a built instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub description: ChannelConfig,
    pub common: CommonConfig,
    pub built: BuiltChannel,
}

#[derive(Debug, Clone)]
pub struct Unbuilt {
    common_optics: Vec<ElementConfig>,
}

#[derive(Debug, Clone)]
pub struct Built(BuiltChannel);

#[derive(Debug, Clone)]
pub struct Loaded(BuiltChannel);

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Built {}
    impl Sealed for super::Loaded {}
}

/// States that hold a complete [`BuiltChannel`].
pub trait Ready: sealed::Sealed {
    fn built(&self) -> &BuiltChannel;
}

impl Ready for Built {
    fn built(&self) -> &BuiltChannel {
        &self.0
    }
}

impl Ready for Loaded {
    fn built(&self) -> &BuiltChannel {
        &self.0
    }
}

/// A payload channel.
#[derive(Debug, Clone)]
pub struct Instrument<S> {
    description: ChannelConfig,
    common: CommonConfig,
    state: S,
}

impl<S> Instrument<S> {
    pub fn name(&self) -> &str {
        &self.description.name
    }

    pub fn description(&self) -> &ChannelConfig {
        &self.description
    }

    pub fn common(&self) -> &CommonConfig {
        &self.common
    }
}

impl Instrument<Unbuilt> {
    pub fn new(description: ChannelConfig, payload: &PayloadConfig) -> Self {
        log::debug!("{} initialized", description.name);
        Self {
            description,
            common: payload.common.clone(),
            state: Unbuilt {
                common_optics: payload.optics.clone(),
            },
        }
    }

    /// Lay out the wavelength bins and windows, then build the optical path.
    pub fn build(self) -> Result<Instrument<Built>, InstrumentError> {
        log::info!("building {}", self.description.name);
        let (wl_min, wl_max) = (self.description.wl_min, self.description.wl_max);
        if !(wl_min > 0.0 && wl_max > wl_min && wl_max.is_finite()) {
            return Err(InstrumentError::InvalidBand {
                channel: self.description.name.clone(),
                wl_min,
                wl_max,
            });
        }
        let layout = match &self.description.kind {
            ChannelKind::Photometer(config) => photometer::build(&self.description, config)?,
            ChannelKind::Spectrometer(config) => spectrometer::build(&self.description, config)?,
        };
        let built = build_optical_path(&self.description, &self.common, &self.state.common_optics, layout)?;
        Ok(Instrument {
            description: self.description,
            common: self.common,
            state: Built(built),
        })
    }
}

impl Instrument<Loaded> {
    /// Restore a previously built instrument.
    pub fn load(record: InstrumentRecord) -> Self {
        log::info!("{} loaded", record.description.name);
        Self {
            description: record.description,
            common: record.common,
            state: Loaded(record.built),
        }
    }
}

impl<S: Ready> Instrument<S> {
    pub fn built(&self) -> &BuiltChannel {
        self.state.built()
    }

    pub fn table(&self) -> &ChannelTable {
        &self.state.built().table
    }

    pub fn record(&self) -> InstrumentRecord {
        InstrumentRecord {
            description: self.description.clone(),
            common: self.common.clone(),
            built: self.state.built().clone(),
        }
    }

    /// Store the channel table, description and built products under a group
    /// named after the channel.
    pub fn write<O: OutputGroup>(&self, output: &mut O) -> Result<(), InstrumentError> {
        let built = self.state.built();
        let group = output.create_group(self.name())?;
        group.write_table(self.name(), &built.table)?;
        group.write_value("description", &self.description)?;

        let built_group = group.create_group("built_instr")?;
        built_group.write_array("qe_wl", &built.qe.wl_grid)?;
        built_group.write_array("qe", &built.qe.data)?;
        built_group.write_array("transmission_wl", &built.transmission.wl_grid)?;
        built_group.write_array("transmission", &built.transmission.data)?;
        if let Some(width) = built.slit_width {
            built_group.write_array("slit_width", &[width])?;
        }
        built_group.write_value("geometry", &built.geometry)?;
        if let Some(path) = &built.optical_path {
            let path_group = built_group.create_group("optical_path")?;
            path_group.write_table("transmission_table", &path.transmission_table)?;
            path_group.write_table("radiance_table", &path.radiance_table)?;
            path_group.write_table("signal_table", &path.signal_table)?;
            path_group.write_table("max_signal_per_pixel", &path.max_signal_per_pixel)?;
        }
        log::info!("{} saved", self.name());
        Ok(())
    }

    /// Point-source signal columns for `target`.
    pub fn propagate_target(&self, target: &Target) -> Result<ChannelTable, InstrumentError> {
        let built = self.state.built();
        let efficiency = self.efficiency(target)?;
        let mut out = match (&built.geometry, &self.description.kind) {
            (ChannelGeometry::Photometer(geometry), ChannelKind::Photometer(config)) => {
                photometer::propagate_target(config, &self.common, built, geometry, target, &efficiency)?
            }
            (ChannelGeometry::Spectrometer(geometry), ChannelKind::Spectrometer(_)) => {
                spectrometer::propagate_target(built, geometry, target, &efficiency, self.common.telescope_area)?
            }
            _ => return Err(InstrumentError::GeometryMismatch(self.name().to_string())),
        };
        if let Some(sky) = &efficiency.sky_tr {
            out.set_column(columns::SKY_TR, sky.clone())?;
        }
        Ok(out)
    }

    /// Signal of every diffuse foreground of `target`.
    ///
    /// Foregrounds are walked from the last registered to the first; each
    /// one is attenuated by the channel and by every foreground registered
    /// after it.
    pub fn propagate_diffuse_foreground(&self, target: &Target) -> Result<ChannelTable, InstrumentError> {
        log::debug!("diffuse foreground propagation in {}", self.name());
        let built = self.state.built();
        let ctx = prepare(&self.description, built)?;
        let mut out = ChannelTable::new(self.name());
        let mut attenuation = ctx.transmission.clone();

        for foreground in target.foregrounds.iter().rev() {
            log::debug!("propagating {}", foreground.name);
            let transmission = attenuation.spectral_rebin(&foreground.radiance.wl_grid);
            let mut radiance = foreground.radiance.clone();
            radiance.scale_by(&transmission.data);

            let (max_signal, signal) = match &ctx.slit {
                Some(slit) => convolve_with_slit(&ctx, slit, &radiance)?,
                None => integrate_light(&ctx.photon_rate(&radiance, ctx.omega_pix), &ctx.window_size),
            };
            out.set_column(&format!("{}_signal", foreground.name), signal)?;
            out.set_column(&format!("{}_MaxSignal_inPixel", foreground.name), max_signal)?;

            if let Some(own) = &foreground.transmission {
                attenuation.scale_by(&own.interp(&attenuation.wl_grid, 1.0)?);
                log::debug!("added {} transmission", foreground.name);
            }
        }
        Ok(out)
    }

    fn efficiency(&self, target: &Target) -> Result<Efficiency, InstrumentError> {
        let built = self.state.built();
        let wl = &target.sed.wl_grid;
        let qe = built.qe.spectral_rebin(wl).data;
        let mut transmission = built.transmission.spectral_rebin(wl).data;

        let sky_tr = match &target.sky_transmission {
            Some(sky) => {
                let binned = bin_transmission(
                    &self.description,
                    &self.common,
                    &built.table,
                    &sky.wl_grid,
                    &sky.data,
                )?;
                let on_sed = sky.spectral_rebin(wl);
                transmission
                    .iter_mut()
                    .zip(&on_sed.data)
                    .for_each(|(t, s)| *t *= s);
                Some(binned.per_bin)
            }
            None => None,
        };

        let mut window = vec![1.0; wl.len()];
        if self.common.force_channel_wl_edge {
            log::debug!("force channel wl edge enabled");
            for ((w, t), &x) in window.iter_mut().zip(transmission.iter_mut()).zip(wl) {
                if x < self.description.wl_min || x > self.description.wl_max {
                    *w = 0.0;
                    *t = 0.0;
                }
            }
        }

        Ok(Efficiency {
            qe,
            transmission,
            window,
            sky_tr,
        })
    }
}

/// QE, transmission and spectral window sampled on a target SED grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Efficiency {
    pub qe: Vec<f64>,
    pub transmission: Vec<f64>,
    /// 0 outside the channel band when channel edges are forced, else 1
    pub window: Vec<f64>,
    /// Sky transmission per bin
    pub sky_tr: Option<Vec<f64>>,
}

struct BinnedTransmission {
    per_bin: Vec<f64>,
    curve: Signal,
}

/// Transmission at every bin centre, plus the (possibly edge-forced) curve.
fn bin_transmission(
    description: &ChannelConfig,
    common: &CommonConfig,
    table: &ChannelTable,
    wl: &[f64],
    data: &[f64],
) -> Result<BinnedTransmission, InstrumentError> {
    let centres = table.require(columns::WAVELENGTH)?;
    let mut per_bin = interp_fill(centres, wl, data, 0.0)?;
    let mut curve = Signal::new(wl.to_vec(), data.to_vec())?;

    if common.force_channel_wl_edge {
        let outside = |x: f64| x < description.wl_min || x > description.wl_max;
        for (t, &x) in per_bin.iter_mut().zip(centres) {
            if outside(x) {
                *t = 0.0;
            }
        }
        for (t, &x) in curve.data.iter_mut().zip(&curve.wl_grid) {
            if outside(x) {
                *t = 0.0;
            }
        }
    }
    log::debug!("transmission in channel: {per_bin:?}");
    Ok(BinnedTransmission { per_bin, curve })
}

/// QE curve of a detector on its native grid.
fn detector_qe(description: &ChannelConfig) -> Result<QuantumEfficiency, InstrumentError> {
    let detector = &description.detector;
    let qe = match &detector.qe {
        QeConfig::Constant(value) => {
            QuantumEfficiency::from_constant(detector.wl_min, detector.cut_off, *value)?
        }
        QeConfig::Table { wavelength, qe } => {
            log::debug!("{}: tabulated QE", description.name);
            QuantumEfficiency::from_table(detector.wl_min, detector.cut_off, wavelength, qe)?
        }
    };
    Ok(qe)
}

/// Bin columns shared by both instrument kinds.
fn bin_table(name: &str, edges: &[f64]) -> Result<ChannelTable, InstrumentError> {
    if edges.len() < 2 {
        return Err(InstrumentError::NoBins(name.to_string()));
    }
    let left: Vec<f64> = edges[..edges.len() - 1].to_vec();
    let right: Vec<f64> = edges[1..].to_vec();
    let centre = left.iter().zip(&right).map(|(l, r)| 0.5 * (l + r)).collect();
    let width = left.iter().zip(&right).map(|(l, r)| r - l).collect();

    let mut table = ChannelTable::new(name);
    table.set_column(columns::WAVELENGTH, centre)?;
    table.set_column(columns::BANDWIDTH, width)?;
    table.set_column(columns::LEFT_BIN_EDGE, left)?;
    table.set_column(columns::RIGHT_BIN_EDGE, right)?;
    log::debug!("{name} wavelength table: {} bins", table.len());
    Ok(table)
}

/// Compose the common and channel optics, chain them and add the
/// instrument self-emission to the channel table.
fn build_optical_path(
    description: &ChannelConfig,
    common: &CommonConfig,
    common_optics: &[ElementConfig],
    layout: ChannelLayout,
) -> Result<BuiltChannel, InstrumentError> {
    log::info!("building optical path");
    let detector = &description.detector;
    let wl_grid = logspace(detector.wl_min, detector.cut_off, NATIVE_GRID_POINTS);

    let common_path = OpticalPath::new(common_optics, wl_grid.clone(), detector)?;
    let mut path = OpticalPath::new(&description.optics, wl_grid, detector)?;
    path.prepend(common_path)?;

    let total = path.total_transmission();
    let BinnedTransmission { per_bin, curve } =
        bin_transmission(description, common, &layout.table, path.wl(), &total)?;
    let mut table = layout.table;
    table.set_column(columns::TR, per_bin)?;

    path.chain();
    let slit_width = path.slit_width();
    if let Some(width) = slit_width {
        log::debug!("slit of {width} µm in the optical path");
    }

    let mut built = BuiltChannel {
        table,
        qe: layout.qe,
        transmission: curve,
        geometry: layout.geometry,
        slit_width,
        optical_path: None,
    };
    let ctx = prepare(description, &built)?;
    path.compute_signal(&mut built.table, &ctx)?;
    built.optical_path = Some(path.products()?);
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_table_contiguous() {
        let table = bin_table("Spec", &[1.0, 1.5, 2.5]).unwrap();
        assert_eq!(table.column(columns::WAVELENGTH), Some(&[1.25, 2.0][..]));
        assert_eq!(table.column(columns::BANDWIDTH), Some(&[0.5, 1.0][..]));
        assert_eq!(table.column(columns::RIGHT_BIN_EDGE).unwrap()[0], table.column(columns::LEFT_BIN_EDGE).unwrap()[1]);
    }

    #[test]
    fn test_bin_table_needs_two_edges() {
        assert!(matches!(bin_table("Spec", &[1.0]), Err(InstrumentError::NoBins(_))));
    }
}
