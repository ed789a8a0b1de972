//! Single-band photometric channels.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{bin_table, detector_qe, BuiltChannel, ChannelGeometry, ChannelLayout, Efficiency, InstrumentError};
use crate::algo::trapezoid::trap_integrate;
use crate::config::{ChannelConfig, CommonConfig, PhotometerConfig, PsfConfig};
use crate::optics::psf::{binned_airy_psf, find_aperture_radius, pixel_based_psf, BinnedPsf};
use crate::table::{columns, ChannelTable};
use crate::target::Target;
use crate::units::photons_per_joule;

/// PSF and aperture of a photometer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometerGeometry {
    pub psf: BinnedPsf,
    /// Aperture radius in λF units (pixels for pixel-based PSFs)
    pub aperture_radius: f64,
}

/// One bin spanning the channel band, with the PSF and aperture window.
pub(super) fn build(
    description: &ChannelConfig,
    config: &PhotometerConfig,
) -> Result<ChannelLayout, InstrumentError> {
    let mut table = bin_table(&description.name, &[description.wl_min, description.wl_max])?;
    let wl_c = 0.5 * (description.wl_min + description.wl_max);

    let qe = detector_qe(description)?;
    table.set_column(columns::QE, qe.at(&[wl_c])?)?;

    let delta_pix = description.detector.delta_pix;
    let (psf, pixel_based) = match &config.psf {
        PsfConfig::Airy => (
            binned_airy_psf(description.f_num_x, description.f_num_y, wl_c, delta_pix),
            false,
        ),
        PsfConfig::PixelBased { image } => {
            log::debug!("{}: pixel-based PSF", description.name);
            (pixel_based_psf(image, delta_pix)?, true)
        }
    };

    // a configured radius gives r² pixels; an encircled-energy radius the disc π·r²
    let (aperture_radius, area_factor) = match (config.aperture.radius, config.aperture.ene) {
        (Some(radius), _) => (radius, 1.0),
        (None, Some(ene)) => (find_aperture_radius(&psf.prf, ene, psf.samples_per_unit)?, PI),
        (None, None) => return Err(InstrumentError::MissingAperture(description.name.clone())),
    };
    let window_size = window_size(description, aperture_radius, area_factor, wl_c, pixel_based);
    log::debug!("{}: aperture radius {aperture_radius}, window size {window_size}", description.name);
    table.set_column(columns::WINDOW_SIZE, vec![window_size])?;

    Ok(ChannelLayout {
        table,
        qe: qe.curve().clone(),
        geometry: ChannelGeometry::Photometer(PhotometerGeometry {
            psf,
            aperture_radius,
        }),
    })
}

/// Aperture window in detector pixels. Airy apertures are in λF units and
/// scale with the F-numbers at the band centre.
fn window_size(
    description: &ChannelConfig,
    aperture_radius: f64,
    area_factor: f64,
    wl_c: f64,
    pixel_based: bool,
) -> f64 {
    let area = area_factor * aperture_radius.powi(2);
    if pixel_based {
        area
    } else {
        area * description.f_num_x * wl_c * description.f_num_y * wl_c
            / description.detector.delta_pix.powi(2)
    }
}

/// Band-integrated point-source signal, computed on the SED grid.
pub(super) fn propagate_target(
    config: &PhotometerConfig,
    common: &CommonConfig,
    built: &BuiltChannel,
    geometry: &PhotometerGeometry,
    target: &Target,
    efficiency: &Efficiency,
) -> Result<ChannelTable, InstrumentError> {
    let wl = &target.sed.wl_grid;
    let sed = &target.sed.data;

    let flux_density: Vec<f64> = efficiency.window.iter().zip(sed).map(|(w, s)| w * s).collect();
    let star_flux = trap_integrate(wl, &flux_density);
    log::debug!("star flux: {star_flux}");

    let rate_density: Vec<f64> = wl
        .iter()
        .zip(sed)
        .zip(efficiency.qe.iter().zip(&efficiency.transmission))
        .map(|((&x, s), (q, t))| q * s * t * photons_per_joule(x))
        .collect();
    let star_signal = common.telescope_area * trap_integrate(wl, &rate_density);
    log::debug!("star signal: {star_signal}");

    let in_aperture = match (config.aperture.aperture_correction, config.aperture.ene) {
        (Some(correction), _) => star_signal * correction,
        (None, Some(ene)) => star_signal * ene,
        (None, None) => {
            log::debug!("aperture correction not found");
            star_signal
        }
    };
    let max_in_pixel = geometry.psf.peak() * star_signal;
    log::debug!("star signal in pixel max: {max_in_pixel}");

    let mut out = ChannelTable::new(&built.table.ch_name);
    out.set_column(columns::STAR_FLUX, vec![star_flux])?;
    out.set_column(columns::STAR_SIGNAL, vec![star_signal])?;
    out.set_column(columns::STAR_SIGNAL_IN_APERTURE, vec![in_aperture])?;
    out.set_column(columns::STAR_MAX_SIGNAL, vec![max_in_pixel])?;
    Ok(out)
}
