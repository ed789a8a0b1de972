//! Detector noise budget.
//!
//! Every noise column is expressed per √hour: a signal of S counts/s observed
//! for one hour collects 3600·S counts, so its shot noise in counts/s·√hr is
//! `sqrt(S / 3600)`. The total noise is then divided by the in-aperture
//! signal, giving a relative noise that scales as 1/√t with exposure time.

use thiserror::Error;

use crate::config::{ChannelConfig, CommonConfig, CustomNoiseConfig, DetectorConfig};
use crate::photometry::signal::Signal;
use crate::table::{columns, ChannelTable, TableError};
use crate::units::SI;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NoiseError {
    #[error("{0}: detector needs either frame_time or f_well_depth")]
    MissingFrameTime(String),
    #[error("custom noise '{name}': {reason}")]
    InvalidCustomNoise { name: String, reason: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Up-the-ramp sampling factors applied to the read and shot noise variances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiaccumGain {
    /// Non-destructive reads per frame, at least 2
    pub n_read: f64,
    pub read_gain: f64,
    pub shot_gain: f64,
}

/// Saturation time of every bin and the frame time shared by the channel.
///
/// An explicit detector frame time wins; otherwise the frame time is the
/// well-depth fraction of the shortest saturation time, so the brightest
/// pixel of the channel sets the cadence.
pub fn frame_time(
    channel: &str,
    detector: &DetectorConfig,
    max_signal: &[f64],
) -> Result<(Vec<f64>, f64), NoiseError> {
    let saturation: Vec<f64> = max_signal.iter().map(|s| detector.well_depth / s).collect();
    log::debug!("saturation time: {saturation:?}");

    let t_frame = match (detector.frame_time, detector.f_well_depth) {
        (Some(t), _) => t,
        (None, Some(fraction)) => {
            fraction * saturation.iter().copied().fold(f64::INFINITY, f64::min)
        }
        (None, None) => return Err(NoiseError::MissingFrameTime(channel.to_string())),
    };
    log::debug!("frame time: {t_frame}");
    Ok((saturation, t_frame))
}

/// Read and shot noise gains of a multiaccum ramp of duration `t_frame`.
///
/// Fewer than two reads are forced to correlated double sampling. An
/// infinite frame time takes the limit of infinitely many reads.
pub fn multiaccum(detector: &DetectorConfig, t_frame: f64) -> MultiaccumGain {
    let m = detector.multiaccum_m.unwrap_or(1.0);
    if detector.multiaccum_m.is_some() {
        log::debug!("multiaccum activated: m = {m}");
    }

    if t_frame.is_infinite() {
        log::warn!("infinite frame time, using the many-reads limit of the multiaccum gains");
        return MultiaccumGain {
            n_read: f64::INFINITY,
            read_gain: 0.0,
            shot_gain: 6.0 / 5.0,
        };
    }

    let n_read = (t_frame * detector.freq_ndr).floor().max(2.0);
    let read_gain = 12.0 * (n_read - 1.0) / (n_read.powi(2) + n_read) / m;
    let shot_gain = 6.0 * (n_read.powi(2) + 1.0) / (n_read.powi(2) + n_read) / 5.0;
    log::debug!("read noise gain: {read_gain}, shot noise gain: {shot_gain}");
    MultiaccumGain {
        n_read,
        read_gain,
        shot_gain,
    }
}

/// Shot noise of every signal column, with the summed variance.
///
/// Signal columns are those whose name contains `signal`.
pub fn photon_noise(table: &ChannelTable, shot_gain: f64) -> (Vec<(String, Vec<f64>)>, Vec<f64>) {
    let mut variance = vec![0.0; table.len()];
    let mut noises = Vec::new();
    for column in table.columns().iter().filter(|c| c.name.contains("signal")) {
        let noise: Vec<f64> = column
            .values
            .iter()
            .map(|s| (shot_gain * s / SI::SECONDS_PER_HOUR).sqrt())
            .collect();
        variance
            .iter_mut()
            .zip(&noise)
            .for_each(|(v, n)| *v += n * n);
        log::debug!("{}_noise: {noise:?}", column.name);
        noises.push((format!("{}_noise", column.name), noise));
    }
    (noises, variance)
}

/// Noise columns of one channel of an observed target.
///
/// `table` must hold the window size, the maximum in-pixel signal, the
/// in-aperture star signal and every signal column of the target.
pub fn estimate(
    channel: &ChannelConfig,
    common: &CommonConfig,
    table: &ChannelTable,
) -> Result<ChannelTable, NoiseError> {
    log::info!("estimating noise in {}", channel.name);
    let detector = &channel.detector;
    let mut out = ChannelTable::new(&channel.name);

    let max_signal = table.require(columns::MAX_SIGNAL_IN_PIXEL)?;
    let (saturation, t_frame) = frame_time(&channel.name, detector, max_signal)?;
    out.set_column(columns::SATURATION_TIME, saturation)?;
    out.set_column(columns::FRAME_TIME, vec![t_frame; table.len()])?;

    let gain = multiaccum(detector, t_frame);
    let (noises, photon_variance) = photon_noise(table, gain.shot_gain);
    for (name, noise) in noises {
        out.set_column(&name, noise)?;
    }

    let window = table.require(columns::WINDOW_SIZE)?;
    let dark: Vec<f64> = window
        .iter()
        .map(|w| (gain.shot_gain * w * detector.dark_current / SI::SECONDS_PER_HOUR).sqrt())
        .collect();
    let read: Vec<f64> = window
        .iter()
        .map(|w| {
            (gain.read_gain * detector.read_noise.powi(2) * w / t_frame / SI::SECONDS_PER_HOUR).sqrt()
        })
        .collect();
    log::debug!("dark current noise: {dark:?}");
    log::debug!("read noise: {read:?}");
    log::debug!("NoiseX: {}", channel.noise_x);

    let in_aperture = table.require(columns::STAR_SIGNAL_IN_APERTURE)?;
    let total: Vec<f64> = dark
        .iter()
        .zip(&read)
        .zip(&photon_variance)
        .zip(in_aperture)
        .map(|(((d, r), p), &s)| {
            let signal = if s == 0.0 { f64::NAN } else { s };
            (d * d + (1.0 + channel.noise_x) * p + r * r).sqrt() / signal
        })
        .collect();
    out.set_column(columns::DARK_CURRENT_NOISE, dark)?;
    out.set_column(columns::READ_NOISE, read)?;
    out.set_column(columns::TOTAL_NOISE, total)?;

    let wl = table.require(columns::WAVELENGTH)?;
    if common.custom_noise.is_empty() {
        log::debug!("no custom noise found in common section");
    }
    add_custom_noise(&common.custom_noise, wl, &mut out)?;
    if channel.custom_noise.is_empty() {
        log::debug!("no custom noise found in channel section");
    }
    add_custom_noise(&channel.custom_noise, wl, &mut out)?;

    log::debug!("total noise: {:?}", out.column(columns::TOTAL_NOISE));
    Ok(out)
}

/// Add relative noise terms in quadrature to `total_noise`.
///
/// A constant `value` is in ppm·√hr. A `data` table holds a `Wavelength`
/// column and one noise column, rebinned onto `wl`.
pub fn add_custom_noise(
    custom: &[CustomNoiseConfig],
    wl: &[f64],
    out: &mut ChannelTable,
) -> Result<(), NoiseError> {
    for term in custom {
        let noise = custom_noise_values(term, wl)?;
        log::debug!("{} added as custom noise: {noise:?}", term.name);

        let total: Vec<f64> = out
            .require(columns::TOTAL_NOISE)?
            .iter()
            .zip(&noise)
            .map(|(t, n)| (t * t + n * n).sqrt())
            .collect();
        out.set_column(&format!("{}_noise", term.name), noise)?;
        out.set_column(columns::TOTAL_NOISE, total)?;
    }
    Ok(())
}

fn custom_noise_values(term: &CustomNoiseConfig, wl: &[f64]) -> Result<Vec<f64>, NoiseError> {
    let invalid = |reason: &str| NoiseError::InvalidCustomNoise {
        name: term.name.clone(),
        reason: reason.to_string(),
    };
    match (&term.data, term.value) {
        (Some(data), _) => {
            let wavelength = data
                .column("Wavelength")
                .ok_or_else(|| invalid("data has no Wavelength column"))?;
            let noise_col = data
                .names()
                .find(|n| !n.contains("Wavelength"))
                .and_then(|n| data.column(n))
                .ok_or_else(|| invalid("data has no noise column"))?;
            let curve = Signal::new(wavelength.to_vec(), noise_col.to_vec())
                .map_err(|e| invalid(&e.to_string()))?;
            Ok(curve.spectral_rebin(wl).data)
        }
        (None, Some(value)) => Ok(vec![value * 1e-6; wl.len()]),
        (None, None) => Err(invalid("needs a value or a data table")),
    }
}
