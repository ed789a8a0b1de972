//! Point spread and pixel response functions.
//!
//! The diffraction-limited PSF of a circular pupil is the Airy pattern,
//! sampled here on a fixed 256×256 grid spanning ±4 λF. Binning it onto the
//! detector means convolving with the pixel footprint expressed in PSF
//! samples; the result is the pixel response function (PRF), whose value at
//! any sample is the fraction of the source energy a pixel centred there
//! would collect.

use ndarray::Array2;
use once_cell::sync::Lazy;
use scilib::math::bessel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algo::convolve::{convolve2d_separable, ConvolveOptions};
use crate::algo::misc::linspace;

/// Samples per side of the Airy grid
const AIRY_SAMPLES: usize = 256;
/// Half-width of the Airy grid in λF units
const AIRY_HALF_WIDTH: f64 = 4.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PsfError {
    #[error("PSF image is empty or ragged")]
    InvalidImage,
    #[error("PSF image has no positive energy")]
    NoEnergy,
    #[error("encircled energy {0} is outside (0, 1]")]
    InvalidEncircledEnergy(f64),
}

/// Normalised Airy pattern on x, y ∈ [-4, 4] λF.
static AIRY_IMAGE: Lazy<Array2<f64>> = Lazy::new(|| {
    let x = linspace(-AIRY_HALF_WIDTH, AIRY_HALF_WIDTH, AIRY_SAMPLES);
    let mut ima = Array2::from_shape_fn((AIRY_SAMPLES, AIRY_SAMPLES), |(i, j)| {
        let r = std::f64::consts::PI * (x[j] * x[j] + x[i] * x[i]).sqrt() + 1.0e-10;
        let j1 = bessel::j_n(1, r);
        (2.0 * j1 / r).powi(2)
    });
    let total = ima.sum();
    ima /= total;
    ima
});

/// Spacing of the Airy grid in λF units.
pub fn airy_sampling() -> f64 {
    2.0 * AIRY_HALF_WIDTH / (AIRY_SAMPLES - 1) as f64
}

/// A PSF binned onto the detector pixel grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedPsf {
    /// Pixel response function on the PSF sample grid
    pub prf: Array2<f64>,
    /// Pixel footprint kernel in PSF samples
    pub kernel: Array2<f64>,
    /// (x_min, x_max, y_min, y_max) of the sample grid in µm
    pub extent: [f64; 4],
    /// PSF samples per aperture radius unit
    pub samples_per_unit: f64,
}

impl BinnedPsf {
    /// Peak of the PRF: the largest fraction of the source one pixel collects.
    pub fn peak(&self) -> f64 {
        self.prf.iter().copied().fold(0.0, f64::max)
    }

    /// Ratio of the brightest PRF column (summed along y) to the brightest
    /// column of the pixel kernel.
    pub fn column_gain(&self) -> f64 {
        let prf_peak = self.prf.sum_axis(ndarray::Axis(0)).iter().copied().fold(0.0, f64::max);
        let kernel_peak = self
            .kernel
            .sum_axis(ndarray::Axis(0))
            .iter()
            .copied()
            .fold(0.0, f64::max);
        if kernel_peak > 0.0 {
            prf_peak / kernel_peak
        } else {
            0.0
        }
    }
}

/// Fractional-pixel kernel factor along one axis.
///
/// `k` PSF samples per pixel give `floor(k)` full samples bracketed by two
/// half-weighted fractional samples.
fn pixel_kernel_1d(k: f64) -> Vec<f64> {
    let ik = k.trunc() as usize;
    let fk = k.fract();
    let mut kernel = vec![1.0; ik + 2];
    kernel[0] = 0.5 * fk;
    kernel[ik + 1] = 0.5 * fk;
    kernel
}

/// Airy PSF for a channel, binned onto pixels of pitch `delta_pix`.
///
/// # Arguments
/// * `f_num_x`, `f_num_y` - Channel F-numbers
/// * `wl` - Wavelength in µm
/// * `delta_pix` - Pixel pitch in µm
pub fn binned_airy_psf(f_num_x: f64, f_num_y: f64, wl: f64, delta_pix: f64) -> BinnedPsf {
    let dx = airy_sampling();
    let k_x = delta_pix / (f_num_x * wl * dx);
    let k_y = delta_pix / (f_num_y * wl * dx);
    let kx = pixel_kernel_1d(k_x);
    let ky = pixel_kernel_1d(k_y);
    log::debug!("pixel kernel {}x{} samples at {} µm", ky.len(), kx.len(), wl);

    let prf = convolve2d_separable(&AIRY_IMAGE, &ky, &kx, ConvolveOptions::default());
    let kernel = Array2::from_shape_fn((ky.len(), kx.len()), |(i, j)| ky[i] * kx[j]);

    let half = (AIRY_SAMPLES / 2) as f64;
    let extent = [
        -half * f_num_x * wl * dx,
        half * f_num_x * wl * dx,
        -half * f_num_y * wl * dx,
        half * f_num_y * wl * dx,
    ];

    BinnedPsf {
        prf,
        kernel,
        extent,
        samples_per_unit: 1.0 / dx,
    }
}

/// PSF already sampled at the detector pixel pitch.
///
/// The image is normalised to unit sum; the kernel is a single pixel.
pub fn pixel_based_psf(image: &[Vec<f64>], delta_pix: f64) -> Result<BinnedPsf, PsfError> {
    let rows = image.len();
    let cols = image.first().map(Vec::len).unwrap_or(0);
    if rows == 0 || cols == 0 || image.iter().any(|r| r.len() != cols) {
        return Err(PsfError::InvalidImage);
    }
    let mut prf = Array2::from_shape_fn((rows, cols), |(i, j)| image[i][j]);
    let total = prf.sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(PsfError::NoEnergy);
    }
    prf /= total;

    let extent = [
        -(cols as f64) / 2.0 * delta_pix,
        cols as f64 / 2.0 * delta_pix,
        -(rows as f64) / 2.0 * delta_pix,
        rows as f64 / 2.0 * delta_pix,
    ];
    Ok(BinnedPsf {
        prf,
        kernel: Array2::ones((1, 1)),
        extent,
        samples_per_unit: 1.0,
    })
}

/// Fraction of the image energy within `radius` samples of the image centre.
pub fn encircled_energy(ima: &Array2<f64>, radius: f64) -> f64 {
    let (rows, cols) = ima.dim();
    let yc = (rows as f64 - 1.0) / 2.0;
    let xc = (cols as f64 - 1.0) / 2.0;
    let total = ima.sum();
    if total <= 0.0 {
        return 0.0;
    }
    let inside: f64 = ima
        .indexed_iter()
        .filter(|((i, j), _)| {
            let dy = *i as f64 - yc;
            let dx = *j as f64 - xc;
            (dx * dx + dy * dy).sqrt() <= radius
        })
        .map(|(_, v)| *v)
        .sum();
    inside / total
}

/// Smallest aperture radius enclosing the fraction `eec` of the energy.
///
/// Samples are visited outward from the image centre, accumulating energy;
/// the radius is linearly interpolated between the two samples bracketing
/// the target fraction.
///
/// # Arguments
/// * `ima` - PSF or PRF image
/// * `eec` - Target encircled energy in (0, 1]
/// * `samples_per_unit` - Image samples per unit of the returned radius
pub fn find_aperture_radius(
    ima: &Array2<f64>,
    eec: f64,
    samples_per_unit: f64,
) -> Result<f64, PsfError> {
    if !(eec > 0.0 && eec <= 1.0) {
        return Err(PsfError::InvalidEncircledEnergy(eec));
    }
    let total = ima.sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(PsfError::NoEnergy);
    }

    let (rows, cols) = ima.dim();
    let yc = (rows as f64 - 1.0) / 2.0;
    let xc = (cols as f64 - 1.0) / 2.0;
    let mut samples: Vec<(f64, f64)> = ima
        .indexed_iter()
        .map(|((i, j), v)| {
            let dy = i as f64 - yc;
            let dx = j as f64 - xc;
            ((dx * dx + dy * dy).sqrt(), *v / total)
        })
        .collect();
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (mut prev_r, mut prev_e) = (0.0, 0.0);
    let mut cumulative = 0.0;
    for (r, e) in samples {
        cumulative += e;
        if cumulative >= eec {
            let radius = if cumulative > prev_e && r > prev_r {
                prev_r + (eec - prev_e) / (cumulative - prev_e) * (r - prev_r)
            } else {
                r
            };
            return Ok(radius / samples_per_unit);
        }
        prev_r = r;
        prev_e = cumulative;
    }
    // Rounding can leave the final cumulative sum a hair below 1
    Ok(prev_r / samples_per_unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_airy_image_normalised() {
        assert_relative_eq!(AIRY_IMAGE.sum(), 1.0, epsilon = 1e-12);
        let peak = AIRY_IMAGE.iter().copied().fold(0.0, f64::max);
        assert!(peak > 0.0);
    }

    #[test]
    fn test_pixel_kernel_shape() {
        let k = pixel_kernel_1d(3.4);
        assert_eq!(k.len(), 5);
        assert_relative_eq!(k[0], 0.2, epsilon = 1e-12);
        assert_relative_eq!(k.iter().sum::<f64>(), 3.4, epsilon = 1e-12);
    }

    #[test]
    fn test_binned_psf_peak_fraction() {
        // 2 λF pixels collect most of the core
        let psf = binned_airy_psf(10.0, 10.0, 1.0, 20.0);
        let peak = psf.peak();
        assert!(peak > 0.4 && peak < 1.0, "peak = {peak}");
        assert_eq!(psf.prf.dim(), (256, 256));
        assert_relative_eq!(psf.extent[1], 128.0 * 10.0 * airy_sampling(), epsilon = 1e-9);
    }

    #[test]
    fn test_airy_half_energy_radius() {
        // Half of the (truncated) Airy energy lies within ~0.52 λF
        let r = find_aperture_radius(&AIRY_IMAGE, 0.5, 1.0 / airy_sampling()).unwrap();
        assert_relative_eq!(r, 0.52, epsilon = 0.03);
    }

    #[test]
    fn test_find_radius_consistent_with_encircled_energy() {
        let psf = binned_airy_psf(8.0, 8.0, 2.0, 15.0);
        let r = find_aperture_radius(&psf.prf, 0.7, 1.0).unwrap();
        let ee = encircled_energy(&psf.prf, r);
        assert_relative_eq!(ee, 0.7, epsilon = 0.01);
    }

    #[test]
    fn test_pixel_based_psf() {
        let image = vec![vec![0.0, 1.0, 0.0], vec![1.0, 4.0, 1.0], vec![0.0, 1.0, 0.0]];
        let psf = pixel_based_psf(&image, 10.0).unwrap();
        assert_relative_eq!(psf.peak(), 0.5);
        assert_eq!(psf.kernel.dim(), (1, 1));
        // centre pixel alone holds half the energy
        assert_relative_eq!(find_aperture_radius(&psf.prf, 0.5, 1.0).unwrap(), 0.0);
        assert!(pixel_based_psf(&[vec![1.0], vec![]], 10.0).is_err());
    }

    #[test]
    fn test_invalid_encircled_energy() {
        assert_eq!(
            find_aperture_radius(&AIRY_IMAGE, 1.5, 1.0),
            Err(PsfError::InvalidEncircledEnergy(1.5))
        );
    }
}
