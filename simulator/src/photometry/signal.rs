//! Wavelength-sampled curves and spectral rebinning.
//!
//! A [`Signal`] pairs a wavelength grid (µm) with one value per sample. It is
//! the common currency between optical elements, radiance tables, QE curves,
//! foregrounds and target SEDs. Units of the data are implied by context.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algo::misc::{interp_fill, sorted_table, InterpError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignalError {
    #[error("wavelength grid has {grid} samples but data has {data}")]
    MismatchedLengths { grid: usize, data: usize },
    #[error("interpolation failed: {0}")]
    Interp(#[from] InterpError),
}

/// A curve sampled on a wavelength grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Wavelength grid in µm
    pub wl_grid: Vec<f64>,
    /// One value per wavelength sample
    pub data: Vec<f64>,
}

impl Signal {
    pub fn new(wl_grid: Vec<f64>, data: Vec<f64>) -> Result<Self, SignalError> {
        if wl_grid.len() != data.len() {
            return Err(SignalError::MismatchedLengths {
                grid: wl_grid.len(),
                data: data.len(),
            });
        }
        Ok(Self { wl_grid, data })
    }

    /// Constant curve over the given grid.
    pub fn constant(wl_grid: Vec<f64>, value: f64) -> Self {
        let data = vec![value; wl_grid.len()];
        Self { wl_grid, data }
    }

    pub fn len(&self) -> usize {
        self.wl_grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wl_grid.is_empty()
    }

    /// Linear interpolation at `wl`, `fill` outside the sampled range.
    pub fn interp(&self, wl: &[f64], fill: f64) -> Result<Vec<f64>, SignalError> {
        Ok(interp_fill(wl, &self.wl_grid, &self.data, fill)?)
    }

    /// Resample onto `new_grid`, averaging when the new grid is coarser.
    pub fn spectral_rebin(&self, new_grid: &[f64]) -> Signal {
        Signal {
            wl_grid: new_grid.to_vec(),
            data: rebin(new_grid, &self.wl_grid, &self.data),
        }
    }

    /// Multiply sample-wise by another curve defined on the same grid.
    pub fn scale_by(&mut self, other: &[f64]) {
        self.data.iter_mut().zip(other).for_each(|(d, o)| *d *= o);
    }
}

/// Resample `fp(xp)` onto the sorted grid `x`.
///
/// Source samples outside (0.9·min x, 1.1·max x) are discarded. When the
/// coarsest source spacing is finer than the finest target spacing the
/// samples are averaged into bins centred on `x`; otherwise the curve is
/// linearly interpolated with zero fill. Empty bins come out as zero.
pub fn rebin(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (sel_x, sel_f): (Vec<f64>, Vec<f64>) = xp
        .iter()
        .zip(fp)
        .filter(|(&v, _)| v > 0.9 * x_min && v < 1.1 * x_max)
        .map(|(&v, &f)| (v, f))
        .unzip();

    let (xp, fp) = match sorted_table(&sel_x, &sel_f) {
        Ok(table) => table,
        Err(_) => {
            log::debug!("rebin: fewer than two source samples in range, returning zeros");
            return vec![0.0; x.len()];
        }
    };

    let max_dxp = xp.windows(2).map(|w| w[1] - w[0]).fold(0.0, f64::max);
    let min_dx = x
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);

    let out = if x.len() > 1 && max_dxp < min_dx {
        log::debug!("rebin: binning");
        bin_mean(x, &xp, &fp)
    } else {
        log::debug!("rebin: interpolating");
        // sorted_table already validated the source table
        interp_fill(x, &xp, &fp, 0.0).unwrap_or_else(|_| vec![0.0; x.len()])
    };

    out.into_iter()
        .map(|v| if v.is_nan() { 0.0 } else { v })
        .collect()
}

fn bin_mean(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mids: Vec<f64> = x.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
    let mut edges = Vec::with_capacity(n + 1);
    edges.push(x[0] - (mids[0] - x[0]) / 2.0);
    edges.extend_from_slice(&mids);
    edges.push(x[n - 1] + (x[n - 1] - mids[n - 2]) / 2.0);

    let mut sums = vec![0.0; n];
    let mut counts = vec![0usize; n];
    let last_edge = edges[n];
    for (&v, &f) in xp.iter().zip(fp) {
        if v < edges[0] || v > last_edge {
            continue;
        }
        // Right-most edge is inclusive
        let bin = match edges.partition_point(|&e| e <= v) {
            0 => continue,
            i if i > n => n - 1,
            i => i - 1,
        };
        sums[bin] += f;
        counts[bin] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .map(|(s, c)| if c == 0 { f64::NAN } else { s / c as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::misc::linspace;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_rejects_mismatch() {
        assert_eq!(
            Signal::new(vec![1.0, 2.0], vec![1.0]),
            Err(SignalError::MismatchedLengths { grid: 2, data: 1 })
        );
    }

    #[test]
    fn test_rebin_interpolates_on_finer_grid() {
        let xp = vec![1.0, 2.0, 3.0];
        let fp = vec![1.0, 2.0, 3.0];
        let x = linspace(1.0, 3.0, 11);
        let out = rebin(&x, &xp, &fp);
        for (xv, yv) in x.iter().zip(&out) {
            assert_relative_eq!(*yv, *xv, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rebin_averages_on_coarser_grid() {
        let xp = linspace(0.5, 2.5, 2001);
        let fp: Vec<f64> = xp.iter().map(|v| 2.0 * v).collect();
        let x = vec![1.0, 1.5, 2.0];
        let out = rebin(&x, &xp, &fp);
        // linear function: bin mean equals value at bin centre
        assert_relative_eq!(out[1], 3.0, epsilon = 5e-3);
    }

    #[test]
    fn test_rebin_zero_outside_source() {
        let out = rebin(&[1.0, 5.0, 10.0], &[0.95, 1.0, 1.05], &[1.0, 1.0, 1.0]);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 0.0);
    }
}
