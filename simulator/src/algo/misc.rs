//! Miscellaneous numerical utilities.
//!
//! This module provides the one-dimensional interpolation and grid generation
//! helpers used throughout the radiometric model:
//!
//! - **Linear interpolation**: strict, fill-value and extrapolating variants
//! - **Grid generation**: `linspace`, `logspace` and `arange` in the numpy sense
//!
//! All wavelength grids in this crate are plain `f64` slices in micrometers.

use thiserror::Error;

/// Rejected interpolation tables and queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("{0} lies outside the tabulated range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("interpolation table needs at least 2 samples")]
    InsufficientData,
    #[error("abscissae and ordinates differ in length")]
    MismatchedLengths,
    #[error("abscissae are not strictly increasing")]
    UnsortedData,
}

/// Value of the piecewise-linear curve through `(xs, ys)` at `x`.
///
/// `xs` must already be strictly increasing. Queries outside
/// `[xs[0], xs[n - 1]]` are rejected with [`InterpError::OutOfBounds`];
/// use [`interp_fill`] or [`interp_extrapolate`] for open-ended grids.
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> Result<f64, InterpError> {
    validate(xs, ys)?;
    let (lo, hi) = (xs[0], xs[xs.len() - 1]);
    if !(lo..=hi).contains(&x) {
        return Err(InterpError::OutOfBounds(x, lo, hi));
    }
    Ok(interp_unchecked(x, xs, ys))
}

/// Linear interpolation returning `fill` outside the tabulated range.
///
/// The table does not need to be sorted: it is sorted by abscissa first.
/// NaN queries return `fill`.
pub fn interp_fill(x: &[f64], xs: &[f64], ys: &[f64], fill: f64) -> Result<Vec<f64>, InterpError> {
    let (xs, ys) = sorted_table(xs, ys)?;
    let min_x = xs[0];
    let max_x = xs[xs.len() - 1];

    Ok(x.iter()
        .map(|&v| {
            if v.is_nan() || v < min_x || v > max_x {
                fill
            } else {
                interp_unchecked(v, &xs, &ys)
            }
        })
        .collect())
}

/// Linear interpolation that extrapolates the first and last segment
/// outside the tabulated range.
pub fn interp_extrapolate(x: &[f64], xs: &[f64], ys: &[f64]) -> Result<Vec<f64>, InterpError> {
    let (xs, ys) = sorted_table(xs, ys)?;
    let n = xs.len();

    Ok(x.iter()
        .map(|&v| {
            let (i1, i2) = if v <= xs[0] {
                (0, 1)
            } else if v >= xs[n - 1] {
                (n - 2, n - 1)
            } else {
                return interp_unchecked(v, &xs, &ys);
            };
            let t = (v - xs[i1]) / (xs[i2] - xs[i1]);
            ys[i1] + t * (ys[i2] - ys[i1])
        })
        .collect())
}

fn validate(xs: &[f64], ys: &[f64]) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    if xs.windows(2).any(|w| w[1] <= w[0]) {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Sort a table by abscissa and drop repeated abscissae (first one wins).
pub fn sorted_table(xs: &[f64], ys: &[f64]) -> Result<(Vec<f64>, Vec<f64>), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }

    let mut pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, _)| !x.is_nan())
        .map(|(&x, &y)| (x, y))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    pairs.dedup_by(|b, a| a.0 == b.0);

    if pairs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }

    Ok(pairs.into_iter().unzip())
}

// Caller guarantees xs sorted, len >= 2 and x within range.
fn interp_unchecked(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let idx = match xs.binary_search_by(|probe| probe.total_cmp(&x)) {
        Ok(exact_idx) => return ys[exact_idx],
        Err(insert_idx) => insert_idx.clamp(1, xs.len() - 1),
    };

    let i1 = idx - 1;
    let i2 = idx;

    let x1 = xs[i1];
    let x2 = xs[i2];
    let y1 = ys[i1];
    let y2 = ys[i2];

    let t = (x - x1) / (x2 - x1);
    y1 + t * (y2 - y1)
}

/// `n` evenly spaced samples over the closed interval [start, stop].
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// `n` samples evenly spaced in log10 between `start` and `stop` (both > 0).
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    linspace(start.log10(), stop.log10(), n)
        .into_iter()
        .map(|e| 10f64.powf(e))
        .collect()
}

/// Half-open range [start, stop) with the given step, as numpy's `arange`.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interp_basic() {
        let xs = vec![0.0, 1.0, 2.0];
        let ys = vec![0.0, 10.0, 30.0];
        assert_relative_eq!(interp(0.5, &xs, &ys).unwrap(), 5.0);
        assert_relative_eq!(interp(1.5, &xs, &ys).unwrap(), 20.0);
        assert_relative_eq!(interp(2.0, &xs, &ys).unwrap(), 30.0);
    }

    #[test]
    fn test_interp_errors() {
        assert_eq!(
            interp(3.0, &[0.0, 1.0], &[0.0, 1.0]),
            Err(InterpError::OutOfBounds(3.0, 0.0, 1.0))
        );
        assert_eq!(
            interp(0.5, &[0.0], &[0.0]),
            Err(InterpError::InsufficientData)
        );
        assert_eq!(
            interp(0.5, &[1.0, 0.0], &[0.0, 1.0]),
            Err(InterpError::UnsortedData)
        );
    }

    #[test]
    fn test_interp_fill_unsorted_table() {
        let out = interp_fill(&[-1.0, 0.5, 1.5, 5.0], &[2.0, 0.0, 1.0], &[30.0, 0.0, 10.0], 0.0)
            .unwrap();
        assert_eq!(out[0], 0.0);
        assert_relative_eq!(out[1], 5.0);
        assert_relative_eq!(out[2], 20.0);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn test_interp_extrapolate() {
        let out = interp_extrapolate(&[-1.0, 3.0], &[0.0, 1.0, 2.0], &[0.0, 2.0, 4.0]).unwrap();
        assert_relative_eq!(out[0], -2.0);
        assert_relative_eq!(out[1], 6.0);
    }

    #[test]
    fn test_grids() {
        let lin = linspace(0.0, 1.0, 5);
        assert_eq!(lin, vec![0.0, 0.25, 0.5, 0.75, 1.0]);

        let log = logspace(1.0, 100.0, 3);
        assert_relative_eq!(log[1], 10.0, epsilon = 1e-12);
        assert_relative_eq!(log[2], 100.0, epsilon = 1e-12);

        let ar = arange(0.0, 1.0, 0.25);
        assert_eq!(ar.len(), 4);
        assert!(arange(1.0, 0.0, 0.1).is_empty());
    }
}
