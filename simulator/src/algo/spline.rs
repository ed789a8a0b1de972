//! Natural cubic spline through tabulated samples.
//!
//! The spectrometer PSF gain is computed at a handful of wavelengths only and
//! read back at every detector pixel; the spline carries it in between.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    #[error("spline has {x} abscissae but {y} values")]
    MismatchedLengths { x: usize, y: usize },
    #[error("spline needs at least 2 samples, got {0}")]
    InsufficientData(usize),
    #[error("spline abscissae must be strictly increasing")]
    UnsortedData,
}

/// Piecewise cubic with continuous second derivative and zero curvature at
/// both ends.
///
/// Stored as the sample values plus the second derivative (moment) at each
/// knot; each segment is rebuilt from its two end moments on evaluation.
///
/// ```rust
/// use radsim::algo::spline::CubicSpline;
///
/// let spline = CubicSpline::new(vec![1.0, 1.5, 2.0], vec![0.30, 0.26, 0.21]).unwrap();
/// assert!((spline.evaluate(1.5) - 0.26).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    moments: Vec<f64>,
}

impl CubicSpline {
    /// Fit the spline through `(x, y)`.
    ///
    /// # Errors
    /// Mismatched lengths, fewer than two samples, or abscissae that are not
    /// strictly increasing.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, SplineError> {
        if x.len() != y.len() {
            return Err(SplineError::MismatchedLengths {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(SplineError::InsufficientData(x.len()));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SplineError::UnsortedData);
        }
        let moments = natural_moments(&x, &y);
        Ok(Self { x, y, moments })
    }

    /// Spline value at `x`, clamped to the end samples outside the knots.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x <= self.x[0] {
            return self.y[0];
        }
        if x >= self.x[n - 1] {
            return self.y[n - 1];
        }

        // first knot strictly above x, always in 1..n here
        let hi = self.x.partition_point(|&k| k <= x);
        let lo = hi - 1;
        let h = self.x[hi] - self.x[lo];
        let a = (self.x[hi] - x) / h;
        let b = (x - self.x[lo]) / h;

        a * self.y[lo]
            + b * self.y[hi]
            + ((a.powi(3) - a) * self.moments[lo] + (b.powi(3) - b) * self.moments[hi]) * h * h / 6.0
    }

    pub fn evaluate_many(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&v| self.evaluate(v)).collect()
    }
}

/// Second derivatives at the knots with M₀ = Mₙ₋₁ = 0.
///
/// The interior moments solve the symmetric tridiagonal system
/// h₍ᵢ₋₁₎Mᵢ₋₁ + 2(h₍ᵢ₋₁₎ + hᵢ)Mᵢ + hᵢMᵢ₊₁ = 6(Δᵢ − Δᵢ₋₁),
/// eliminated forward and substituted back (Thomas algorithm).
fn natural_moments(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut moments = vec![0.0; n];
    if n < 3 {
        return moments;
    }

    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let slope: Vec<f64> = y
        .windows(2)
        .zip(&h)
        .map(|(w, h)| (w[1] - w[0]) / h)
        .collect();

    let m = n - 2;
    let mut diag = vec![0.0; m];
    let mut rhs = vec![0.0; m];
    for i in 0..m {
        diag[i] = 2.0 * (h[i] + h[i + 1]);
        rhs[i] = 6.0 * (slope[i + 1] - slope[i]);
    }
    for i in 1..m {
        let w = h[i] / diag[i - 1];
        diag[i] -= w * h[i];
        rhs[i] -= w * rhs[i - 1];
    }

    moments[m] = rhs[m - 1] / diag[m - 1];
    for i in (0..m - 1).rev() {
        moments[i + 1] = (rhs[i] - h[i + 1] * moments[i + 2]) / diag[i];
    }
    moments
}
