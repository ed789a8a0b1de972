//! Trapezoidal integration of tabulated curves.

/// Integrate `y(x)` with the trapezoidal rule.
///
/// Works for descending abscissae too (the result changes sign), matching
/// numpy's `trapz`. Slices shorter than two samples integrate to zero.
///
/// # Arguments
/// * `x` - Sample abscissae
/// * `y` - Sample values, same length as `x`
pub fn trap_integrate(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum()
}

/// Integrate `y(x)` restricted to samples where `mask` holds.
///
/// Samples outside the mask count as zero, so the partial trapezoids at the
/// window edges are kept, which is what a multiplicative 0/1 window does.
pub fn trap_integrate_masked<F>(x: &[f64], y: &[f64], mask: F) -> f64
where
    F: Fn(f64) -> bool,
{
    let masked: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(&xv, &yv)| if mask(xv) { yv } else { 0.0 })
        .collect();
    trap_integrate(x, &masked)
}
