//! Numerical algorithms shared by the radiometric models
//!
//! Interpolation and sampling grids, trapezoidal integration, cubic splines,
//! 1D and 2D convolution, and the Carlson elliptic integrals behind the
//! pixel solid angle.

pub mod convolve;
pub mod elliptic;
pub mod misc;
pub mod spline;
pub mod trapezoid;

pub use misc::{interp, interp_extrapolate, interp_fill, linspace, logspace};
pub use spline::CubicSpline;
pub use trapezoid::trap_integrate;
