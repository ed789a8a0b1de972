//! Pixel acceptance geometry.

use std::f64::consts::PI;

use crate::algo::elliptic::ellippi;

/// Solid angle in sr subtended on-axis by an elliptical pupil, seen from one
/// detector pixel.
///
/// Closed form from J. T. Conway, Nucl. Instrum. Meth. A 614 (2010) 17,
/// eq. 56, with the pupil semi-axes set by the F-numbers along the two
/// detector axes at unit distance.
///
/// # Arguments
/// * `f_num_x` - F-number along the dispersion (x) axis
/// * `f_num_y` - F-number along the cross-dispersion (y) axis
pub fn omega_pix(f_num_x: f64, f_num_y: f64) -> f64 {
    let (a, b) = if f_num_x > f_num_y {
        (0.5 / f_num_y, 0.5 / f_num_x)
    } else {
        (0.5 / f_num_x, 0.5 / f_num_y)
    };
    let h = 1.0;

    let big_a = 4.0 * h * b / (a * (h * h + a * a).sqrt());
    let k2 = (a * a - b * b) / (h * h + a * a);
    let alpha2 = 1.0 - (b / a).powi(2);

    2.0 * PI - big_a * ellippi(alpha2, k2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_circular_pupil_matches_cone() {
        let omega = omega_pix(5.0, 5.0);
        let check = 2.0 * PI * (1.0 - (0.1f64).atan().cos());
        assert_relative_eq!(omega, check, max_relative = 1e-10);
    }

    #[test]
    fn test_axis_order_does_not_matter() {
        assert_relative_eq!(omega_pix(20.0, 30.0), omega_pix(30.0, 20.0), max_relative = 1e-14);
    }

    #[test]
    fn test_elliptical_pupil_bounded_by_circles() {
        // Ellipse lies between the cones of its minor and major semi-axes
        let omega = omega_pix(10.0, 20.0);
        assert!(omega < omega_pix(10.0, 10.0));
        assert!(omega > omega_pix(20.0, 20.0));
        // Slow beams approach the paraxial ellipse area π a b
        assert_relative_eq!(omega, PI * (0.05 * 0.025), max_relative = 5e-3);
    }
}
