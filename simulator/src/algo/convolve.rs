//! Discrete convolution with numpy/scipy `same` output alignment.
//!
//! Both routines zero-pad the input and return an output of the input's
//! length (shape), centred on the full convolution the way `np.convolve(...,
//! 'same')` and `scipy.signal.convolve2d(..., mode='same')` do. The 2D variant
//! exploits separable kernels, which is all the pixel response model needs,
//! and optionally spreads rows across the rayon pool.

use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};

/// Options for controlling the convolution operation
#[derive(Debug, Clone, Copy)]
pub struct ConvolveOptions {
    /// Whether to use parallel processing with rayon
    pub parallel: bool,
}

impl Default for ConvolveOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// 1D convolution of `signal` with `kernel`, `same` mode.
///
/// Output sample `i` is full-convolution sample `i + (K - 1) / 2`, with `K`
/// the kernel length. Kernels longer than the signal are allowed.
pub fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len() as isize;
    let k = kernel.len() as isize;
    if n == 0 || k == 0 {
        return vec![0.0; signal.len()];
    }
    let offset = (k - 1) / 2;

    (0..n)
        .map(|i| {
            let full_idx = i + offset;
            kernel
                .iter()
                .enumerate()
                .filter_map(|(kk, &kv)| {
                    let src = full_idx - kk as isize;
                    (0..n).contains(&src).then(|| signal[src as usize] * kv)
                })
                .sum()
        })
        .collect()
}

/// 2D convolution of `input` with the separable kernel `ky ⊗ kx`, `same` mode.
///
/// `ky` runs along rows (axis 0), `kx` along columns (axis 1). The result
/// equals a full 2D convolution with the outer-product kernel.
///
/// # Arguments
///
/// * `input` - Input image
/// * `ky` - Kernel factor along axis 0
/// * `kx` - Kernel factor along axis 1
/// * `options` - Convolution options
pub fn convolve2d_separable(
    input: &Array2<f64>,
    ky: &[f64],
    kx: &[f64],
    options: ConvolveOptions,
) -> Array2<f64> {
    let mut rows_done = Array2::zeros(input.dim());
    convolve_lanes(input, &mut rows_done, Axis(1), kx, options.parallel);

    let mut output = Array2::zeros(input.dim());
    convolve_lanes(&rows_done, &mut output, Axis(0), ky, options.parallel);
    output
}

fn convolve_lanes(
    input: &Array2<f64>,
    output: &mut Array2<f64>,
    axis: Axis,
    kernel: &[f64],
    parallel: bool,
) {
    let apply = |lane_in: ArrayView1<f64>, mut lane_out: ndarray::ArrayViewMut1<f64>| {
        let src: Vec<f64> = lane_in.to_vec();
        let conv = Array1::from(convolve_same(&src, kernel));
        lane_out.assign(&conv);
    };

    let zip = Zip::from(input.lanes(axis)).and(output.lanes_mut(axis));
    if parallel {
        zip.par_for_each(apply);
    } else {
        zip.for_each(apply);
    }
}
