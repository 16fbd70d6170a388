use std::f64::consts::PI;

use ndarray::Array2;

use crate::error::{CaptureError, Result};

/// Largest accepted standard deviation, in pixels.
pub const MAX_SIGMA: f64 = 1000.0;

/// Largest accepted kernel side.
pub const MAX_KERNEL_SIZE: usize = 10_001;

/// Half-width of a kernel covering `extent` standard deviations.
pub fn radius(sigma: f64, extent: f64) -> usize {
    (extent * sigma).floor().max(0.0) as usize
}

pub(crate) fn check_sigma(sigma: f64) -> Result<()> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(CaptureError::invalid("sigma", format!("must be positive, got {sigma}")));
    }
    if sigma > MAX_SIGMA {
        return Err(CaptureError::invalid(
            "sigma",
            format!("at most {MAX_SIGMA} is supported, got {sigma}"),
        ));
    }
    Ok(())
}

fn check_size(size: usize) -> Result<()> {
    if size % 2 == 0 {
        return Err(CaptureError::invalid("kernel size", format!("must be odd, got {size}")));
    }
    if size > MAX_KERNEL_SIZE {
        return Err(CaptureError::invalid(
            "kernel size",
            format!("at most {MAX_KERNEL_SIZE} is supported, got {size}"),
        ));
    }
    Ok(())
}

fn gaussian(x: f64, sigma: f64) -> f64 {
    (-x * x / (2.0 * sigma * sigma)).exp() / (sigma * (2.0 * PI).sqrt())
}

fn sampled(sigma: f64, size: usize, f: impl Fn(f64) -> f64) -> Result<Vec<f64>> {
    check_sigma(sigma)?;
    check_size(size)?;
    let center = (size / 2) as f64;
    Ok((0..size).map(|i| f(i as f64 - center)).collect())
}

/// Sampled Gaussian, normalized to sum to one.
pub fn gaussian_1d(sigma: f64, size: usize) -> Result<Vec<f64>> {
    let mut kernel = sampled(sigma, size, |x| gaussian(x, sigma))?;
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    Ok(kernel)
}

/// First derivative of the Gaussian.
pub fn gaussian_derivative_1d(sigma: f64, size: usize) -> Result<Vec<f64>> {
    sampled(sigma, size, |x| -x / (sigma * sigma) * gaussian(x, sigma))
}

/// Second derivative of the Gaussian.
pub fn gaussian_second_derivative_1d(sigma: f64, size: usize) -> Result<Vec<f64>> {
    let s2 = sigma * sigma;
    sampled(sigma, size, |x| (x * x / (s2 * s2) - 1.0 / s2) * gaussian(x, sigma))
}

/// Isotropic 2-D Gaussian, normalized to sum to one.
pub fn gaussian_2d(sigma: f64, size: usize) -> Result<Array2<f64>> {
    let row = sampled(sigma, size, |x| gaussian(x, sigma))?;
    let mut kernel = Array2::from_shape_fn((size, size), |(j, i)| row[j] * row[i]);
    let sum = kernel.sum();
    kernel.mapv_inplace(|k| k / sum);
    Ok(kernel)
}

/// Uniform `size x size` averaging kernel.
pub fn box_kernel(size: usize) -> Result<Array2<f64>> {
    check_size(size)?;
    let weight = 1.0 / (size * size) as f64;
    Ok(Array2::from_elem((size, size), weight))
}
