use std::f64::consts::PI;

use ndarray::Array2;

use super::convolve::{convolve_1d, Direction};
use super::filters::{gaussian_derivative, Derivative};
use super::kernel::{self, check_sigma};
use super::to_plane;
use crate::capture::Resolution;
use crate::error::{CaptureError, Result};
use crate::frame::{FrameBuffer, PixelLayout};

const EDGE: u8 = 255;

const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

fn at(plane: &Array2<f64>, y: usize, x: usize, dy: isize, dx: isize) -> f64 {
    let (ny, nx) = (y as isize + dy, x as isize + dx);
    if ny < 0 || nx < 0 {
        return 0.0;
    }
    plane.get((ny as usize, nx as usize)).copied().unwrap_or(0.0)
}

/// Keeps `plane[y, x]` against an opposing neighbour pair: strictly above
/// the one earlier in raster order, at least the later one.
fn peaks_over(plane: &Array2<f64>, y: usize, x: usize, (dy, dx): (isize, isize)) -> bool {
    let value = plane[[y, x]];
    value > at(plane, y, x, -dy, -dx) && value >= at(plane, y, x, dy, dx)
}

fn binary(plane: &Array2<bool>) -> Result<FrameBuffer> {
    let (height, width) = plane.dim();
    let data = plane.iter().map(|&on| if on { EDGE } else { 0 }).collect();
    FrameBuffer::new(Resolution::new(width as u32, height as u32), PixelLayout::Gray, data)
}

/// Canny edge map: 255 on edges, 0 elsewhere.
///
/// `high` seeds edges, `low` extends them through connected pixels. Both
/// bound the gradient magnitude of the `sigma`-smoothed image.
pub fn canny_edges(gray: &FrameBuffer, sigma: f64, high: f64, low: f64) -> Result<FrameBuffer> {
    check_sigma(sigma)?;
    if !(0.0..=high).contains(&low) {
        return Err(CaptureError::invalid(
            "canny thresholds",
            format!("need 0 <= low <= high, got low {low} high {high}"),
        ));
    }
    let _span = tracing::debug_span!("canny", sigma, high, low).entered();

    let plane = to_plane(gray)?;
    let dx = gaussian_derivative(&plane, sigma, Derivative::Dx)?;
    let dy = gaussian_derivative(&plane, sigma, Derivative::Dy)?;
    let magnitude = Array2::from_shape_fn(plane.dim(), |(y, x)| {
        (dx[[y, x]] * dx[[y, x]] + dy[[y, x]] * dy[[y, x]]).sqrt()
    });

    // non-maximum suppression across the gradient, in four direction bins
    let thin = Array2::from_shape_fn(plane.dim(), |(y, x)| {
        let angle = dy[[y, x]].atan2(dx[[y, x]]).rem_euclid(PI);
        let bin = angle / PI * 8.0;
        let across = if bin <= 1.0 || bin > 7.0 {
            (0, 1)
        } else if bin <= 3.0 {
            (1, 1)
        } else if bin <= 5.0 {
            (1, 0)
        } else {
            (1, -1)
        };
        if peaks_over(&magnitude, y, x, across) {
            magnitude[[y, x]]
        } else {
            0.0
        }
    });

    let (height, width) = thin.dim();
    let mut edges = Array2::from_elem(thin.dim(), false);
    let mut stack: Vec<(usize, usize)> = thin
        .indexed_iter()
        .filter(|(_, &m)| m > 0.0 && m >= high)
        .map(|(idx, _)| idx)
        .collect();
    for &(y, x) in &stack {
        edges[[y, x]] = true;
    }
    while let Some((y, x)) = stack.pop() {
        for (oy, ox) in NEIGHBOURS {
            let (ny, nx) = (y as isize + oy, x as isize + ox);
            if ny < 0 || nx < 0 || ny as usize >= height || nx as usize >= width {
                continue;
            }
            let (ny, nx) = (ny as usize, nx as usize);
            let m = thin[[ny, nx]];
            if !edges[[ny, nx]] && m > 0.0 && m >= low {
                edges[[ny, nx]] = true;
                stack.push((ny, nx));
            }
        }
    }

    tracing::debug!("{} edge pixels", edges.iter().filter(|&&e| e).count());
    binary(&edges)
}

/// Harris corner map: 255 on corners, 0 elsewhere.
///
/// Gradients use derivative-of-Gaussian kernels at `sigma`; the structure
/// tensor is averaged with a Gaussian window at `sigma_w`. Corners are local
/// maxima of `det - k * trace^2` above `threshold`.
pub fn harris_corners(
    gray: &FrameBuffer,
    sigma: f64,
    sigma_w: f64,
    k: f64,
    threshold: f64,
) -> Result<FrameBuffer> {
    check_sigma(sigma)?;
    check_sigma(sigma_w)?;
    let _span = tracing::debug_span!("harris", sigma, sigma_w, k, threshold).entered();

    let plane = to_plane(gray)?;
    let dx = gaussian_derivative(&plane, sigma, Derivative::Dx)?;
    let dy = gaussian_derivative(&plane, sigma, Derivative::Dy)?;

    let window = kernel::gaussian_1d(sigma_w, 2 * kernel::radius(sigma_w, 3.0) + 1)?;
    let smooth = |product: Array2<f64>| convolve_1d(product.view(), &window, Direction::Both);
    let sxx = smooth(&dx * &dx)?;
    let syy = smooth(&dy * &dy)?;
    let sxy = smooth(&dx * &dy)?;

    let trace = &sxx + &syy;
    let response = &sxx * &syy - &sxy * &sxy - trace.mapv(|t| k * t * t);

    let corners = Array2::from_shape_fn(response.dim(), |(y, x)| {
        response[[y, x]] > threshold
            && NEIGHBOURS[4..]
                .iter()
                .all(|&offset| peaks_over(&response, y, x, offset))
    });

    tracing::debug!("{} corners", corners.iter().filter(|&&c| c).count());
    binary(&corners)
}
