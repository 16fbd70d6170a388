use std::fmt;

use ndarray::{s, Array2, ArrayView2, Ix2};

use crate::error::{CaptureError, Result};

/// Axes along which padding or a 1-D kernel applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Along columns: top and bottom.
    Vertical,
    /// Along rows: left and right.
    Horizontal,
    Both,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Vertical => f.write_str("vertical"),
            Direction::Horizontal => f.write_str("horizontal"),
            Direction::Both => f.write_str("both"),
        }
    }
}

/// Surround `plane` with `pad` zeros on the sides selected by `direction`.
pub fn zero_pad(plane: ArrayView2<'_, f64>, pad: usize, direction: Direction) -> Array2<f64> {
    let (height, width) = plane.dim();
    let (py, px) = match direction {
        Direction::Vertical => (pad, 0),
        Direction::Horizontal => (0, pad),
        Direction::Both => (pad, pad),
    };
    let mut padded = Array2::zeros((height + 2 * py, width + 2 * px));
    padded
        .slice_mut(s![py..py + height, px..px + width])
        .assign(&plane);
    padded
}

fn odd_side(len: usize, what: &'static str) -> Result<usize> {
    if len % 2 == 0 {
        return Err(CaptureError::invalid(what, format!("side must be odd, got {len}")));
    }
    Ok(len / 2)
}

/// Same-size 2-D convolution with zero padding.
pub fn convolve_2d(plane: ArrayView2<'_, f64>, kernel: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    let (kh, kw) = kernel.dim();
    if kh != kw {
        return Err(CaptureError::invalid(
            "kernel",
            format!("must be square, got {kh}x{kw}"),
        ));
    }
    let pad = odd_side(kh, "kernel")?;

    let flipped = kernel.slice(s![..;-1, ..;-1]);
    let padded = zero_pad(plane, pad, Direction::Both);
    let values = padded
        .windows(Ix2(kh, kw))
        .into_iter()
        .map(|window| window.iter().zip(flipped.iter()).map(|(p, k)| p * k).sum())
        .collect();

    Array2::from_shape_vec(plane.dim(), values)
        .map_err(|e| CaptureError::invalid("convolution", e.to_string()))
}

/// Same-size convolution with a 1-D kernel along `direction`.
///
/// `Direction::Both` applies the kernel vertically, then horizontally.
pub fn convolve_1d(plane: ArrayView2<'_, f64>, kernel: &[f64], direction: Direction) -> Result<Array2<f64>> {
    let pad = odd_side(kernel.len(), "kernel")?;
    let window = match direction {
        Direction::Vertical => Ix2(kernel.len(), 1),
        Direction::Horizontal => Ix2(1, kernel.len()),
        Direction::Both => {
            let vertical = convolve_1d(plane, kernel, Direction::Vertical)?;
            return convolve_1d(vertical.view(), kernel, Direction::Horizontal);
        }
    };

    let padded = zero_pad(plane, pad, direction);
    let values = padded
        .windows(window)
        .into_iter()
        .map(|w| w.iter().zip(kernel.iter().rev()).map(|(p, k)| p * k).sum())
        .collect();

    Array2::from_shape_vec(plane.dim(), values)
        .map_err(|e| CaptureError::invalid("convolution", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn pads_with_zeros() {
        let plane = Array2::from_elem((4, 4), 3.0);

        let both = zero_pad(plane.view(), 1, Direction::Both);
        assert_eq!(both.dim(), (6, 6));
        assert_eq!(both[[0, 0]], 0.0);
        assert_eq!(both[[1, 1]], 3.0);
        assert_eq!(both[[4, 4]], 3.0);
        assert_eq!(both[[5, 3]], 0.0);
        assert_eq!(both.sum(), 48.0);

        let vertical = zero_pad(plane.view(), 2, Direction::Vertical);
        assert_eq!(vertical.dim(), (8, 4));
        assert_eq!(vertical.row(1).sum(), 0.0);
        assert_eq!(vertical.row(2).sum(), 12.0);

        let horizontal = zero_pad(plane.view(), 2, Direction::Horizontal);
        assert_eq!(horizontal.dim(), (4, 8));
        assert_eq!(horizontal.column(7).sum(), 0.0);
    }

    #[test]
    fn identity_kernel_is_a_no_op() {
        let plane = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let kernel = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        assert_eq!(convolve_2d(plane.view(), kernel.view()).unwrap(), plane);
        assert_eq!(convolve_1d(plane.view(), &[0.0, 1.0, 0.0], Direction::Both).unwrap(), plane);
    }

    #[test]
    fn kernel_is_flipped() {
        // shift kernel: true convolution moves content right by one
        let plane = array![[1.0, 2.0, 3.0]];
        let shifted = convolve_1d(plane.view(), &[0.0, 0.0, 1.0], Direction::Horizontal).unwrap();
        assert_eq!(shifted, array![[0.0, 1.0, 2.0]]);

        let kernel = array![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]];
        let shifted = convolve_2d(plane.view(), kernel.view()).unwrap();
        assert_eq!(shifted, array![[0.0, 1.0, 2.0]]);
    }

    #[test]
    fn vertical_kernel_runs_down_columns() {
        let plane = array![[1.0], [2.0], [3.0]];
        let summed = convolve_1d(plane.view(), &[1.0, 1.0, 1.0], Direction::Vertical).unwrap();
        assert_eq!(summed, array![[3.0], [6.0], [5.0]]);
    }

    #[test]
    fn separable_matches_full_kernel() {
        let plane = Array2::from_shape_fn((5, 6), |(y, x)| (y * 7 + x * 3) as f64);
        let row = [1.0, 2.0, 1.0];
        let full = Array2::from_shape_fn((3, 3), |(j, i)| row[j] * row[i]);

        let separable = convolve_1d(plane.view(), &row, Direction::Both).unwrap();
        let direct = convolve_2d(plane.view(), full.view()).unwrap();
        for (a, b) in separable.iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_even_or_non_square_kernels() {
        let plane = Array2::zeros((3, 3));
        assert!(convolve_1d(plane.view(), &[1.0, 1.0], Direction::Horizontal).is_err());
        assert!(convolve_2d(plane.view(), Array2::zeros((3, 5)).view()).is_err());
        assert!(convolve_2d(plane.view(), Array2::zeros((2, 2)).view()).is_err());
    }
}
