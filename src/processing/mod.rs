//! Grayscale image processing on `f64` planes.
//!
//! Frames enter as [`PixelLayout::Gray`] buffers, are filtered as
//! `Array2<f64>` with zero padding at the borders, and leave as grayscale
//! buffers again.

mod convolve;
mod features;
mod filters;
pub mod kernel;

pub use convolve::{convolve_1d, convolve_2d, zero_pad, Direction};
pub use features::{canny_edges, harris_corners};
pub use filters::{crop, gaussian_blur, gaussian_derivative, uniform_blur, CropWindow, Derivative};

use ndarray::Array2;

use crate::capture::Resolution;
use crate::error::{CaptureError, Result};
use crate::frame::{FrameBuffer, PixelLayout};

/// Intensities of a grayscale frame as a `(height, width)` plane.
pub fn to_plane(gray: &FrameBuffer) -> Result<Array2<f64>> {
    if gray.layout() != PixelLayout::Gray {
        return Err(CaptureError::invalid(
            "frame layout",
            format!("processing needs a grayscale frame, got {}", gray.layout()),
        ));
    }
    let shape = (gray.height() as usize, gray.width() as usize);
    Array2::from_shape_vec(shape, gray.as_bytes().iter().map(|&v| f64::from(v)).collect())
        .map_err(|e| CaptureError::invalid("frame shape", e.to_string()))
}

/// Rounds and clamps a plane back into a grayscale frame.
pub fn from_plane(plane: &Array2<f64>) -> Result<FrameBuffer> {
    let (height, width) = plane.dim();
    let data = plane
        .iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    FrameBuffer::new(Resolution::new(width as u32, height as u32), PixelLayout::Gray, data)
}
