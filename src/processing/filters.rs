use std::fmt;
use std::str::FromStr;

use ndarray::Array2;

use super::convolve::{convolve_1d, convolve_2d, Direction};
use super::kernel::{self, check_sigma};
use super::{from_plane, to_plane};
use crate::capture::Resolution;
use crate::error::{CaptureError, Result};
use crate::frame::FrameBuffer;

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl CropWindow {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.x1.saturating_sub(self.x0), self.y1.saturating_sub(self.y0))
    }

    fn check(&self, frame: Resolution) -> Result<()> {
        if self.x0 >= self.x1 || self.y0 >= self.y1 {
            return Err(CaptureError::invalid("crop window", format!("{self} is empty")));
        }
        if self.x1 > frame.width || self.y1 > frame.height {
            return Err(CaptureError::invalid(
                "crop window",
                format!("{self} exceeds a {frame} frame"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for CropWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x0, self.y0, self.x1, self.y1)
    }
}

impl FromStr for CropWindow {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("bad crop window {s:?}: {e}"))?;
        match parts[..] {
            [x0, y0, x1, y1] => Ok(Self::new(x0, y0, x1, y1)),
            _ => Err(format!("expected x0,y0,x1,y1, got {s:?}")),
        }
    }
}

/// Copies the pixels inside `window`, keeping the frame's layout.
pub fn crop(frame: &FrameBuffer, window: CropWindow) -> Result<FrameBuffer> {
    window.check(frame.resolution())?;

    let channels = frame.channels();
    let row_len = frame.width() as usize * channels;
    let (start, end) = (window.x0 as usize * channels, window.x1 as usize * channels);
    let size = window.resolution();

    let mut data = Vec::with_capacity(size.pixel_count() * channels);
    for row in frame
        .as_bytes()
        .chunks_exact(row_len)
        .skip(window.y0 as usize)
        .take(size.height as usize)
    {
        data.extend_from_slice(&row[start..end]);
    }
    FrameBuffer::new(size, frame.layout(), data)
}

/// Gaussian smoothing over `3 * sigma` on each side.
pub fn gaussian_blur(gray: &FrameBuffer, sigma: f64) -> Result<FrameBuffer> {
    check_sigma(sigma)?;
    let plane = to_plane(gray)?;
    let size = 2 * kernel::radius(sigma, 3.0) + 1;
    let kernel = kernel::gaussian_1d(sigma, size)?;
    tracing::debug!(sigma, size, "gaussian blur");
    from_plane(&convolve_1d(plane.view(), &kernel, Direction::Both)?)
}

/// 3x3 box filter.
pub fn uniform_blur(gray: &FrameBuffer) -> Result<FrameBuffer> {
    let plane = to_plane(gray)?;
    from_plane(&convolve_2d(plane.view(), kernel::box_kernel(3)?.view())?)
}

/// Which partial derivative [`gaussian_derivative`] computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivative {
    Dx,
    Dy,
    Dxx,
    Dyy,
    Dxy,
}

/// Partial derivative of a Gaussian-smoothed plane.
///
/// Kernels span `5 * sigma` on each side. `x` runs along rows, `y` down
/// columns.
pub fn gaussian_derivative(plane: &Array2<f64>, sigma: f64, order: Derivative) -> Result<Array2<f64>> {
    check_sigma(sigma)?;
    let size = 2 * kernel::radius(sigma, 5.0) + 1;
    let smooth = kernel::gaussian_1d(sigma, size)?;
    let first = kernel::gaussian_derivative_1d(sigma, size)?;
    let second = kernel::gaussian_second_derivative_1d(sigma, size)?;

    let (vertical, horizontal) = match order {
        Derivative::Dx => (&smooth, &first),
        Derivative::Dy => (&first, &smooth),
        Derivative::Dxx => (&smooth, &second),
        Derivative::Dyy => (&second, &smooth),
        Derivative::Dxy => (&first, &first),
    };
    let columns = convolve_1d(plane.view(), vertical, Direction::Vertical)?;
    convolve_1d(columns.view(), horizontal, Direction::Horizontal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelLayout;

    fn ramp(width: u32, height: u32) -> FrameBuffer {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (y * 10 + x) as u8))
            .collect();
        FrameBuffer::new(Resolution::new(width, height), PixelLayout::Gray, data).unwrap()
    }

    #[test]
    fn crops_gray_and_rgb() {
        let frame = ramp(6, 4);
        let cropped = crop(&frame, CropWindow::new(1, 2, 4, 4)).unwrap();
        assert_eq!(cropped.shape(), &[2, 3]);
        assert_eq!(cropped.as_bytes(), &[21, 22, 23, 31, 32, 33]);

        let data = (0..4 * 2 * 3).map(|v| v as u8).collect();
        let rgb = FrameBuffer::new(Resolution::new(4, 2), PixelLayout::Rgb, data).unwrap();
        let cropped = crop(&rgb, CropWindow::new(3, 1, 4, 2)).unwrap();
        assert_eq!(cropped.shape(), &[1, 1, 3]);
        assert_eq!(cropped.as_bytes(), &[21, 22, 23]);
    }

    #[test]
    fn rejects_empty_or_oversized_windows() {
        let frame = ramp(6, 4);
        for window in [
            CropWindow::new(2, 0, 2, 4),
            CropWindow::new(0, 3, 6, 1),
            CropWindow::new(0, 0, 7, 4),
            CropWindow::new(0, 0, 6, 5),
        ] {
            let err = crop(&frame, window).unwrap_err();
            assert!(matches!(err, CaptureError::InvalidArgument { .. }), "{window}");
        }
    }

    #[test]
    fn parses_crop_windows() {
        assert_eq!("1, 2,30,40".parse::<CropWindow>(), Ok(CropWindow::new(1, 2, 30, 40)));
        assert!("1,2,3".parse::<CropWindow>().is_err());
        assert!("1,2,3,x".parse::<CropWindow>().is_err());
    }

    #[test]
    fn blurs_keep_flat_interiors() {
        let flat = FrameBuffer::filled(Resolution::new(20, 20), PixelLayout::Gray, 100).unwrap();

        let blurred = gaussian_blur(&flat, 1.0).unwrap();
        assert_eq!(blurred.shape(), &[20, 20]);
        assert_eq!(blurred.pixel(10, 10), Some(&[100u8][..]));
        // zero padding darkens the border
        assert!(blurred.pixel(0, 0).unwrap()[0] < 100);

        let boxed = uniform_blur(&flat).unwrap();
        assert_eq!(boxed.pixel(5, 5), Some(&[100u8][..]));
        assert_eq!(boxed.pixel(0, 0), Some(&[44u8][..]));
    }

    #[test]
    fn blur_requires_grayscale_and_positive_sigma() {
        let rgb = FrameBuffer::filled(Resolution::new(4, 4), PixelLayout::Rgb, 1).unwrap();
        assert!(matches!(
            gaussian_blur(&rgb, 1.0),
            Err(CaptureError::InvalidArgument { .. })
        ));
        let gray = FrameBuffer::filled(Resolution::new(4, 4), PixelLayout::Gray, 1).unwrap();
        assert!(gaussian_blur(&gray, -1.0).is_err());
    }

    #[test]
    fn huge_sigmas_are_rejected_not_allocated() {
        let gray = FrameBuffer::filled(Resolution::new(8, 8), PixelLayout::Gray, 1).unwrap();
        assert!(matches!(
            gaussian_blur(&gray, 1e19),
            Err(CaptureError::InvalidArgument { .. })
        ));
        let plane = Array2::zeros((8, 8));
        assert!(matches!(
            gaussian_derivative(&plane, 1e19, Derivative::Dx),
            Err(CaptureError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn derivatives_follow_the_ramp() {
        // intensity grows by one per column and two per row
        let plane = Array2::from_shape_fn((30, 30), |(y, x)| (2 * y + x) as f64);

        let dx = gaussian_derivative(&plane, 1.0, Derivative::Dx).unwrap();
        let dy = gaussian_derivative(&plane, 1.0, Derivative::Dy).unwrap();
        let dxx = gaussian_derivative(&plane, 1.0, Derivative::Dxx).unwrap();
        let dxy = gaussian_derivative(&plane, 1.0, Derivative::Dxy).unwrap();

        assert!((dx[[15, 15]] - 1.0).abs() < 0.01, "{}", dx[[15, 15]]);
        assert!((dy[[15, 15]] - 2.0).abs() < 0.02, "{}", dy[[15, 15]]);
        assert!(dxx[[15, 15]].abs() < 0.01);
        assert!(dxy[[15, 15]].abs() < 0.01);
    }
}
