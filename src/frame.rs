use std::fmt;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use ndarray::{ArrayViewD, IxDyn};

use crate::capture::Resolution;
use crate::error::{CaptureError, Result};

/// In-memory layout of a converted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// Interleaved red, green, blue
    Rgb,
    /// One intensity byte per pixel
    Gray,
}

impl PixelLayout {
    pub fn channels(&self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Gray => 1,
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rgb => "RGB",
            Self::Gray => "grayscale",
        })
    }
}

/// A dense, row-major, top-to-bottom pixel buffer with no row padding.
///
/// RGB frames have shape `(height, width, 3)`; grayscale frames have shape
/// `(height, width)`. The buffer owns its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    layout: PixelLayout,
    shape: [usize; 3],
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(resolution: Resolution, layout: PixelLayout, data: Vec<u8>) -> Result<Self> {
        if !resolution.is_valid() {
            return Err(CaptureError::invalid(
                "frame size",
                format!("{resolution} has a zero dimension"),
            ));
        }
        let expected = resolution.pixel_count() * layout.channels();
        if data.len() != expected {
            return Err(CaptureError::invalid(
                "frame data",
                format!(
                    "{resolution} {layout} needs {expected} bytes, got {}",
                    data.len()
                ),
            ));
        }
        Ok(Self {
            layout,
            shape: [
                resolution.height as usize,
                resolution.width as usize,
                layout.channels(),
            ],
            data,
        })
    }

    /// A frame with every byte set to `value`.
    pub fn filled(resolution: Resolution, layout: PixelLayout, value: u8) -> Result<Self> {
        let len = resolution.pixel_count() * layout.channels();
        Self::new(resolution, layout, vec![value; len])
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn width(&self) -> u32 {
        self.shape[1] as u32
    }

    pub fn height(&self) -> u32 {
        self.shape[0] as u32
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// `[height, width, 3]` for RGB, `[height, width]` for grayscale.
    pub fn shape(&self) -> &[usize] {
        match self.layout {
            PixelLayout::Rgb => &self.shape,
            PixelLayout::Gray => &self.shape[..2],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height() {
            return None;
        }
        let len = self.shape[1] * self.channels();
        let start = y as usize * len;
        Some(&self.data[start..start + len])
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width() {
            return None;
        }
        let channels = self.channels();
        let start = x as usize * channels;
        self.row(y).map(|row| &row[start..start + channels])
    }

    /// Borrow the pixels as an n-dimensional array with [`shape`](Self::shape).
    pub fn view(&self) -> Result<ArrayViewD<'_, u8>> {
        ArrayViewD::from_shape(IxDyn(self.shape()), &self.data)
            .map_err(|e| CaptureError::invalid("frame shape", e.to_string()))
    }

    pub fn to_image(&self) -> Result<DynamicImage> {
        self.clone().into_image()
    }

    pub fn into_image(self) -> Result<DynamicImage> {
        let (width, height, layout) = (self.width(), self.height(), self.layout);
        let image = match layout {
            PixelLayout::Rgb => RgbImage::from_raw(width, height, self.data).map(DynamicImage::ImageRgb8),
            PixelLayout::Gray => GrayImage::from_raw(width, height, self.data).map(DynamicImage::ImageLuma8),
        };
        image.ok_or_else(|| {
            CaptureError::invalid("frame data", format!("buffer too small for {width}x{height} {layout}"))
        })
    }

    /// Rebuilds a frame from a decoded image, keeping its RGB or gray layout.
    pub fn from_image(image: DynamicImage, layout: PixelLayout) -> Result<Self> {
        let resolution = Resolution::new(image.width(), image.height());
        let data = match layout {
            PixelLayout::Rgb => image.into_rgb8().into_raw(),
            PixelLayout::Gray => image.into_luma8().into_raw(),
        };
        Self::new(resolution, layout, data)
    }

    /// Writes the frame as an uncompressed bitmap.
    pub fn save_bmp(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.to_image()?.save_with_format(path, ImageFormat::Bmp)?;
        tracing::debug!("Wrote {} {} frame to {}", self.resolution(), self.layout, path.display());
        Ok(())
    }
}
