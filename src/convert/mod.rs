//! Native device payloads to [`FrameBuffer`]s.

mod luma;
mod yuv;

pub use luma::{rgb_to_luma, LumaWeights};

use image::ImageFormat;

use crate::capture::{PixelFormat, RawFrame};
use crate::error::{CaptureError, Result};
use crate::frame::{FrameBuffer, PixelLayout};

/// Converts a captured frame to the requested layout.
pub fn convert(raw: &RawFrame, layout: PixelLayout, luma: &LumaWeights) -> Result<FrameBuffer> {
    match layout {
        PixelLayout::Rgb => to_rgb(raw),
        PixelLayout::Gray => to_grayscale(raw, luma),
    }
}

/// Interleaved RGB at the frame's native resolution.
pub fn to_rgb(raw: &RawFrame) -> Result<FrameBuffer> {
    let _span = tracing::debug_span!("to_rgb", format = %raw.format).entered();
    let rgb = native_to_rgb(raw, PixelLayout::Rgb)?;
    FrameBuffer::new(raw.format.resolution, PixelLayout::Rgb, rgb)
}

/// Single-channel intensity at the frame's native resolution.
///
/// Luminance-only sources are passed through; everything else goes through
/// RGB and is weighted with `luma`.
pub fn to_grayscale(raw: &RawFrame, luma: &LumaWeights) -> Result<FrameBuffer> {
    let _span = tracing::debug_span!("to_grayscale", format = %raw.format).entered();
    let gray = match raw.format.pixel_format {
        PixelFormat::Grey => {
            let (width, height, stride) = packed_geometry(raw, PixelLayout::Gray)?;
            let mut out = Vec::with_capacity(width * height);
            for row in 0..height {
                out.extend_from_slice(&raw.data[row * stride..row * stride + width]);
            }
            out
        }
        _ => rgb_to_luma(&native_to_rgb(raw, PixelLayout::Gray)?, luma),
    };
    FrameBuffer::new(raw.format.resolution, PixelLayout::Gray, gray)
}

/// Decodes any supported native format to tightly packed RGB bytes.
/// `target` only labels conversion errors.
fn native_to_rgb(raw: &RawFrame, target: PixelLayout) -> Result<Vec<u8>> {
    let format = raw.format.pixel_format;
    match format {
        PixelFormat::Yuyv | PixelFormat::Uyvy => {
            let (width, height, stride) = packed_geometry(raw, target)?;
            if width % 2 != 0 {
                return Err(CaptureError::conversion(
                    format,
                    target,
                    format!("4:2:2 frames need an even width, got {width}"),
                ));
            }
            let packing = if format == PixelFormat::Yuyv {
                yuv::YUYV
            } else {
                yuv::UYVY
            };
            let mut out = Vec::new();
            yuv::packed_422_to_rgb(&raw.data, width, height, stride, packing, &mut out);
            Ok(out)
        }
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
            let (width, height, stride) = packed_geometry(raw, target)?;
            let mut out = Vec::with_capacity(width * height * 3);
            for row in 0..height {
                out.extend_from_slice(&raw.data[row * stride..row * stride + width * 3]);
            }
            if format == PixelFormat::Bgr24 {
                out.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
            }
            Ok(out)
        }
        PixelFormat::Grey => {
            let (width, height, stride) = packed_geometry(raw, target)?;
            let mut out = Vec::with_capacity(width * height * 3);
            for row in 0..height {
                for &y in &raw.data[row * stride..row * stride + width] {
                    out.extend_from_slice(&[y, y, y]);
                }
            }
            Ok(out)
        }
        PixelFormat::Mjpeg => decode_mjpeg(raw, target),
        PixelFormat::Other(_) => Err(CaptureError::conversion(
            format,
            target,
            "unsupported native pixel format",
        )),
    }
}

/// Width, height and stride of a packed frame, after checking the payload
/// covers every row.
fn packed_geometry(raw: &RawFrame, target: PixelLayout) -> Result<(usize, usize, usize)> {
    let format = &raw.format;
    let needed = format.min_payload().ok_or_else(|| {
        CaptureError::conversion(format.pixel_format, target, "not a packed pixel format")
    })?;
    if raw.data.len() < needed {
        return Err(CaptureError::conversion(
            format.pixel_format,
            target,
            format!(
                "{} frame needs {needed} bytes, payload has {}",
                format.resolution,
                raw.data.len()
            ),
        ));
    }
    Ok((
        format.resolution.width as usize,
        format.resolution.height as usize,
        format.stride as usize,
    ))
}

fn decode_mjpeg(raw: &RawFrame, target: PixelLayout) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(&raw.data, ImageFormat::Jpeg)
        .map_err(|e| CaptureError::conversion(PixelFormat::Mjpeg, target, e.to_string()))?;
    let expected = raw.format.resolution;
    if (decoded.width(), decoded.height()) != (expected.width, expected.height) {
        return Err(CaptureError::conversion(
            PixelFormat::Mjpeg,
            target,
            format!(
                "decoded {}x{} image, device declared {expected}",
                decoded.width(),
                decoded.height()
            ),
        ));
    }
    Ok(decoded.into_rgb8().into_raw())
}
