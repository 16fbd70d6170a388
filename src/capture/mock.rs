//! In-memory capture devices for tests and dry runs.
//!
//! Frames are colour bars encoded in the device's native format, so they go
//! through the same conversion path as frames from real hardware.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use super::{CaptureBackend, CaptureSource, NativeFormat, PixelFormat, RawFrame, Resolution};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};

/// White, yellow, cyan, green, magenta, red, blue, black
pub const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

#[derive(Debug, Clone)]
enum Behavior {
    Bars,
    Stall,
    Payload(Vec<u8>),
}

/// A simulated device with a fixed frame size.
#[derive(Debug, Clone)]
pub struct MockDevice {
    format: NativeFormat,
    supported: Vec<PixelFormat>,
    behavior: Behavior,
}

impl MockDevice {
    pub fn new(resolution: Resolution, pixel_format: PixelFormat) -> Self {
        Self {
            format: NativeFormat::new(resolution, pixel_format, 0),
            supported: vec![pixel_format],
            behavior: Behavior::Bars,
        }
    }

    /// Additional native formats the device accepts on `set_format`.
    pub fn supporting(mut self, formats: &[PixelFormat]) -> Self {
        for format in formats {
            if !self.supported.contains(format) {
                self.supported.push(*format);
            }
        }
        self
    }

    /// Never delivers a frame.
    pub fn stalled(mut self) -> Self {
        self.behavior = Behavior::Stall;
        self
    }

    /// Delivers `payload` verbatim instead of colour bars.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.behavior = Behavior::Payload(payload);
        self
    }

    pub fn format(&self) -> NativeFormat {
        self.format
    }
}

#[derive(Debug, Default)]
struct Counters {
    live: AtomicUsize,
    opened: AtomicUsize,
}

/// Backend serving [`MockDevice`]s registered under device paths.
///
/// Clones share devices and counters.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    devices: Arc<Mutex<HashMap<PathBuf, MockDevice>>>,
    counters: Arc<Counters>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, path: impl Into<PathBuf>, device: MockDevice) -> Self {
        self.insert(path, device);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, device: MockDevice) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), device);
    }

    /// Sources opened and not yet dropped.
    pub fn live_sources(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Total successful opens.
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    fn device(&self, path: &Path) -> Option<MockDevice> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

impl CaptureBackend for MockBackend {
    type Source = MockSource;

    fn open(&self, path: &Path) -> Result<MockSource> {
        if self.device(path).is_none() {
            return Err(CaptureError::DeviceNotFound {
                path: path.to_path_buf(),
                reason: "no mock device registered".to_string(),
            });
        }
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSource {
            backend: self.clone(),
            path: path.to_path_buf(),
            sequence: 0,
        })
    }
}

/// An open [`MockDevice`].
#[derive(Debug)]
pub struct MockSource {
    backend: MockBackend,
    path: PathBuf,
    sequence: u32,
}

impl MockSource {
    fn device(&self) -> Result<MockDevice> {
        self.backend
            .device(&self.path)
            .ok_or_else(|| CaptureError::DeviceNotFound {
                path: self.path.clone(),
                reason: "mock device was removed".to_string(),
            })
    }
}

impl CaptureSource for MockSource {
    fn format(&self) -> Result<NativeFormat> {
        Ok(self.device()?.format)
    }

    fn supported_formats(&self) -> Result<Vec<(PixelFormat, String)>> {
        Ok(self
            .device()?
            .supported
            .into_iter()
            .map(|pf| (pf, format!("mock {pf}")))
            .collect())
    }

    /// The frame size is fixed; only the pixel format can change, and only
    /// to one the device supports.
    fn set_format(&mut self, _resolution: Resolution, pixel_format: PixelFormat) -> Result<NativeFormat> {
        let mut device = self.device()?;
        if device.supported.contains(&pixel_format) {
            device.format = NativeFormat::new(device.format.resolution, pixel_format, 0);
            self.backend.insert(self.path.clone(), device.clone());
        }
        Ok(device.format)
    }

    fn capture_frame(&mut self, config: &CaptureConfig) -> Result<RawFrame> {
        let device = self.device()?;
        let data = match device.behavior {
            Behavior::Stall => {
                std::thread::sleep(config.timeout);
                return Err(CaptureError::CaptureTimeout {
                    path: self.path.clone(),
                    timeout: config.timeout,
                });
            }
            Behavior::Payload(payload) => payload,
            Behavior::Bars => encode_bars(&device.format)?,
        };
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(RawFrame {
            format: device.format,
            data,
            sequence,
        })
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.backend.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Colour of the bar covering column `x`.
pub fn bar_at(x: u32, width: u32) -> [u8; 3] {
    BARS[(x as usize * BARS.len()) / width.max(1) as usize]
}

fn bars_rgb(resolution: Resolution) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(resolution.pixel_count() * 3);
    for _ in 0..resolution.height {
        for x in 0..resolution.width {
            rgb.extend_from_slice(&bar_at(x, resolution.width));
        }
    }
    rgb
}

fn encode_bars(format: &NativeFormat) -> Result<Vec<u8>> {
    let resolution = format.resolution;
    let rgb = bars_rgb(resolution);
    let (width, height) = (resolution.width as usize, resolution.height as usize);
    let stride = format.stride as usize;

    let data = match format.pixel_format {
        PixelFormat::Rgb24 => pad_rows(&rgb, width * 3, stride, height),
        PixelFormat::Bgr24 => {
            let mut bgr = rgb;
            bgr.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
            pad_rows(&bgr, width * 3, stride, height)
        }
        PixelFormat::Grey => {
            let grey: Vec<u8> = rgb.chunks_exact(3).map(|px| rgb_to_yuv(px[0], px[1], px[2]).0).collect();
            pad_rows(&grey, width, stride, height)
        }
        PixelFormat::Yuyv | PixelFormat::Uyvy => {
            let packed = rgb_to_422(&rgb, width, format.pixel_format == PixelFormat::Uyvy);
            pad_rows(&packed, width * 2, stride, height)
        }
        PixelFormat::Mjpeg => {
            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, 90).encode(
                &rgb,
                resolution.width,
                resolution.height,
                ExtendedColorType::Rgb8,
            )?;
            jpeg
        }
        PixelFormat::Other(_) => vec![0; resolution.pixel_count() * 2],
    };
    Ok(data)
}

fn pad_rows(tight: &[u8], row_len: usize, stride: usize, height: usize) -> Vec<u8> {
    if stride == row_len {
        return tight.to_vec();
    }
    let mut out = vec![0; stride * height];
    for (row, line) in tight.chunks_exact(row_len).enumerate() {
        out[row * stride..row * stride + row_len].copy_from_slice(line);
    }
    out
}

/// Packs RGB rows into 4:2:2, averaging chroma over each pixel pair.
fn rgb_to_422(rgb: &[u8], width: usize, uyvy: bool) -> Vec<u8> {
    if width == 0 {
        return Vec::new();
    }
    let mut packed = Vec::with_capacity(rgb.len() / 3 * 2);
    for line in rgb.chunks_exact(width * 3) {
        for x in (0..width).step_by(2) {
            let p1 = &line[x * 3..x * 3 + 3];
            let p2 = if x + 1 < width {
                &line[(x + 1) * 3..(x + 1) * 3 + 3]
            } else {
                p1
            };

            let (y1, u1, v1) = rgb_to_yuv(p1[0], p1[1], p1[2]);
            let (y2, u2, v2) = rgb_to_yuv(p2[0], p2[1], p2[2]);

            let u = ((u1 as u16 + u2 as u16) / 2) as u8;
            let v = ((v1 as u16 + v2 as u16) / 2) as u8;

            if uyvy {
                packed.extend_from_slice(&[u, y1, v, y2]);
            } else {
                packed.extend_from_slice(&[y1, u, y2, v]);
            }
        }
    }
    packed
}

/// Studio-swing BT.601 RGB to YUV.
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (16.0 + 0.257 * r + 0.504 * g + 0.098 * b).clamp(0.0, 255.0) as u8;
    let u = (128.0 - 0.148 * r - 0.291 * g + 0.439 * b).clamp(0.0, 255.0) as u8;
    let v = (128.0 + 0.439 * r - 0.368 * g - 0.071 * b).clamp(0.0, 255.0) as u8;

    (y, u, v)
}
