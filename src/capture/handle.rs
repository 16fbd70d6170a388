use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{CaptureSource, NativeFormat, PixelFormat, RawFrame, Resolution};
use crate::config::CaptureConfig;
use crate::convert;
use crate::error::{CaptureError, Result};
use crate::frame::{FrameBuffer, PixelLayout};

/// Paths currently held by live handles of one camera.
#[derive(Debug, Clone, Default)]
pub(crate) struct HeldDevices {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl HeldDevices {
    /// Claims `key`, or returns `None` if a live handle already holds it.
    pub(crate) fn acquire(&self, key: PathBuf) -> Option<Lease> {
        let mut paths = self.paths.lock().unwrap_or_else(PoisonError::into_inner);
        if !paths.insert(key.clone()) {
            return None;
        }
        Some(Lease {
            paths: Arc::clone(&self.paths),
            key,
        })
    }

    pub(crate) fn contains(&self, key: &Path) -> bool {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Claim on a device path, given back on drop.
pub(crate) struct Lease {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
    key: PathBuf,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

struct OpenSource<S> {
    // dropped before the lease so the device is closed by the time the path is free again
    source: S,
    _lease: Lease,
}

/// An open capture session on one device path.
///
/// The device is released by [`close`](Self::close) or, failing that, when
/// the handle is dropped. Every operation after `close` fails with
/// [`CaptureError::InvalidHandle`].
pub struct DeviceHandle<S: CaptureSource> {
    path: PathBuf,
    config: CaptureConfig,
    open: Option<OpenSource<S>>,
}

impl<S: CaptureSource> DeviceHandle<S> {
    pub(crate) fn new(path: PathBuf, config: CaptureConfig, source: S, lease: Lease) -> Self {
        Self {
            path,
            config,
            open: Some(OpenSource {
                source,
                _lease: lease,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn source(&self) -> Result<&S> {
        self.open
            .as_ref()
            .map(|open| &open.source)
            .ok_or_else(|| self.invalid())
    }

    fn source_mut(&mut self) -> Result<&mut S> {
        match self.open.as_mut() {
            Some(open) => Ok(&mut open.source),
            None => Err(CaptureError::InvalidHandle {
                path: self.path.clone(),
            }),
        }
    }

    fn invalid(&self) -> CaptureError {
        CaptureError::InvalidHandle {
            path: self.path.clone(),
        }
    }

    /// The format the device currently delivers.
    pub fn native_format(&self) -> Result<NativeFormat> {
        self.source()?.format()
    }

    /// Native formats the device advertises.
    pub fn supported_formats(&self) -> Result<Vec<(PixelFormat, String)>> {
        self.source()?.supported_formats()
    }

    /// The currently negotiated frame geometry.
    pub fn resolution(&self) -> Result<Resolution> {
        let resolution = self.native_format()?.resolution;
        if !resolution.is_valid() {
            return Err(CaptureError::Unsupported {
                path: self.path.clone(),
                what: format!("a zero-sized capture format ({resolution})"),
            });
        }
        Ok(resolution)
    }

    /// Settle the capture format for frames of `expected` size.
    ///
    /// When the configuration forces a pixel format it is requested at
    /// `expected`; otherwise the device's current format is kept. Fails with
    /// [`CaptureError::ResolutionMismatch`] if the device ends up delivering
    /// any other geometry.
    pub fn negotiate(&mut self, expected: Resolution) -> Result<NativeFormat> {
        if !expected.is_valid() {
            return Err(CaptureError::invalid(
                "resolution",
                format!("{expected} has a zero dimension"),
            ));
        }
        let forced = self.config.pixel_format;
        let path = self.path.clone();
        let source = self.source_mut()?;
        let current = source.format()?;

        let format = match forced {
            Some(pixel_format)
                if current.pixel_format != pixel_format || current.resolution != expected =>
            {
                tracing::info!(
                    "Requesting {} {} on {} (was {})",
                    expected,
                    pixel_format,
                    path.display(),
                    current
                );
                source.set_format(expected, pixel_format)?
            }
            _ => current,
        };

        if format.resolution != expected {
            return Err(CaptureError::ResolutionMismatch {
                path,
                requested: expected,
                actual: format.resolution,
            });
        }
        tracing::debug!("Negotiated {} on {}", format, path.display());
        Ok(format)
    }

    /// Capture one native frame.
    pub fn capture_raw(&mut self) -> Result<RawFrame> {
        let config = self.config.clone();
        let raw = self.source_mut()?.capture_frame(&config)?;
        tracing::debug!(
            "Captured frame #{} ({} bytes, {})",
            raw.sequence,
            raw.data.len(),
            raw.format
        );
        Ok(raw)
    }

    /// Capture one frame and convert it to `layout`.
    pub fn capture_frame(&mut self, layout: PixelLayout) -> Result<FrameBuffer> {
        let raw = self.capture_raw()?;
        convert::convert(&raw, layout, &self.config.luma)
    }

    pub fn capture_rgb(&mut self) -> Result<FrameBuffer> {
        self.capture_frame(PixelLayout::Rgb)
    }

    pub fn capture_grayscale(&mut self) -> Result<FrameBuffer> {
        self.capture_frame(PixelLayout::Gray)
    }

    /// Release the device. Only the first call succeeds.
    pub fn close(&mut self) -> Result<()> {
        match self.open.take() {
            Some(open) => {
                drop(open);
                tracing::info!("Closed {}", self.path.display());
                Ok(())
            }
            None => Err(self.invalid()),
        }
    }
}

impl<S: CaptureSource> fmt::Debug for DeviceHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::mock::{MockBackend, MockDevice, MockSource};
    use crate::capture::CaptureBackend;

    #[test]
    fn lease_is_exclusive_until_dropped() {
        let held = HeldDevices::default();
        let key = PathBuf::from("/dev/video0");

        let lease = held.acquire(key.clone()).expect("first claim");
        assert!(held.acquire(key.clone()).is_none());
        assert!(held.contains(&key));

        drop(lease);
        assert!(!held.contains(&key));
        assert!(held.acquire(key).is_some());
    }

    fn open_mock(device: MockDevice) -> DeviceHandle<MockSource> {
        let path = PathBuf::from("/dev/video0");
        let backend = MockBackend::new().with_device(path.clone(), device);
        let source = backend.open(&path).unwrap();
        let lease = HeldDevices::default().acquire(path.clone()).unwrap();
        DeviceHandle::new(path, CaptureConfig::default(), source, lease)
    }

    #[test]
    fn zero_sized_device_format_is_unsupported() {
        let handle = open_mock(MockDevice::new(Resolution::new(0, 4), PixelFormat::Yuyv));
        match handle.resolution().unwrap_err() {
            CaptureError::Unsupported { what, .. } => assert!(what.contains("0x4"), "{what}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn lists_advertised_formats_until_closed() {
        let device = MockDevice::new(Resolution::new(8, 4), PixelFormat::Yuyv)
            .supporting(&[PixelFormat::Mjpeg]);
        let mut handle = open_mock(device);

        let formats: Vec<PixelFormat> = handle
            .supported_formats()
            .unwrap()
            .into_iter()
            .map(|(format, _)| format)
            .collect();
        assert_eq!(formats, [PixelFormat::Yuyv, PixelFormat::Mjpeg]);

        handle.close().unwrap();
        assert!(matches!(
            handle.supported_formats(),
            Err(CaptureError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn leases_on_different_paths_coexist() {
        let held = HeldDevices::default();
        let _a = held.acquire(PathBuf::from("/dev/video0")).unwrap();
        let _b = held.acquire(PathBuf::from("/dev/video1")).unwrap();
    }
}
