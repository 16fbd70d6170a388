use std::path::{Path, PathBuf};

use super::handle::{DeviceHandle, HeldDevices};
use super::{CaptureBackend, Resolution, V4l2Backend};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::frame::{FrameBuffer, PixelLayout};

/// Entry point for opening devices and grabbing single frames.
///
/// A camera hands out at most one live [`DeviceHandle`] per device path.
/// The grab methods are self-contained: each one opens the device, captures
/// exactly one frame, and releases the device again, including on failure.
pub struct Camera<B: CaptureBackend = V4l2Backend> {
    backend: B,
    config: CaptureConfig,
    held: HeldDevices,
}

impl Camera<V4l2Backend> {
    /// A camera over Video4Linux devices.
    pub fn v4l2(config: CaptureConfig) -> Self {
        Self::new(V4l2Backend, config)
    }
}

impl Default for Camera<V4l2Backend> {
    fn default() -> Self {
        Self::v4l2(CaptureConfig::default())
    }
}

impl<B: CaptureBackend> Camera<B> {
    pub fn new(backend: B, config: CaptureConfig) -> Self {
        Self {
            backend,
            config,
            held: HeldDevices::default(),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether a live handle currently holds `path`.
    pub fn is_held(&self, path: impl AsRef<Path>) -> bool {
        self.held.contains(&registry_key(path.as_ref()))
    }

    /// Open the device at `path` for capture.
    ///
    /// Fails with [`CaptureError::DeviceBusy`] while another handle from this
    /// camera holds the same device.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<DeviceHandle<B::Source>> {
        let path = path.as_ref();
        let lease = self
            .held
            .acquire(registry_key(path))
            .ok_or_else(|| CaptureError::DeviceBusy {
                path: path.to_path_buf(),
            })?;
        let source = self.backend.open(path)?;
        tracing::info!("Opened {}", path.display());
        Ok(DeviceHandle::new(
            path.to_path_buf(),
            self.config.clone(),
            source,
            lease,
        ))
    }

    /// Open `path`, read its negotiated resolution and close it again.
    pub fn resolution(&self, path: impl AsRef<Path>) -> Result<Resolution> {
        let mut handle = self.open(path)?;
        let resolution = handle.resolution()?;
        handle.close()?;
        Ok(resolution)
    }

    /// Grab one frame as interleaved RGB of shape `(height, width, 3)`.
    pub fn grab_frame_rgb(&self, path: impl AsRef<Path>, width: u32, height: u32) -> Result<FrameBuffer> {
        self.grab_frame(path, Resolution::new(width, height), PixelLayout::Rgb)
    }

    /// Grab one frame as grayscale of shape `(height, width)`.
    pub fn grab_frame_grayscale(
        &self,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
    ) -> Result<FrameBuffer> {
        self.grab_frame(path, Resolution::new(width, height), PixelLayout::Gray)
    }

    /// Grab one frame of the given size and layout.
    ///
    /// `resolution` is what the caller expects the device to deliver; it is
    /// not negotiated unless the configuration forces a pixel format.
    pub fn grab_frame(
        &self,
        path: impl AsRef<Path>,
        resolution: Resolution,
        layout: PixelLayout,
    ) -> Result<FrameBuffer> {
        let path = path.as_ref();
        let _span = tracing::debug_span!(
            "grab_frame",
            path = %path.display(),
            %resolution,
            %layout
        )
        .entered();

        if !resolution.is_valid() {
            return Err(CaptureError::invalid(
                "resolution",
                format!("{resolution} has a zero dimension"),
            ));
        }

        let mut handle = self.open(path)?;
        handle.negotiate(resolution)?;
        let frame = handle.capture_frame(layout)?;
        handle.close()?;

        if frame.resolution() != resolution {
            return Err(CaptureError::ResolutionMismatch {
                path: path.to_path_buf(),
                requested: resolution,
                actual: frame.resolution(),
            });
        }
        Ok(frame)
    }
}

/// Key under which a device is held. Symlinks such as `/dev/v4l/by-id/*`
/// resolve to the same node as the path they point to.
fn registry_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
