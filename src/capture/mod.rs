mod camera;
mod handle;
mod types;
mod v4l_capture;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use camera::Camera;
pub use handle::DeviceHandle;
pub use types::{NativeFormat, PixelFormat, RawFrame, Resolution};
pub use v4l_capture::{V4l2Backend, V4l2Source};

use std::path::Path;

use crate::config::CaptureConfig;
use crate::error::Result;

/// Opens capture sources by device path.
pub trait CaptureBackend {
    type Source: CaptureSource;

    /// Open the device at `path` for capture.
    fn open(&self, path: &Path) -> Result<Self::Source>;
}

/// An opened capture device.
///
/// Dropping a source releases the underlying device.
pub trait CaptureSource {
    /// The format frames are currently delivered in
    fn format(&self) -> Result<NativeFormat>;

    /// Native formats the device advertises, with the driver's descriptions.
    fn supported_formats(&self) -> Result<Vec<(PixelFormat, String)>>;

    /// Ask the device for a geometry and native format. Drivers may adjust
    /// the request; the returned format is what was actually applied.
    fn set_format(&mut self, resolution: Resolution, pixel_format: PixelFormat) -> Result<NativeFormat>;

    /// Capture a single frame, waiting at most `config.timeout`.
    fn capture_frame(&mut self, config: &CaptureConfig) -> Result<RawFrame>;
}
