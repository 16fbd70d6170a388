//! Single-frame capture from Video4Linux devices.
//!
//! ```no_run
//! use framegrab::Camera;
//!
//! let camera = Camera::default();
//! let mut handle = camera.open("/dev/video0")?;
//! let resolution = handle.resolution()?;
//! handle.close()?;
//!
//! let frame = camera.grab_frame_rgb("/dev/video0", resolution.width, resolution.height)?;
//! assert_eq!(frame.shape(), &[resolution.height as usize, resolution.width as usize, 3]);
//! frame.save_bmp("frame.bmp")?;
//! # Ok::<(), framegrab::CaptureError>(())
//! ```

pub mod capture;
pub mod config;
pub mod convert;
pub mod error;
pub mod frame;
pub mod output;
pub mod processing;

pub use capture::{Camera, DeviceHandle, NativeFormat, PixelFormat, RawFrame, Resolution};
pub use config::{CaptureConfig, IoMethod};
pub use convert::LumaWeights;
pub use error::{CaptureError, Result};
pub use frame::{FrameBuffer, PixelLayout};
