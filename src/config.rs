use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::capture::PixelFormat;
use crate::convert::LumaWeights;

/// How frames are moved from the driver into userspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMethod {
    /// Driver buffers mapped into the process
    #[default]
    Mmap,
    /// Process-allocated buffers filled by the driver
    UserPtr,
}

impl fmt::Display for IoMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mmap => "mmap",
            Self::UserPtr => "userptr",
        })
    }
}

impl FromStr for IoMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mmap" => Ok(Self::Mmap),
            "userptr" | "user" => Ok(Self::UserPtr),
            other => Err(format!("unknown I/O method {other:?} (expected mmap or userptr)")),
        }
    }
}

/// Longest frame wait the driver poll accepts (`i32::MAX` milliseconds).
pub const MAX_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Settings shared by every handle a [`Camera`](crate::Camera) opens.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Deadline for a single frame to arrive
    pub timeout: Duration,
    pub io_method: IoMethod,
    /// Driver buffers requested when streaming starts
    pub buffer_count: u32,
    /// Native format forced during negotiation; `None` keeps the device's current one
    pub pixel_format: Option<PixelFormat>,
    /// Weights for grayscale conversion
    pub luma: LumaWeights,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            io_method: IoMethod::Mmap,
            buffer_count: 4,
            pixel_format: None,
            luma: LumaWeights::REC709,
        }
    }
}

impl CaptureConfig {
    /// Frame deadline, clamped to [`MAX_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(MAX_TIMEOUT);
        self
    }

    pub fn with_io_method(mut self, io_method: IoMethod) -> Self {
        self.io_method = io_method;
        self
    }

    pub fn with_buffer_count(mut self, buffer_count: u32) -> Self {
        self.buffer_count = buffer_count.max(1);
        self
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = Some(pixel_format);
        self
    }

    pub fn with_luma(mut self, luma: LumaWeights) -> Self {
        self.luma = luma;
        self
    }
}
