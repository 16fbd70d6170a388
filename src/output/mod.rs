mod bmp;

pub use bmp::BmpSequence;

use std::path::PathBuf;

use crate::error::Result;
use crate::frame::FrameBuffer;

/// Trait for frame destinations
pub trait OutputSink {
    /// Write `frame` as variant `variant` of capture number `index`.
    ///
    /// An empty variant names the primary output of that capture.
    /// Returns where the frame went.
    fn write_frame(&mut self, index: u32, variant: &str, frame: &FrameBuffer) -> Result<PathBuf>;
}
