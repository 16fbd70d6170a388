use std::path::{Path, PathBuf};

use super::OutputSink;
use crate::error::{CaptureError, Result};
use crate::frame::FrameBuffer;

/// Writes numbered bitmaps: `PREFIX-N.bmp`, `PREFIX-N-VARIANT.bmp`.
#[derive(Debug, Clone)]
pub struct BmpSequence {
    prefix: PathBuf,
}

impl BmpSequence {
    pub fn new<P: AsRef<Path>>(prefix: P) -> Result<Self> {
        let prefix = prefix.as_ref();
        let has_name = prefix
            .file_name()
            .map(|name| !name.is_empty())
            .unwrap_or(false);
        if !has_name {
            return Err(CaptureError::invalid(
                "output prefix",
                format!("{} does not end in a file name", prefix.display()),
            ));
        }
        Ok(Self {
            prefix: prefix.to_path_buf(),
        })
    }

    pub fn path_for(&self, index: u32, variant: &str) -> PathBuf {
        let mut name = self
            .prefix
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!("-{index}"));
        if !variant.is_empty() {
            name.push(format!("-{variant}"));
        }
        name.push(".bmp");
        self.prefix.with_file_name(name)
    }
}

impl OutputSink for BmpSequence {
    fn write_frame(&mut self, index: u32, variant: &str, frame: &FrameBuffer) -> Result<PathBuf> {
        let path = self.path_for(index, variant);
        frame.save_bmp(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Resolution;
    use crate::frame::PixelLayout;

    #[test]
    fn names_follow_prefix_index_variant() {
        let sink = BmpSequence::new("out/test").unwrap();
        assert_eq!(sink.path_for(0, ""), PathBuf::from("out/test-0.bmp"));
        assert_eq!(sink.path_for(3, "gray"), PathBuf::from("out/test-3-gray.bmp"));
    }

    #[test]
    fn prefix_needs_a_file_name() {
        assert!(BmpSequence::new("/").is_err());
        assert!(BmpSequence::new("frames/..").is_err());
    }

    #[test]
    fn writes_readable_bitmaps() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = BmpSequence::new(dir.path().join("shot")).unwrap();
        let frame = FrameBuffer::filled(Resolution::new(5, 3), PixelLayout::Gray, 77).unwrap();

        let path = sink.write_frame(1, "gray", &frame).unwrap();
        assert_eq!(path, dir.path().join("shot-1-gray.bmp"));

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 3));
        assert_eq!(decoded.to_luma8().get_pixel(4, 2).0, [77]);
    }
}
