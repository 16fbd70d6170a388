use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use v4l::buffer::{Metadata, Type};
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

use super::{CaptureBackend, CaptureSource, NativeFormat, PixelFormat, RawFrame, Resolution};
use crate::config::{CaptureConfig, IoMethod, MAX_TIMEOUT};
use crate::error::{CaptureError, Result};

/// Opens Video4Linux capture devices by path.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2Backend;

impl CaptureBackend for V4l2Backend {
    type Source = V4l2Source;

    fn open(&self, path: &Path) -> Result<V4l2Source> {
        V4l2Source::open(path)
    }
}

pub struct V4l2Source {
    device: Device,
    path: PathBuf,
}

impl V4l2Source {
    pub fn open<P: AsRef<Path>>(device_path: P) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!("Opening V4L2 device at {}", path.display());

        let metadata = std::fs::metadata(path).map_err(|e| not_found(path, e.to_string()))?;
        if !metadata.file_type().is_char_device() {
            return Err(not_found(path, "not a character device"));
        }

        let device = Device::with_path(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => not_found(path, e.to_string()),
            io::ErrorKind::ResourceBusy => CaptureError::DeviceBusy {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => CaptureError::Io {
                path: path.to_path_buf(),
                source: e,
            },
            _ => not_found(path, format!("cannot open as a video device: {e}")),
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| not_found(path, format!("not a V4L2 device: {e}")))?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(not_found(path, "not a video capture device"));
        }
        if !caps.capabilities.contains(Flags::STREAMING) {
            return Err(CaptureError::Unsupported {
                path: path.to_path_buf(),
                what: "streaming I/O".to_string(),
            });
        }

        tracing::info!("{} is {} (driver {})", path.display(), caps.card, caps.driver);

        Ok(Self {
            device,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSource for V4l2Source {
    fn format(&self) -> Result<NativeFormat> {
        let format = self
            .device
            .format()
            .map_err(|e| device_error(&self.path, e))?;
        Ok(native_format(&format))
    }

    fn supported_formats(&self) -> Result<Vec<(PixelFormat, String)>> {
        let descriptions = self
            .device
            .enum_formats()
            .map_err(|e| device_error(&self.path, e))?;
        Ok(descriptions
            .into_iter()
            .map(|desc| (PixelFormat::from_fourcc(desc.fourcc.repr), desc.description))
            .collect())
    }

    fn set_format(&mut self, resolution: Resolution, pixel_format: PixelFormat) -> Result<NativeFormat> {
        let requested = Format::new(
            resolution.width,
            resolution.height,
            FourCC::new(&pixel_format.fourcc()),
        );
        let applied = self
            .device
            .set_format(&requested)
            .map_err(|e| device_error(&self.path, e))?;
        let applied = native_format(&applied);
        if applied.resolution != resolution || applied.pixel_format != pixel_format {
            tracing::warn!(
                "{} adjusted requested {} {} to {}",
                self.path.display(),
                resolution,
                pixel_format,
                applied
            );
        }
        Ok(applied)
    }

    fn capture_frame(&mut self, config: &CaptureConfig) -> Result<RawFrame> {
        let format = self.format()?;
        let path = &self.path;
        // the public field bypasses `with_timeout`
        let timeout = config.timeout.min(MAX_TIMEOUT);

        let (data, sequence) = match config.io_method {
            IoMethod::Mmap => {
                let mut stream =
                    MmapStream::with_buffers(&mut self.device, Type::VideoCapture, config.buffer_count)
                        .map_err(|e| device_error(path, e))?;
                stream.set_timeout(timeout);
                let (buf, meta) = stream.next().map_err(|e| dequeue_error(path, timeout, e))?;
                payload(buf, meta)
            }
            IoMethod::UserPtr => {
                let mut stream =
                    UserptrStream::with_buffers(&mut self.device, Type::VideoCapture, config.buffer_count)
                        .map_err(|e| device_error(path, e))?;
                stream.set_timeout(timeout);
                let (buf, meta) = stream.next().map_err(|e| dequeue_error(path, timeout, e))?;
                payload(buf, meta)
            }
        };

        Ok(RawFrame {
            format,
            data,
            sequence,
        })
    }
}

fn native_format(format: &Format) -> NativeFormat {
    NativeFormat::new(
        Resolution::new(format.width, format.height),
        PixelFormat::from_fourcc(format.fourcc.repr),
        format.stride,
    )
}

/// Copies the used part of a driver buffer.
fn payload(buf: &[u8], meta: &Metadata) -> (Vec<u8>, u32) {
    let used = match meta.bytesused as usize {
        0 => buf.len(),
        n => n.min(buf.len()),
    };
    (buf[..used].to_vec(), meta.sequence)
}

fn not_found(path: &Path, reason: impl Into<String>) -> CaptureError {
    CaptureError::DeviceNotFound {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn device_error(path: &Path, err: io::Error) -> CaptureError {
    match err.kind() {
        io::ErrorKind::ResourceBusy => CaptureError::DeviceBusy {
            path: path.to_path_buf(),
        },
        io::ErrorKind::NotFound => not_found(path, err.to_string()),
        _ => CaptureError::Io {
            path: path.to_path_buf(),
            source: err,
        },
    }
}

fn dequeue_error(path: &Path, timeout: Duration, err: io::Error) -> CaptureError {
    match err.kind() {
        io::ErrorKind::TimedOut => CaptureError::CaptureTimeout {
            path: path.to_path_buf(),
            timeout,
        },
        _ => device_error(path, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_not_found() {
        let err = V4l2Source::open("/dev/this-video-device-does-not-exist").unwrap_err();
        assert!(matches!(err, CaptureError::DeviceNotFound { .. }));
    }

    #[test]
    fn regular_file_is_not_a_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = V4l2Source::open(file.path()).unwrap_err();
        match err {
            CaptureError::DeviceNotFound { reason, .. } => {
                assert_eq!(reason, "not a character device")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn non_video_character_device_is_not_found() {
        let err = V4l2Source::open("/dev/null").unwrap_err();
        assert!(matches!(err, CaptureError::DeviceNotFound { .. }), "{err:?}");
    }

    #[test]
    fn timeouts_map_to_capture_timeout() {
        let err = dequeue_error(
            Path::new("/dev/video0"),
            Duration::from_secs(2),
            io::Error::new(io::ErrorKind::TimedOut, "VIDIOC_DQBUF"),
        );
        assert!(matches!(err, CaptureError::CaptureTimeout { .. }));

        let err = dequeue_error(
            Path::new("/dev/video0"),
            Duration::from_secs(2),
            io::Error::from(io::ErrorKind::ResourceBusy),
        );
        assert!(matches!(err, CaptureError::DeviceBusy { .. }));
    }
}
