use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::capture::{PixelFormat, Resolution};
use crate::frame::PixelLayout;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no capture device at {}: {reason}", path.display())]
    DeviceNotFound { path: PathBuf, reason: String },

    #[error("device {} is busy", path.display())]
    DeviceBusy { path: PathBuf },

    #[error("handle for {} has already been closed", path.display())]
    InvalidHandle { path: PathBuf },

    #[error("no frame from {} within {timeout:?}", path.display())]
    CaptureTimeout { path: PathBuf, timeout: Duration },

    #[error("cannot convert {from} frame to {to}: {reason}")]
    FormatConversion {
        from: PixelFormat,
        to: PixelLayout,
        reason: String,
    },

    #[error("requested {requested} but {} delivers {actual}", path.display())]
    ResolutionMismatch {
        path: PathBuf,
        requested: Resolution,
        actual: Resolution,
    },

    #[error("{} does not support {what}", path.display())]
    Unsupported { path: PathBuf, what: String },

    #[error("invalid {what}: {reason}")]
    InvalidArgument { what: &'static str, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}

impl CaptureError {
    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            what,
            reason: reason.into(),
        }
    }

    pub(crate) fn conversion(from: PixelFormat, to: PixelLayout, reason: impl Into<String>) -> Self {
        Self::FormatConversion {
            from,
            to,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
