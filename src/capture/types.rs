use std::fmt;
use std::str::FromStr;

/// Frame geometry negotiated with a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Native pixel format of a capture device, keyed by V4L2 FourCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed 4:2:2, Y0 U Y1 V
    Yuyv,
    /// Packed 4:2:2, U Y0 V Y1
    Uyvy,
    /// 24-bit R G B
    Rgb24,
    /// 24-bit B G R
    Bgr24,
    /// 8-bit luminance
    Grey,
    /// Motion JPEG, one JPEG image per frame
    Mjpeg,
    Other([u8; 4]),
}

impl PixelFormat {
    pub fn from_fourcc(code: [u8; 4]) -> Self {
        match &code {
            b"YUYV" => Self::Yuyv,
            b"UYVY" => Self::Uyvy,
            b"RGB3" => Self::Rgb24,
            b"BGR3" => Self::Bgr24,
            b"GREY" => Self::Grey,
            b"MJPG" => Self::Mjpeg,
            _ => Self::Other(code),
        }
    }

    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Yuyv => *b"YUYV",
            Self::Uyvy => *b"UYVY",
            Self::Rgb24 => *b"RGB3",
            Self::Bgr24 => *b"BGR3",
            Self::Grey => *b"GREY",
            Self::Mjpeg => *b"MJPG",
            Self::Other(code) => *code,
        }
    }

    /// Bytes per pixel for packed formats, `None` for compressed or unknown ones.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Yuyv | Self::Uyvy => Some(2),
            Self::Rgb24 | Self::Bgr24 => Some(3),
            Self::Grey => Some(1),
            Self::Mjpeg | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.fourcc();
        for byte in code {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !s.is_ascii() {
            return Err(format!("expected a four character code, got {s:?}"));
        }
        let mut code = [0u8; 4];
        code.copy_from_slice(bytes);
        code.make_ascii_uppercase();
        Ok(Self::from_fourcc(code))
    }
}

/// Geometry and layout of the frames a device currently delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFormat {
    pub resolution: Resolution,
    pub pixel_format: PixelFormat,
    /// Bytes per row in the captured payload, including any driver padding.
    pub stride: u32,
}

impl NativeFormat {
    /// Builds a format, raising a stride that some drivers under-report
    /// to the minimum the packed layout needs.
    pub fn new(resolution: Resolution, pixel_format: PixelFormat, stride: u32) -> Self {
        let min = pixel_format
            .bytes_per_pixel()
            .map(|bpp| resolution.width.saturating_mul(bpp as u32))
            .unwrap_or(0);
        Self {
            resolution,
            pixel_format,
            stride: stride.max(min),
        }
    }

    /// Smallest payload that holds every pixel row, if the layout is packed.
    pub fn min_payload(&self) -> Option<usize> {
        let bpp = self.pixel_format.bytes_per_pixel()?;
        let height = self.resolution.height as usize;
        if height == 0 {
            return Some(0);
        }
        Some(self.stride as usize * (height - 1) + self.resolution.width as usize * bpp)
    }
}

impl fmt::Display for NativeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (stride {})",
            self.resolution, self.pixel_format, self.stride
        )
    }
}

/// One captured native payload, copied out of the driver's buffers.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub format: NativeFormat,
    pub data: Vec<u8>,
    pub sequence: u32,
}
