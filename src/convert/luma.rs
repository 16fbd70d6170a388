use std::fmt;
use std::str::FromStr;

/// Per-channel weights for RGB to intensity conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LumaWeights {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl LumaWeights {
    /// ITU-R BT.709 (sRGB primaries)
    pub const REC709: Self = Self {
        red: 0.2126,
        green: 0.7152,
        blue: 0.0722,
    };

    /// ITU-R BT.601
    pub const REC601: Self = Self {
        red: 0.299,
        green: 0.587,
        blue: 0.114,
    };

    pub fn new(red: f32, green: f32, blue: f32) -> Result<Self, String> {
        let weights = [red, green, blue];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("luma weights must be finite and non-negative, got {red},{green},{blue}"));
        }
        if weights.iter().sum::<f32>() <= 0.0 {
            return Err("luma weights must not all be zero".to_string());
        }
        Ok(Self { red, green, blue })
    }

    /// Intensity of one pixel, rounded and clamped to `0..=255`.
    #[inline]
    pub fn luma(&self, r: u8, g: u8, b: u8) -> u8 {
        let y = self.red * r as f32 + self.green * g as f32 + self.blue * b as f32;
        y.round().clamp(0.0, 255.0) as u8
    }
}

impl Default for LumaWeights {
    fn default() -> Self {
        Self::REC709
    }
}

impl fmt::Display for LumaWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.red, self.green, self.blue)
    }
}

impl FromStr for LumaWeights {
    type Err = String;

    /// Accepts `rec709`, `rec601` or three comma separated weights.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rec709" | "bt709" => return Ok(Self::REC709),
            "rec601" | "bt601" => return Ok(Self::REC601),
            _ => {}
        }
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid luma weights {s:?}: {e}"))?;
        match parts.as_slice() {
            [r, g, b] => Self::new(*r, *g, *b),
            _ => Err(format!("expected rec709, rec601 or r,g,b weights, got {s:?}")),
        }
    }
}

/// Converts packed RGB bytes to one intensity byte per pixel.
pub fn rgb_to_luma(rgb: &[u8], weights: &LumaWeights) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|px| weights.luma(px[0], px[1], px[2]))
        .collect()
}
