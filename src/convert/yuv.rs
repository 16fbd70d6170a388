//! Packed 4:2:2 YUV to RGB using the integer approximation common to
//! V4L2 capture tools.

/// Byte offsets of Y0, U, Y1, V inside one four-byte macropixel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Packing {
    y0: usize,
    u: usize,
    y1: usize,
    v: usize,
}

pub(crate) const YUYV: Packing = Packing { y0: 0, u: 1, y1: 2, v: 3 };
pub(crate) const UYVY: Packing = Packing { y0: 1, u: 0, y1: 3, v: 2 };

#[inline]
fn clip(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// One YUV sample to RGB.
#[inline]
pub(crate) fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let d = y as i32 - 16;
    let u = u as i32 - 128;
    let v = v as i32 - 128;

    let r = d + v + ((103 * v) >> 8);
    let g = d - ((88 * u) >> 8) - ((183 * v) >> 8);
    let b = d + u + ((198 * u) >> 8);

    [clip(r), clip(g), clip(b)]
}

/// Converts `height` rows of packed 4:2:2 data to tightly packed RGB.
///
/// The caller guarantees an even `width` and that `src` holds every row.
pub(crate) fn packed_422_to_rgb(
    src: &[u8],
    width: usize,
    height: usize,
    stride: usize,
    packing: Packing,
    dst: &mut Vec<u8>,
) {
    dst.reserve(width * height * 3);
    for row in 0..height {
        let line = &src[row * stride..row * stride + width * 2];
        for macropixel in line.chunks_exact(4) {
            let u = macropixel[packing.u];
            let v = macropixel[packing.v];
            dst.extend_from_slice(&yuv_to_rgb(macropixel[packing.y0], u, v));
            dst.extend_from_slice(&yuv_to_rgb(macropixel[packing.y1], u, v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_gives_gray() {
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(128, 128, 128), [112, 112, 112]);
        assert_eq!(yuv_to_rgb(255, 128, 128), [239, 239, 239]);
    }

    #[test]
    fn strong_chroma_clips() {
        // v = 127: r = 112 + 127 + 51
        assert_eq!(yuv_to_rgb(128, 128, 255)[0], 255);
        // u = -128: b = 0 - 128 - 99
        assert_eq!(yuv_to_rgb(16, 0, 128)[2], 0);
    }

    #[test]
    fn arithmetic_shift_rounds_toward_negative_infinity() {
        // v = -1: r = 100 - 1 + (-103 >> 8) = 100 - 1 - 1
        assert_eq!(yuv_to_rgb(116, 128, 127)[0], 98);
    }

    #[test]
    fn pixel_pairs_share_chroma() {
        let src = [16, 128, 128, 128, 16, 128, 128, 128];
        let mut yuyv = Vec::new();
        packed_422_to_rgb(&src, 2, 1, 4, YUYV, &mut yuyv);
        assert_eq!(yuyv, vec![0, 0, 0, 112, 112, 112]);

        let mut uyvy = Vec::new();
        packed_422_to_rgb(&src, 2, 1, 4, UYVY, &mut uyvy);
        // U=16 Y0=128 V=128 Y1=128
        let expected = yuv_to_rgb(128, 16, 128);
        assert_eq!(&uyvy[..3], &expected);
        assert_eq!(&uyvy[3..], &expected);
    }

    #[test]
    fn row_padding_is_skipped() {
        let src = [
            128, 128, 128, 128, 0xAA, 0xAA, //
            16, 128, 16, 128, 0xAA, 0xAA,
        ];
        let mut rgb = Vec::new();
        packed_422_to_rgb(&src, 2, 2, 6, YUYV, &mut rgb);
        assert_eq!(rgb, vec![112, 112, 112, 112, 112, 112, 0, 0, 0, 0, 0, 0]);
    }
}
