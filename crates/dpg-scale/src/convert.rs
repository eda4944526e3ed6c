//! 像素格式转换.
//!
//! DPG 的缩略图和视频帧使用 BGR555 小端, 每像素 16 位:
//! ```text
//! bit 15     14..10   9..5    4..0
//!     1      B>>3     G>>3    R>>3
//! ```
//! 最高位恒为 1 (不透明).

use dpg_core::{DpgError, DpgResult, PixelFormat};

/// 不透明位
const OPAQUE_BIT: u16 = 0x8000;

/// 打包一个 RGB 像素
#[inline]
pub const fn rgb_to_bgr555(r: u8, g: u8, b: u8) -> u16 {
    OPAQUE_BIT | ((b as u16 >> 3) << 10) | ((g as u16 >> 3) << 5) | (r as u16 >> 3)
}

/// 解包为 RGB (低 3 位用高位补齐)
#[inline]
pub const fn bgr555_to_rgb(v: u16) -> (u8, u8, u8) {
    let r = (v & 0x1F) as u8;
    let g = ((v >> 5) & 0x1F) as u8;
    let b = ((v >> 10) & 0x1F) as u8;
    ((r << 3) | (r >> 2), (g << 3) | (g >> 2), (b << 3) | (b >> 2))
}

/// packed RGB24/RGBA → BGR555 (alpha 被忽略)
pub fn pack_bgr555(
    src: &[u8],
    src_linesize: usize,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> DpgResult<Vec<u16>> {
    let bpp = match format {
        PixelFormat::Rgb24 | PixelFormat::Rgba => format.bytes_per_pixel(),
        _ => {
            return Err(DpgError::Unsupported(format!(
                "不支持的格式转换: {} → bgr555le",
                format
            )));
        }
    };
    let (w, h) = (width as usize, height as usize);
    if h > 0 && src.len() < src_linesize * (h - 1) + w * bpp {
        return Err(DpgError::InvalidArgument("源图像数据不足".into()));
    }

    let mut out = Vec::with_capacity(w * h);
    for row in 0..h {
        let line = &src[row * src_linesize..row * src_linesize + w * bpp];
        out.extend(
            line.chunks_exact(bpp)
                .map(|p| rgb_to_bgr555(p[0], p[1], p[2])),
        );
    }
    Ok(out)
}

/// BGR555 → RGB24
pub fn unpack_bgr555(pixels: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 3);
    for &v in pixels {
        let (r, g, b) = bgr555_to_rgb(v);
        out.extend_from_slice(&[r, g, b]);
    }
    out
}
