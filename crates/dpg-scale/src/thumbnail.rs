//! DPG4 缩略图.
//!
//! 源图像按 "裁剪填充" 方式映射到 256x192: 取 `s = min(w/256, h/192)`,
//! 即缩放后的图像恰好覆盖目标区域, 多出的部分在两侧对称裁掉.
//! 采样使用双三次插值, 结果打包为 BGR555 小端, 行优先, 无行填充.

use log::debug;

use dpg_core::version::{THUMBNAIL_HEIGHT, THUMBNAIL_SIZE, THUMBNAIL_WIDTH};
use dpg_core::{DpgError, DpgResult, PixelFormat};

use crate::ScaleAlgorithm;
use crate::convert::{pack_bgr555, unpack_bgr555};
use crate::scale::{AffineTransform, PackedPlane, transform_packed};

/// 解码后的源图像 (packed RGB24 或 RGBA)
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// 每行字节数
    pub linesize: usize,
}

impl SourceImage {
    /// 以紧凑行布局创建
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> DpgResult<Self> {
        if !matches!(format, PixelFormat::Rgb24 | PixelFormat::Rgba) {
            return Err(DpgError::Unsupported(format!("缩略图源像素格式: {}", format)));
        }
        if width == 0 || height == 0 {
            return Err(DpgError::InvalidArgument(format!(
                "图像尺寸无效: {}x{}",
                width, height
            )));
        }
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(DpgError::InvalidArgument(format!(
                "图像数据应为 {} 字节, 实际 {} 字节",
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            linesize: format.linesize(width),
        })
    }

    /// 纯色 RGB24 图像
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DpgResult<Self> {
        let data = rgb.repeat(width as usize * height as usize);
        Self::new(data, width, height, PixelFormat::Rgb24)
    }

    fn plane(&self) -> PackedPlane<'_> {
        PackedPlane {
            data: &self.data,
            linesize: self.linesize,
            width: self.width,
            height: self.height,
            bpp: self.format.bytes_per_pixel(),
        }
    }
}

/// 裁剪填充变换: 目标 256x192 坐标到源坐标
pub fn crop_to_fill(src_width: u32, src_height: u32) -> AffineTransform {
    let (w, h) = (f64::from(src_width), f64::from(src_height));
    let (tw, th) = (f64::from(THUMBNAIL_WIDTH), f64::from(THUMBNAIL_HEIGHT));
    let s = (w / tw).min(h / th);
    AffineTransform::scale_offset(s, s, (w - tw * s) / 2.0, (h - th * s) / 2.0)
}

/// 256x192 BGR555 缩略图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pixels: Vec<u16>,
}

impl Thumbnail {
    /// 用双三次插值从源图像生成
    pub fn from_image(src: &SourceImage) -> DpgResult<Self> {
        Self::with_algorithm(src, ScaleAlgorithm::Bicubic)
    }

    /// 用指定采样算法生成
    pub fn with_algorithm(src: &SourceImage, algorithm: ScaleAlgorithm) -> DpgResult<Self> {
        let transform = crop_to_fill(src.width, src.height);
        debug!(
            "缩略图: 源 {}x{} {}, 缩放系数 {:.4}, 偏移 ({:.1}, {:.1})",
            src.width, src.height, src.format, transform.a, transform.c, transform.f
        );

        let bpp = src.format.bytes_per_pixel();
        let linesize = THUMBNAIL_WIDTH as usize * bpp;
        let mut scaled = vec![0u8; linesize * THUMBNAIL_HEIGHT as usize];
        transform_packed(
            &src.plane(),
            &mut scaled,
            linesize,
            THUMBNAIL_WIDTH,
            THUMBNAIL_HEIGHT,
            &transform,
            algorithm,
        )?;

        let pixels = pack_bgr555(
            &scaled,
            linesize,
            THUMBNAIL_WIDTH,
            THUMBNAIL_HEIGHT,
            src.format,
        )?;
        Ok(Self { pixels })
    }

    /// 从已序列化的 98304 字节恢复
    pub fn from_bytes(data: &[u8]) -> DpgResult<Self> {
        if data.len() != THUMBNAIL_SIZE as usize {
            return Err(DpgError::InvalidData(format!(
                "缩略图应为 {} 字节, 实际 {} 字节",
                THUMBNAIL_SIZE,
                data.len()
            )));
        }
        let pixels = data
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(Self { pixels })
    }

    /// 全部像素 (行优先)
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// `(x, y)` 处的像素, 坐标超出 256x192 时返回 `None`
    pub fn pixel(&self, x: u32, y: u32) -> Option<u16> {
        if x >= THUMBNAIL_WIDTH || y >= THUMBNAIL_HEIGHT {
            return None;
        }
        self.pixels.get((y * THUMBNAIL_WIDTH + x) as usize).copied()
    }

    /// 序列化为 BGR555 小端
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
    }

    /// 展开为 RGB24, 用于导出预览
    pub fn to_rgb24(&self) -> Vec<u8> {
        unpack_bgr555(&self.pixels)
    }
}
