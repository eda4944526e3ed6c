//! 像素格式定义.
//!
//! 只包含 DPG 处理链路会接触到的打包格式:
//! 缩略图源图像 (RGB24 / RGBA) 与 DPG 缩略图/视频输出 (BGR555).

use std::fmt;

/// 像素格式
///
/// 所有格式均为单平面打包格式.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// RGB 各 8 位, 打包 (24 bpp)
    Rgb24,
    /// RGBA 各 8 位, 打包 (32 bpp), alpha 不参与缩略图计算
    Rgba,
    /// 16 位小端: 最高位固定为 1, 其后 5 位 B, 5 位 G, 5 位 R
    ///
    /// ```text
    /// bit 15 | 14..10 | 9..5 | 4..0
    ///   1    |   B    |  G   |  R
    /// ```
    Bgr555le,
}

impl PixelFormat {
    /// 每像素字节数
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Rgba => 4,
            Self::Bgr555le => 2,
        }
    }

    /// DPG 头部 pixel_format 字段中使用的格式码
    ///
    /// 只有 BGR555 可以作为 DPG 视频/缩略图输出格式.
    pub const fn dpg_code(&self) -> Option<i32> {
        match self {
            Self::Bgr555le => Some(3),
            _ => None,
        }
    }

    /// 计算每行字节数 (linesize / stride)
    pub fn linesize(&self, width: u32) -> usize {
        width as usize * self.bytes_per_pixel()
    }

    /// 计算整帧字节数
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        self.linesize(width) * height as usize
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb24 => "rgb24",
            Self::Rgba => "rgba",
            Self::Bgr555le => "bgr555le",
        };
        write!(f, "{name}")
    }
}
