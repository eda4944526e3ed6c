//! # dpg-scale
//!
//! DPG 缩略图生成库.
//!
//! 提供:
//! - 仿射变换采样 (最近邻, 双线性, 双三次)
//! - RGB24/RGBA 到 BGR555 小端的像素打包
//! - 256x192 裁剪填充缩略图

pub mod convert;
pub mod scale;
pub mod thumbnail;

pub use scale::AffineTransform;
pub use thumbnail::{SourceImage, Thumbnail};

/// 采样算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleAlgorithm {
    /// 最近邻 (速度最快, 质量最低)
    NearestNeighbor,
    /// 双线性插值
    Bilinear,
    /// 双三次插值 (a = -0.5)
    #[default]
    Bicubic,
}
