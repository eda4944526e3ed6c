//! # dpgconv
//!
//! DPG 视频容器封装库 (Nintendo DS 上 Moonshell 播放的格式).
//!
//! 输入为已经编码好的 MPEG-1 视频基本流和 MP2 音频基本流,
//! 输出为 DPG0 ~ DPG4 容器文件.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use dpgconv::pipeline::{ConvertJob, ConvertOptions, Converter};
//!
//! let converter = Converter::new(ConvertOptions::default()).unwrap();
//! let job = ConvertJob::new("movie.mpg", "movie.mp2")
//!     .with_thumbnail(dpgconv::scale::SourceImage::solid(256, 192, [0, 0, 0]).unwrap());
//! let report = converter.convert(&job).unwrap();
//! println!("{} 帧, {:.1} 秒", report.frame_count, report.duration_secs);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `dpg-core` | 错误类型, 版本, 像素格式 |
//! | `dpg-format` | 码流扫描, 头部, GOP 索引, 封装与探测 |
//! | `dpg-scale` | 缩略图缩放与 BGR555 打包 |

/// 核心类型
pub use dpg_core as core;

/// 容器格式
pub use dpg_format as format;

/// 缩略图生成
pub use dpg_scale as scale;

pub mod pipeline;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
