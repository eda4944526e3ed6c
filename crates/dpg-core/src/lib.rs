//! # dpg-core
//!
//! DPG 封装工具核心库, 提供版本定义、像素格式和统一错误类型.
//!
//! 其余 crate (dpg-format, dpg-scale) 都依赖本 crate 的基础类型.

pub mod error;
pub mod pixel_format;
pub mod version;

// 重导出常用类型
pub use error::{DpgError, DpgResult};
pub use pixel_format::PixelFormat;
pub use version::DpgVersion;
