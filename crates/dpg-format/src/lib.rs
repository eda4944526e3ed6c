//! # dpg-format
//!
//! DPG 容器格式库.
//!
//! 负责 MPEG-1 视频基本流的扫描 (帧数与 GOP 索引),
//! 头部的计算与序列化, 以及按版本顺序封装各数据块.

pub mod gop;
pub mod header;
pub mod io;
pub mod muxer;
pub mod probe;
pub mod scanner;

// 重导出常用类型
pub use gop::{GopEntry, GopIndex};
pub use header::{DpgHeader, HeaderParams};
pub use io::IoContext;
pub use muxer::{ContainerParts, DpgMuxer, write_dpg_file};
pub use probe::{DpgInfo, probe_file};
pub use scanner::{ScanResult, StreamScanner};
