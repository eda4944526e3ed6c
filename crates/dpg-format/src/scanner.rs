//! 视频基本流扫描器.
//!
//! 不做完整解封装, 只查找 MPEG-1 视频的两种 4 字节起始码:
//! - 序列起始码 `00 00 01 B3`: 标记一个 GOP 的开始
//! - 图像起始码 `00 00 01 00`: 标记一帧的开始
//!
//! 上游编码器以固定关键帧间隔 (默认每 GOP 10 帧) 输出码流,
//! 该间隔不写在码流里, 因此作为扫描器参数传入, 必须与编码配置一致.
//!
//! 扫描规则:
//! 1. 每遇到一个序列起始码, 记录 GOP 条目 `(当前帧数, 起始码偏移)` (仅 DPG2+)
//! 2. 其后最多计数 `pictures_per_group` 个图像起始码;
//!    遇到下一个序列起始码或流末尾时提前结束, 不视为错误
//! 3. 第一个序列起始码之前的图像起始码, 以及超出每 GOP 上限的图像起始码不计数
//!
//! 扫描为单次顺序读取, 以 32 KB 为块处理, 跨块的起始码同样能被识别.

use log::{debug, trace};

use dpg_core::{DpgError, DpgResult, DpgVersion};

use crate::gop::GopIndex;
use crate::io::IoContext;

/// 序列起始码 `00 00 01 B3`
pub const SEQUENCE_START_CODE: u32 = 0x0000_01B3;

/// 图像起始码 `00 00 01 00`
pub const PICTURE_START_CODE: u32 = 0x0000_0100;

/// 默认每 GOP 图像数, 对应编码器的 keyint=10
pub const DEFAULT_PICTURES_PER_GROUP: u32 = 10;

/// 扫描块大小
const SCAN_CHUNK_SIZE: usize = 32 * 1024;

/// 扫描结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// 总帧数 (> 0)
    pub frame_count: u32,
    /// GOP 索引, 仅 DPG2 及以上版本生成
    pub gop_index: Option<GopIndex>,
    /// 找到的序列起始码数量
    pub sequence_count: u32,
    /// 扫描的总字节数 (即视频基本流大小)
    pub bytes_scanned: u64,
}

impl ScanResult {
    /// GOP 索引序列化后的字节数, 无索引时为 0
    pub fn gop_index_size(&self) -> u64 {
        self.gop_index.as_ref().map_or(0, GopIndex::byte_size)
    }
}

/// 视频基本流扫描器
#[derive(Debug, Clone)]
pub struct StreamScanner {
    /// 目标 DPG 版本 (决定是否生成 GOP 索引)
    version: DpgVersion,
    /// 每 GOP 最多计数的图像数
    pictures_per_group: u32,
}

impl StreamScanner {
    /// 创建扫描器, 使用默认的每 GOP 图像数
    pub fn new(version: DpgVersion) -> Self {
        Self {
            version,
            pictures_per_group: DEFAULT_PICTURES_PER_GROUP,
        }
    }

    /// 设置每 GOP 图像数 (必须与编码器关键帧间隔一致)
    pub fn with_pictures_per_group(mut self, pictures_per_group: u32) -> Self {
        self.pictures_per_group = pictures_per_group;
        self
    }

    /// 扫描文件
    pub fn scan_file(&self, path: impl AsRef<std::path::Path>) -> DpgResult<ScanResult> {
        let mut io = IoContext::open_read(path)?;
        self.scan(&mut io)
    }

    /// 扫描内存中的码流
    pub fn scan_bytes(&self, data: &[u8]) -> DpgResult<ScanResult> {
        let mut io = IoContext::from_bytes(data.to_vec());
        self.scan(&mut io)
    }

    /// 从当前读取位置扫描到流末尾
    ///
    /// 未找到任何帧时返回 [`DpgError::ScanFailure`].
    pub fn scan(&self, io: &mut IoContext) -> DpgResult<ScanResult> {
        if self.pictures_per_group == 0 {
            return Err(DpgError::InvalidArgument(
                "每 GOP 图像数必须大于 0".into(),
            ));
        }

        let mut state = ScanState::new(self.version.has_gop_index());
        let mut chunk = vec![0u8; SCAN_CHUNK_SIZE];
        loop {
            let n = io.read_some(&mut chunk)?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                state.feed(byte, self.pictures_per_group);
            }
        }

        debug!(
            "扫描完成: {} 字节, {} 个序列, {} 帧",
            state.position, state.sequence_count, state.frame_count,
        );

        if state.frame_count == 0 {
            return Err(DpgError::ScanFailure(format!(
                "{} 字节的视频流中未找到有效帧 (序列起始码 {} 个)",
                state.position, state.sequence_count,
            )));
        }

        Ok(ScanResult {
            frame_count: state.frame_count,
            gop_index: state.gop_index,
            sequence_count: state.sequence_count,
            bytes_scanned: state.position,
        })
    }
}

/// 逐字节扫描状态
struct ScanState {
    /// 最近 4 个字节 (大端拼接)
    window: u32,
    /// 已消费的字节数
    position: u64,
    /// 是否已进入某个 GOP
    in_group: bool,
    /// 当前 GOP 已计数的图像数
    group_pictures: u32,
    frame_count: u32,
    sequence_count: u32,
    gop_index: Option<GopIndex>,
}

impl ScanState {
    fn new(with_index: bool) -> Self {
        Self {
            window: 0xFFFF_FFFF,
            position: 0,
            in_group: false,
            group_pictures: 0,
            frame_count: 0,
            sequence_count: 0,
            gop_index: with_index.then(GopIndex::new),
        }
    }

    #[inline]
    fn feed(&mut self, byte: u8, pictures_per_group: u32) {
        self.window = (self.window << 8) | u32::from(byte);
        self.position += 1;

        // 初始窗口全为 0xFF, 前 3 个字节不可能凑出起始码
        match self.window {
            SEQUENCE_START_CODE => {
                let offset = self.position - 4;
                trace!("序列起始码 @ {}, 已计 {} 帧", offset, self.frame_count);
                if let Some(index) = self.gop_index.as_mut() {
                    index.push(self.frame_count, offset);
                }
                self.sequence_count += 1;
                self.in_group = true;
                self.group_pictures = 0;
            }
            PICTURE_START_CODE => {
                if self.in_group && self.group_pictures < pictures_per_group {
                    self.frame_count += 1;
                    self.group_pictures += 1;
                }
            }
            _ => {}
        }
    }
}
