//! DPG 文件探测.
//!
//! 读取已有 DPG 文件的头部, 校验各块偏移与文件长度,
//! 并在 DPG2+ 文件中读出 GOP 索引.

use std::io::SeekFrom;
use std::path::Path;

use log::debug;

use dpg_core::{DpgError, DpgResult};

use crate::gop::GopIndex;
use crate::header::DpgHeader;
use crate::io::IoContext;

/// 探测结果
#[derive(Debug, Clone)]
pub struct DpgInfo {
    /// 解析出的头部
    pub header: DpgHeader,
    /// 实际文件大小
    pub file_size: u64,
    /// DPG2+ 的 GOP 索引
    pub gop_index: Option<GopIndex>,
}

impl DpgInfo {
    /// 文件长度是否与头部描述一致
    pub fn is_complete(&self) -> bool {
        self.file_size == self.header.file_len()
    }
}

/// 探测文件
pub fn probe_file(path: impl AsRef<Path>) -> DpgResult<DpgInfo> {
    let mut io = IoContext::open_read(path)?;
    probe(&mut io)
}

/// 从 IoContext 探测
///
/// 文件被截断时不报错, 由 [`DpgInfo::is_complete`] 反映;
/// 头部字段自相矛盾时返回 `InvalidData`.
pub fn probe(io: &mut IoContext) -> DpgResult<DpgInfo> {
    let header = DpgHeader::read(io)?;
    header.validate()?;

    let file_size = match io.size() {
        Some(size) => size,
        None => io.seek(SeekFrom::End(0))?,
    };
    debug!(
        "探测到 {}: 头部描述 {} 字节, 实际 {} 字节",
        header.version,
        header.file_len(),
        file_size
    );

    let gop_index = if header.version.has_gop_index() {
        let start = u64::from(header.video_end_offset);
        let size = u64::from(header.gop_index_size);
        if start + size > file_size {
            None
        } else {
            io.seek(SeekFrom::Start(start))?;
            Some(GopIndex::read(io, size)?)
        }
    } else {
        None
    };

    Ok(DpgInfo {
        header,
        file_size,
        gop_index,
    })
}

/// 读取 DPG4 文件中的缩略图数据 (BGR555 小端, 256x192)
pub fn read_thumbnail(io: &mut IoContext, header: &DpgHeader) -> DpgResult<Vec<u8>> {
    if !header.has_thumbnail() {
        return Err(DpgError::Unsupported(format!(
            "{} 不包含缩略图",
            header.version
        )));
    }
    io.seek(SeekFrom::Start(u64::from(header.encoded_len())))?;
    io.read_bytes(dpg_core::version::THUMBNAIL_SIZE as usize)
}
