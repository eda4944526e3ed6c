//! GOP 索引.
//!
//! DPG2 及以上版本在视频块之后追加 GOP 索引, 播放器据此快速定位.
//! 每个条目 8 字节, 两个 int32 小端:
//!
//! ```text
//! +-------------------+-------------------+
//! | frame_number (LE) | byte_offset (LE)  |
//! +-------------------+-------------------+
//! ```
//!
//! 帧号和偏移都相对于视频基本流起点, 条目按码流顺序排列.

use byteorder::{LittleEndian, WriteBytesExt};
use dpg_core::{DpgError, DpgResult};

use crate::io::IoContext;

/// 单个 GOP 条目的字节数
pub const GOP_ENTRY_SIZE: u64 = 8;

/// GOP 索引条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GopEntry {
    /// 该 GOP 第一帧的帧号 (之前已计数的帧数)
    pub frame_number: u32,
    /// 序列起始码在视频基本流中的字节偏移
    pub byte_offset: u64,
}

/// GOP 索引 (按码流顺序)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GopIndex {
    entries: Vec<GopEntry>,
}

impl GopIndex {
    /// 创建空索引
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加条目, 保持插入顺序
    pub fn push(&mut self, frame_number: u32, byte_offset: u64) {
        self.entries.push(GopEntry {
            frame_number,
            byte_offset,
        });
    }

    /// 全部条目
    pub fn entries(&self) -> &[GopEntry] {
        &self.entries
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 序列化后的字节数, 即头部 gop_index_size 字段的值
    pub fn byte_size(&self) -> u64 {
        self.entries.len() as u64 * GOP_ENTRY_SIZE
    }

    /// 序列化为磁盘格式
    pub fn to_bytes(&self) -> DpgResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.byte_size() as usize);
        for entry in &self.entries {
            buf.write_i32::<LittleEndian>(to_i32(u64::from(entry.frame_number), "GOP 帧号")?)?;
            buf.write_i32::<LittleEndian>(to_i32(entry.byte_offset, "GOP 偏移")?)?;
        }
        Ok(buf)
    }

    /// 从 I/O 读取 `size` 字节的 GOP 索引
    pub fn read(io: &mut IoContext, size: u64) -> DpgResult<Self> {
        if size % GOP_ENTRY_SIZE != 0 {
            return Err(DpgError::InvalidData(format!(
                "GOP 索引大小 {} 不是 {} 的整数倍",
                size, GOP_ENTRY_SIZE
            )));
        }
        let count = (size / GOP_ENTRY_SIZE) as usize;
        let mut index = Self {
            entries: Vec::with_capacity(count),
        };
        for i in 0..count {
            let frame_number = io.read_i32_le()?;
            let byte_offset = io.read_i32_le()?;
            if frame_number < 0 || byte_offset < 0 {
                return Err(DpgError::InvalidData(format!(
                    "GOP 条目 #{} 含负值: frame={}, offset={}",
                    i, frame_number, byte_offset
                )));
            }
            index.push(frame_number as u32, byte_offset as u64);
        }
        Ok(index)
    }

    /// 查找包含指定帧的 GOP 条目 (最后一个 frame_number <= frame 的条目)
    pub fn entry_for_frame(&self, frame: u32) -> Option<&GopEntry> {
        let idx = self.entries.partition_point(|e| e.frame_number <= frame);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }
}

/// 检查数值能否写入 int32 字段
pub(crate) fn to_i32(value: u64, field: &str) -> DpgResult<i32> {
    i32::try_from(value).map_err(|_| {
        DpgError::InvalidArgument(format!("{} 超出 int32 范围: {}", field, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_磁盘格式() {
        let mut index = GopIndex::new();
        index.push(0, 0);
        index.push(10, 0x1234);
        assert_eq!(index.byte_size(), 16);

        let bytes = index.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![
                0, 0, 0, 0, 0, 0, 0, 0, //
                10, 0, 0, 0, 0x34, 0x12, 0, 0,
            ]
        );

        let mut io = IoContext::from_bytes(bytes);
        let parsed = GopIndex::read(&mut io, 16).unwrap();
        assert_eq!(parsed, index);
    }

    #[test]
    fn test_大小非法() {
        let mut io = IoContext::from_bytes(vec![0u8; 12]);
        assert!(matches!(
            GopIndex::read(&mut io, 12),
            Err(DpgError::InvalidData(_))
        ));
    }

    #[test]
    fn test_偏移溢出() {
        let mut index = GopIndex::new();
        index.push(0, u64::from(u32::MAX));
        assert!(matches!(
            index.to_bytes(),
            Err(DpgError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_entry_for_frame() {
        let mut index = GopIndex::new();
        index.push(0, 0);
        index.push(10, 500);
        index.push(20, 900);
        assert_eq!(index.entry_for_frame(0).unwrap().byte_offset, 0);
        assert_eq!(index.entry_for_frame(15).unwrap().byte_offset, 500);
        assert_eq!(index.entry_for_frame(99).unwrap().frame_number, 20);
        assert!(GopIndex::new().entry_for_frame(3).is_none());
    }
}
