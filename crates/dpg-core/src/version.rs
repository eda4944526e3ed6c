//! DPG 格式版本定义.
//!
//! DPG 共有 0-4 五个版本, 各版本的头部长度和附加块不同:
//!
//! | 版本 | 头部长度 | GOP 索引 | 像素格式字段 | 缩略图 |
//! |------|----------|----------|--------------|--------|
//! | 0    | 36       | 否       | 否           | 否     |
//! | 1    | 40       | 否       | 是           | 否     |
//! | 2, 3 | 48       | 是       | 是           | 否     |
//! | 4    | 98356    | 是       | 是           | 是     |

use std::fmt;

use crate::error::{DpgError, DpgResult};

/// 所有版本共有的基础字段长度 (magic 到 video_size)
pub const BASE_FIELDS_LEN: u32 = 36;

/// 缩略图宽度 (像素)
pub const THUMBNAIL_WIDTH: u32 = 256;

/// 缩略图高度 (像素)
pub const THUMBNAIL_HEIGHT: u32 = 192;

/// 缩略图块字节数 (每像素 2 字节)
pub const THUMBNAIL_SIZE: u32 = THUMBNAIL_WIDTH * THUMBNAIL_HEIGHT * 2;

/// DPG 格式版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DpgVersion {
    /// DPG0: 仅基础字段
    V0,
    /// DPG1: 基础字段 + 像素格式
    V1,
    /// DPG2: 增加 GOP 索引
    V2,
    /// DPG3: 头部布局与 DPG2 相同
    V3,
    /// DPG4: 增加 256x192 缩略图
    #[default]
    V4,
}

impl DpgVersion {
    /// 全部版本, 按版本号升序
    pub const ALL: [DpgVersion; 5] = [Self::V0, Self::V1, Self::V2, Self::V3, Self::V4];

    /// 版本号 (0-4)
    pub const fn number(&self) -> u8 {
        match self {
            Self::V0 => 0,
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
        }
    }

    /// 文件头魔数: `"DPG"` + 版本数字字符
    pub const fn magic(&self) -> [u8; 4] {
        [b'D', b'P', b'G', b'0' + self.number()]
    }

    /// 基础头部长度, 即音频块的起始偏移
    ///
    /// 只取决于版本号, 与帧数、载荷大小和缩略图内容无关.
    /// DPG4 的长度包含固定大小的缩略图块.
    pub const fn base_header_len(&self) -> u32 {
        match self {
            Self::V0 => BASE_FIELDS_LEN,
            Self::V1 => BASE_FIELDS_LEN + 4,
            Self::V2 | Self::V3 => BASE_FIELDS_LEN + 12,
            Self::V4 => BASE_FIELDS_LEN + 16 + THUMBNAIL_SIZE,
        }
    }

    /// 是否带有 GOP 索引 (video_end_offset 与 gop_index_size 字段)
    pub const fn has_gop_index(&self) -> bool {
        matches!(self, Self::V2 | Self::V3 | Self::V4)
    }

    /// 是否写入像素格式字段
    pub const fn has_pixel_format(&self) -> bool {
        !matches!(self, Self::V0)
    }

    /// 是否带有缩略图块
    pub const fn has_thumbnail(&self) -> bool {
        matches!(self, Self::V4)
    }

    /// 从文件头魔数识别版本
    pub fn from_magic(magic: &[u8; 4]) -> DpgResult<Self> {
        if &magic[..3] != b"DPG" {
            return Err(DpgError::InvalidData(format!(
                "不是 DPG 文件, 魔数: {:02X?}",
                magic
            )));
        }
        match magic[3].checked_sub(b'0') {
            Some(n) => Self::try_from(u32::from(n)),
            None => Err(DpgError::InvalidData(format!(
                "DPG 版本字符无效: 0x{:02X}",
                magic[3]
            ))),
        }
    }
}

impl TryFrom<u32> for DpgVersion {
    type Error = DpgError;

    fn try_from(value: u32) -> DpgResult<Self> {
        match value {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            4 => Ok(Self::V4),
            other => Err(DpgError::InvalidVersion(other)),
        }
    }
}

impl fmt::Display for DpgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DPG{}", self.number())
    }
}
