//! DPG 文件头.
//!
//! 头部布局 (除特别注明外均为小端):
//!
//! ```text
//! 偏移  字段               类型
//! 0     magic              "DPG0".."DPG4"
//! 4     frame_count        int32
//! 8     frame_rate         int16 大端
//! 10    reserved (0)       int16 大端
//! 12    sample_rate        int32
//! 16    reserved (0)       int32
//! 20    audio_offset       int32
//! 24    audio_size         int32
//! 28    video_offset       int32
//! 32    video_size         int32
//! 36    video_end_offset   int32   DPG2+
//! 40    gop_index_size     int32   DPG2+
//! 44/36 pixel_format (3)   int32   DPG1+
//! 48    "THM0"             tag     DPG4
//! ```
//!
//! frame_rate 和其后的保留字段是大端, 与现有播放器保持兼容.
//!
//! audio_offset 等于版本对应的基础头部长度, 只由版本决定,
//! 所以在写入载荷之前就能算出所有偏移.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use log::debug;

use dpg_core::version::THUMBNAIL_SIZE;
use dpg_core::{DpgError, DpgResult, DpgVersion, PixelFormat};

use crate::gop::to_i32;
use crate::io::IoContext;

/// DPG 视频/缩略图使用的像素格式
pub const DPG_PIXEL_FORMAT: PixelFormat = PixelFormat::Bgr555le;

/// 缩略图块前的标签
pub const THUMBNAIL_TAG: [u8; 4] = *b"THM0";

/// 构造头部所需的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderParams {
    /// 目标版本
    pub version: DpgVersion,
    /// 总帧数, 必须大于 0
    pub frame_count: u32,
    /// 帧率 (fps)
    pub frame_rate: u32,
    /// 音频采样率 (Hz)
    pub sample_rate: u32,
    /// 音频基本流字节数
    pub audio_size: u64,
    /// 视频基本流字节数
    pub video_size: u64,
    /// GOP 索引字节数 (DPG0/1 必须为 0)
    pub gop_index_size: u64,
}

/// DPG 文件头 (容器描述)
///
/// 由 [`DpgHeader::new`] 计算得到后不再修改.
/// 所有偏移和大小都已保证可以写入 int32 字段.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpgHeader {
    pub version: DpgVersion,
    pub frame_count: u32,
    pub frame_rate: u16,
    pub sample_rate: u32,
    pub audio_offset: u32,
    pub audio_size: u32,
    pub video_offset: u32,
    pub video_size: u32,
    /// 仅 DPG2+ 有意义
    pub video_end_offset: u32,
    /// 仅 DPG2+ 有意义
    pub gop_index_size: u32,
    /// DPG1+ 写入的像素格式码
    pub pixel_format: Option<i32>,
}

impl DpgHeader {
    /// 根据参数计算完整的头部
    ///
    /// audio_offset 取版本的基础头部长度, video_offset = audio_offset + audio_size.
    pub fn new(params: &HeaderParams) -> DpgResult<Self> {
        let version = params.version;
        if params.frame_count == 0 {
            return Err(DpgError::InvalidArgument("帧数必须大于 0".into()));
        }
        if params.frame_rate == 0 || params.frame_rate > i16::MAX as u32 {
            return Err(DpgError::InvalidArgument(format!(
                "帧率超出 int16 范围: {}",
                params.frame_rate
            )));
        }
        if params.sample_rate == 0 {
            return Err(DpgError::InvalidArgument("采样率必须大于 0".into()));
        }
        if !version.has_gop_index() && params.gop_index_size != 0 {
            return Err(DpgError::InvalidArgument(format!(
                "{} 不包含 GOP 索引, 但 gop_index_size = {}",
                version, params.gop_index_size
            )));
        }

        let audio_offset = u64::from(version.base_header_len());
        let video_offset = audio_offset + params.audio_size;
        let video_end_offset = video_offset + params.video_size;

        // 所有字段必须能写入 int32
        to_i32(u64::from(params.frame_count), "帧数")?;
        to_i32(u64::from(params.sample_rate), "采样率")?;
        to_i32(params.gop_index_size, "GOP 索引大小")?;
        to_i32(video_end_offset, "视频结束偏移")?;

        let header = Self {
            version,
            frame_count: params.frame_count,
            frame_rate: params.frame_rate as u16,
            sample_rate: params.sample_rate,
            audio_offset: audio_offset as u32,
            audio_size: params.audio_size as u32,
            video_offset: video_offset as u32,
            video_size: params.video_size as u32,
            video_end_offset: video_end_offset as u32,
            gop_index_size: params.gop_index_size as u32,
            pixel_format: if version.has_pixel_format() {
                DPG_PIXEL_FORMAT.dpg_code()
            } else {
                None
            },
        };
        debug!(
            "{} 头部: {} 帧, {} fps, {} Hz, 音频 {}+{}, 视频 {}+{}, GOP {}",
            version,
            header.frame_count,
            header.frame_rate,
            header.sample_rate,
            header.audio_offset,
            header.audio_size,
            header.video_offset,
            header.video_size,
            header.gop_index_size,
        );
        Ok(header)
    }

    /// 头部字段部分的序列化长度 (不含缩略图像素数据)
    pub fn encoded_len(&self) -> u32 {
        if self.version.has_thumbnail() {
            self.version.base_header_len() - THUMBNAIL_SIZE
        } else {
            self.version.base_header_len()
        }
    }

    /// 是否带缩略图块
    pub fn has_thumbnail(&self) -> bool {
        self.version.has_thumbnail()
    }

    /// 完整 DPG 文件应有的字节数
    pub fn file_len(&self) -> u64 {
        if self.version.has_gop_index() {
            u64::from(self.video_end_offset) + u64::from(self.gop_index_size)
        } else {
            u64::from(self.video_offset) + u64::from(self.video_size)
        }
    }

    /// 播放时长 (秒)
    pub fn duration_secs(&self) -> f64 {
        if self.frame_rate == 0 {
            return 0.0;
        }
        f64::from(self.frame_count) / f64::from(self.frame_rate)
    }

    /// 序列化头部字段
    pub fn to_bytes(&self) -> DpgResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.extend_from_slice(&self.version.magic());
        buf.write_i32::<LittleEndian>(self.frame_count as i32)?;
        buf.write_i16::<BigEndian>(self.frame_rate as i16)?;
        buf.write_i16::<BigEndian>(0)?;
        buf.write_i32::<LittleEndian>(self.sample_rate as i32)?;
        buf.write_i32::<LittleEndian>(0)?;
        buf.write_i32::<LittleEndian>(self.audio_offset as i32)?;
        buf.write_i32::<LittleEndian>(self.audio_size as i32)?;
        buf.write_i32::<LittleEndian>(self.video_offset as i32)?;
        buf.write_i32::<LittleEndian>(self.video_size as i32)?;

        if self.version.has_gop_index() {
            buf.write_i32::<LittleEndian>(self.video_end_offset as i32)?;
            buf.write_i32::<LittleEndian>(self.gop_index_size as i32)?;
        }
        if let Some(code) = self.pixel_format {
            buf.write_i32::<LittleEndian>(code)?;
        }
        if self.version.has_thumbnail() {
            buf.extend_from_slice(&THUMBNAIL_TAG);
        }

        debug_assert_eq!(buf.len(), self.encoded_len() as usize);
        Ok(buf)
    }

    /// 写入头部字段
    pub fn write(&self, io: &mut IoContext) -> DpgResult<()> {
        io.write_all(&self.to_bytes()?)
    }

    /// 从文件开头解析头部字段
    ///
    /// 只做格式层面的检查, 偏移之间的一致性由 [`DpgHeader::validate`] 检查.
    /// 对 DPG4, 读取结束时位于缩略图像素数据之前.
    pub fn read(io: &mut IoContext) -> DpgResult<Self> {
        let magic = io.read_tag()?;
        let version = DpgVersion::from_magic(&magic)?;

        let frame_count = read_u31(io, "frame_count")?;
        let frame_rate = io.read_i16_be()?;
        if frame_rate < 0 {
            return Err(DpgError::InvalidData(format!("帧率为负: {}", frame_rate)));
        }
        let _reserved = io.read_i16_be()?;
        let sample_rate = read_u31(io, "sample_rate")?;
        let _reserved = io.read_i32_le()?;
        let audio_offset = read_u31(io, "audio_offset")?;
        let audio_size = read_u31(io, "audio_size")?;
        let video_offset = read_u31(io, "video_offset")?;
        let video_size = read_u31(io, "video_size")?;

        let (video_end_offset, gop_index_size) = if version.has_gop_index() {
            (
                read_u31(io, "video_end_offset")?,
                read_u31(io, "gop_index_size")?,
            )
        } else {
            (video_offset.saturating_add(video_size), 0)
        };

        let pixel_format = if version.has_pixel_format() {
            Some(io.read_i32_le()?)
        } else {
            None
        };

        if version.has_thumbnail() {
            let tag = io.read_tag()?;
            if tag != THUMBNAIL_TAG {
                return Err(DpgError::InvalidData(format!(
                    "缩略图标签错误: {:02X?}",
                    tag
                )));
            }
        }

        Ok(Self {
            version,
            frame_count,
            frame_rate: frame_rate as u16,
            sample_rate,
            audio_offset,
            audio_size,
            video_offset,
            video_size,
            video_end_offset,
            gop_index_size,
            pixel_format,
        })
    }

    /// 检查各偏移之间的一致性
    pub fn validate(&self) -> DpgResult<()> {
        let expected_audio = self.version.base_header_len();
        if self.audio_offset != expected_audio {
            return Err(DpgError::InvalidData(format!(
                "{} 的音频偏移应为 {}, 实际为 {}",
                self.version, expected_audio, self.audio_offset
            )));
        }
        if u64::from(self.audio_offset) + u64::from(self.audio_size)
            != u64::from(self.video_offset)
        {
            return Err(DpgError::InvalidData(format!(
                "视频偏移 {} 与音频块 {}+{} 不衔接",
                self.video_offset, self.audio_offset, self.audio_size
            )));
        }
        if u64::from(self.video_offset) + u64::from(self.video_size)
            != u64::from(self.video_end_offset)
        {
            return Err(DpgError::InvalidData(format!(
                "视频结束偏移 {} 与视频块 {}+{} 不一致",
                self.video_end_offset, self.video_offset, self.video_size
            )));
        }
        if self.frame_count == 0 {
            return Err(DpgError::InvalidData("帧数为 0".into()));
        }
        match self.pixel_format {
            Some(code) if Some(code) != DPG_PIXEL_FORMAT.dpg_code() => {
                Err(DpgError::Unsupported(format!("像素格式码 {}", code)))
            }
            _ => Ok(()),
        }
    }
}

/// 读取一个非负 int32 小端字段
fn read_u31(io: &mut IoContext, field: &str) -> DpgResult<u32> {
    let v = io.read_i32_le()?;
    u32::try_from(v).map_err(|_| DpgError::InvalidData(format!("{} 为负: {}", field, v)))
}
