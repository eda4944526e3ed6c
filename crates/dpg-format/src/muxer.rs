//! DPG 封装器.
//!
//! 按版本规定的顺序拼接各数据块, 块之间没有填充:
//!
//! | 版本 | 顺序 |
//! |------|------|
//! | 4    | 头部, 缩略图, 音频, 视频, GOP 索引 |
//! | 2, 3 | 头部, 音频, 视频, GOP 索引 |
//! | 0, 1 | 头部, 音频, 视频 |
//!
//! 写入流程:
//! 1. `write_header()` - 写入头部字段 (DPG4 连同缩略图)
//! 2. `write_audio()` / `write_video()` - 原样复制基本流
//! 3. `write_trailer()` - 写入 GOP 索引并校验总长度
//!
//! 头部里的偏移在写入前已经算好, 封装器逐块核对实际写入的字节数,
//! 保证最终文件长度等于 `video_end_offset + gop_index_size` (DPG2+)
//! 或 `video_offset + video_size` (DPG0/1).

use std::path::Path;

use log::{debug, info};

use dpg_core::version::THUMBNAIL_SIZE;
use dpg_core::{DpgError, DpgResult};

use crate::gop::GopIndex;
use crate::header::DpgHeader;
use crate::io::IoContext;

/// 封装阶段, 保证各块按顺序写入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Audio,
    Video,
    Trailer,
    Done,
}

/// DPG 封装器
pub struct DpgMuxer {
    header: DpgHeader,
    stage: Stage,
    /// 已写入的总字节数
    written: u64,
}

impl DpgMuxer {
    /// 以已计算好的头部创建封装器
    pub fn new(header: DpgHeader) -> Self {
        Self {
            header,
            stage: Stage::Header,
            written: 0,
        }
    }

    /// 已写入的字节数
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    fn expect_stage(&self, stage: Stage) -> DpgResult<()> {
        if self.stage != stage {
            return Err(DpgError::InvalidArgument(format!(
                "封装顺序错误: 期望 {:?}, 当前 {:?}",
                stage, self.stage
            )));
        }
        Ok(())
    }

    /// 写入头部; DPG4 必须同时提供 256x192 缩略图数据
    pub fn write_header(&mut self, io: &mut IoContext, thumbnail: Option<&[u8]>) -> DpgResult<()> {
        self.expect_stage(Stage::Header)?;

        match (self.header.has_thumbnail(), thumbnail) {
            (true, None) => {
                return Err(DpgError::ThumbnailSourceMissing(format!(
                    "{} 需要缩略图",
                    self.header.version
                )));
            }
            (true, Some(data)) if data.len() != THUMBNAIL_SIZE as usize => {
                return Err(DpgError::InvalidArgument(format!(
                    "缩略图应为 {} 字节, 实际 {} 字节",
                    THUMBNAIL_SIZE,
                    data.len()
                )));
            }
            (false, Some(_)) => {
                return Err(DpgError::InvalidArgument(format!(
                    "{} 不包含缩略图",
                    self.header.version
                )));
            }
            _ => {}
        }

        let bytes = self.header.to_bytes()?;
        io.write_all(&bytes)?;
        self.written += bytes.len() as u64;
        if let Some(data) = thumbnail {
            io.write_all(data)?;
            self.written += data.len() as u64;
        }

        self.check_offset(u64::from(self.header.audio_offset), "音频")?;
        self.stage = Stage::Audio;
        Ok(())
    }

    /// 复制音频基本流
    pub fn write_audio(&mut self, io: &mut IoContext, audio: &mut IoContext) -> DpgResult<()> {
        self.expect_stage(Stage::Audio)?;
        let copied = io.copy_from(audio)?;
        self.written += copied;
        debug!("DPG 写入音频: {} 字节", copied);
        self.check_offset(u64::from(self.header.video_offset), "视频")?;
        self.stage = Stage::Video;
        Ok(())
    }

    /// 复制视频基本流
    pub fn write_video(&mut self, io: &mut IoContext, video: &mut IoContext) -> DpgResult<()> {
        self.expect_stage(Stage::Video)?;
        let copied = io.copy_from(video)?;
        self.written += copied;
        debug!("DPG 写入视频: {} 字节", copied);
        let video_end = u64::from(self.header.video_offset) + u64::from(self.header.video_size);
        self.check_offset(video_end, "GOP 索引")?;
        self.stage = Stage::Trailer;
        Ok(())
    }

    /// 写入 GOP 索引 (DPG2+) 并校验文件总长度
    pub fn write_trailer(
        &mut self,
        io: &mut IoContext,
        gop_index: Option<&GopIndex>,
    ) -> DpgResult<()> {
        self.expect_stage(Stage::Trailer)?;

        match (self.header.version.has_gop_index(), gop_index) {
            (true, Some(index)) => {
                if index.byte_size() != u64::from(self.header.gop_index_size) {
                    return Err(DpgError::InvalidArgument(format!(
                        "GOP 索引大小 {} 与头部记录的 {} 不一致",
                        index.byte_size(),
                        self.header.gop_index_size
                    )));
                }
                let bytes = index.to_bytes()?;
                io.write_all(&bytes)?;
                self.written += bytes.len() as u64;
            }
            (true, None) => {
                return Err(DpgError::InvalidArgument(format!(
                    "{} 需要 GOP 索引",
                    self.header.version
                )));
            }
            (false, Some(_)) => {
                return Err(DpgError::InvalidArgument(format!(
                    "{} 不包含 GOP 索引",
                    self.header.version
                )));
            }
            (false, None) => {}
        }

        io.flush()?;
        self.check_offset(self.header.file_len(), "文件末尾")?;
        debug!("DPG 写入尾部: 共 {} 字节", self.written);
        self.stage = Stage::Done;
        Ok(())
    }

    /// 核对已写入的字节数与头部记录的下一块偏移
    fn check_offset(&self, expected: u64, block: &str) -> DpgResult<()> {
        if self.written != expected {
            return Err(DpgError::InvalidData(format!(
                "{}起始偏移应为 {}, 实际已写入 {} 字节",
                block, expected, self.written
            )));
        }
        Ok(())
    }
}

/// 封装一个 DPG 文件所需的全部输入
#[derive(Debug, Clone, Copy)]
pub struct ContainerParts<'a> {
    /// 已计算好的头部
    pub header: &'a DpgHeader,
    /// DPG4 缩略图 (98304 字节)
    pub thumbnail: Option<&'a [u8]>,
    /// 音频基本流文件
    pub audio_path: &'a Path,
    /// 视频基本流文件
    pub video_path: &'a Path,
    /// DPG2+ 的 GOP 索引
    pub gop_index: Option<&'a GopIndex>,
    /// 允许替换已存在的输出文件
    pub overwrite: bool,
}

/// 将各数据块写入 `output`, 返回文件字节数
///
/// 先写入同目录下的临时文件, 全部校验通过后再重命名为目标文件;
/// 任何一步失败都不会留下不完整的输出.
/// `overwrite` 为 false 时重命名不会替换已存在的文件,
/// 即使该文件是在写入过程中才出现的.
pub fn write_dpg_file(output: &Path, parts: &ContainerParts<'_>) -> DpgResult<u64> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(".dpg-")
        .suffix(".part")
        .tempfile_in(dir)?;

    let mut io = IoContext::from_file(tmp.as_file().try_clone()?);
    let mut audio = IoContext::open_read(parts.audio_path)?;
    let mut video = IoContext::open_read(parts.video_path)?;

    let mut muxer = DpgMuxer::new(parts.header.clone());
    muxer.write_header(&mut io, parts.thumbnail)?;
    muxer.write_audio(&mut io, &mut audio)?;
    muxer.write_video(&mut io, &mut video)?;
    muxer.write_trailer(&mut io, parts.gop_index)?;
    drop(io);

    tmp.as_file().sync_all()?;
    let persisted = if parts.overwrite {
        tmp.persist(output)
    } else {
        tmp.persist_noclobber(output)
    };
    persisted.map_err(|e| match e.error.kind() {
        std::io::ErrorKind::AlreadyExists => DpgError::InvalidArgument(format!(
            "输出文件已存在 '{}', 使用 -y 覆盖",
            output.display()
        )),
        _ => DpgError::Io(e.error),
    })?;

    let written = muxer.bytes_written();
    info!("已写入 {}: {} 字节", output.display(), written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderParams;
    use dpg_core::DpgVersion;

    fn make_header(version: DpgVersion, audio: usize, video: usize, gop: &GopIndex) -> DpgHeader {
        DpgHeader::new(&HeaderParams {
            version,
            frame_count: 10,
            frame_rate: 15,
            sample_rate: 32000,
            audio_size: audio as u64,
            video_size: video as u64,
            gop_index_size: if version.has_gop_index() {
                gop.byte_size()
            } else {
                0
            },
        })
        .unwrap()
    }

    fn mux_to_memory(
        version: DpgVersion,
        thumbnail: Option<&[u8]>,
        audio: &[u8],
        video: &[u8],
        gop: &GopIndex,
    ) -> Vec<u8> {
        let header = make_header(version, audio.len(), video.len(), gop);
        let mut io = IoContext::memory();
        let mut muxer = DpgMuxer::new(header);
        muxer.write_header(&mut io, thumbnail).unwrap();
        muxer
            .write_audio(&mut io, &mut IoContext::from_bytes(audio.to_vec()))
            .unwrap();
        muxer
            .write_video(&mut io, &mut IoContext::from_bytes(video.to_vec()))
            .unwrap();
        let index = version.has_gop_index().then_some(gop);
        muxer.write_trailer(&mut io, index).unwrap();

        io.seek(std::io::SeekFrom::Start(0)).unwrap();
        io.read_to_end().unwrap()
    }

    fn sample_gop() -> GopIndex {
        let mut gop = GopIndex::new();
        gop.push(0, 0);
        gop
    }

    #[test]
    fn test_dpg0_音频紧跟头部() {
        let out = mux_to_memory(DpgVersion::V0, None, b"AUDIO", b"VIDEO!", &sample_gop());
        assert_eq!(out.len(), 36 + 5 + 6);
        assert_eq!(&out[36..41], b"AUDIO");
        assert_eq!(&out[41..], b"VIDEO!");
    }

    #[test]
    fn test_dpg4_块顺序() {
        let mut thumb = vec![0u8; THUMBNAIL_SIZE as usize];
        thumb[..4].copy_from_slice(b"TMB!");
        let gop = sample_gop();
        let out = mux_to_memory(DpgVersion::V4, Some(&thumb), b"AA", b"VVV", &gop);

        assert_eq!(&out[48..52], b"THM0");
        assert_eq!(&out[52..56], b"TMB!");
        assert_eq!(&out[98356..98358], b"AA");
        assert_eq!(&out[98358..98361], b"VVV");
        assert_eq!(&out[98361..], &gop.to_bytes().unwrap()[..]);
    }

    #[test]
    fn test_文件长度_全部版本() {
        let gop = sample_gop();
        let thumb = vec![0u8; THUMBNAIL_SIZE as usize];
        for version in DpgVersion::ALL {
            let t = version.has_thumbnail().then_some(thumb.as_slice());
            let out = mux_to_memory(version, t, &[1; 100], &[2; 333], &gop);
            let header = make_header(version, 100, 333, &gop);
            assert_eq!(out.len() as u64, header.file_len(), "{version}");

            let mut io = IoContext::from_bytes(out);
            assert_eq!(DpgHeader::read(&mut io).unwrap(), header);
        }
    }

    #[test]
    fn test_缺少缩略图() {
        let header = make_header(DpgVersion::V4, 1, 1, &sample_gop());
        let mut muxer = DpgMuxer::new(header);
        let err = muxer
            .write_header(&mut IoContext::memory(), None)
            .unwrap_err();
        assert!(matches!(err, DpgError::ThumbnailSourceMissing(_)));
    }

    #[test]
    fn test_音频大小变化() {
        let header = make_header(DpgVersion::V2, 10, 1, &sample_gop());
        let mut io = IoContext::memory();
        let mut muxer = DpgMuxer::new(header);
        muxer.write_header(&mut io, None).unwrap();
        let err = muxer
            .write_audio(&mut io, &mut IoContext::from_bytes(vec![0; 9]))
            .unwrap_err();
        assert!(matches!(err, DpgError::InvalidData(_)));
    }

    #[test]
    fn test_顺序错误() {
        let header = make_header(DpgVersion::V1, 1, 1, &sample_gop());
        let mut muxer = DpgMuxer::new(header);
        let err = muxer
            .write_video(&mut IoContext::memory(), &mut IoContext::from_bytes(vec![0]))
            .unwrap_err();
        assert!(matches!(err, DpgError::InvalidArgument(_)));
    }

    #[test]
    fn test_gop大小不一致() {
        let gop = sample_gop();
        let header = make_header(DpgVersion::V3, 1, 1, &gop);
        let mut io = IoContext::memory();
        let mut muxer = DpgMuxer::new(header);
        muxer.write_header(&mut io, None).unwrap();
        muxer
            .write_audio(&mut io, &mut IoContext::from_bytes(vec![0]))
            .unwrap();
        muxer
            .write_video(&mut io, &mut IoContext::from_bytes(vec![0]))
            .unwrap();
        let mut bigger = gop.clone();
        bigger.push(10, 1);
        let err = muxer.write_trailer(&mut io, Some(&bigger)).unwrap_err();
        assert!(matches!(err, DpgError::InvalidArgument(_)));
    }

    fn write_sample(dir: &Path, output: &Path, overwrite: bool) -> DpgResult<u64> {
        let audio = dir.join("a.mp2");
        let video = dir.join("v.mpg");
        std::fs::write(&audio, b"AUD").unwrap();
        std::fs::write(&video, b"VIDEO").unwrap();
        let header = make_header(DpgVersion::V1, 3, 5, &sample_gop());
        write_dpg_file(
            output,
            &ContainerParts {
                header: &header,
                thumbnail: None,
                audio_path: &audio,
                video_path: &video,
                gop_index: None,
                overwrite,
            },
        )
    }

    fn part_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".part")
            })
            .count()
    }

    #[test]
    fn test_写入文件_不覆盖已存在输出() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("clip.dpg");
        std::fs::write(&output, b"keep").unwrap();

        let err = write_sample(dir.path(), &output, false).unwrap_err();
        assert!(matches!(err, DpgError::InvalidArgument(_)), "{err:?}");
        assert_eq!(std::fs::read(&output).unwrap(), b"keep");
        assert_eq!(part_files(dir.path()), 0);
    }

    #[test]
    fn test_写入文件_允许覆盖() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("clip.dpg");
        std::fs::write(&output, b"old").unwrap();

        let written = write_sample(dir.path(), &output, true).unwrap();
        let data = std::fs::read(&output).unwrap();
        assert_eq!(data.len() as u64, written);
        assert_eq!(&data[..4], b"DPG1");
        assert_eq!(&data[40..43], b"AUD");
        assert_eq!(part_files(dir.path()), 0);
    }
}
