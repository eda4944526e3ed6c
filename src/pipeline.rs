//! 转换流水线.
//!
//! 每个输入文件独立执行: 扫描 → 缩略图 → 头部 → 封装.
//! 任一阶段失败都不会留下输出文件.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use dpg_core::{DpgError, DpgResult, DpgVersion};
use dpg_format::scanner::DEFAULT_PICTURES_PER_GROUP;
use dpg_format::{ContainerParts, DpgHeader, HeaderParams, StreamScanner, write_dpg_file};
use dpg_scale::{SourceImage, Thumbnail};

/// 转换参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// DPG 版本 (0-4)
    pub version: u32,
    /// 帧率 (fps)
    pub frame_rate: u32,
    /// 音频采样率 (Hz)
    pub sample_rate: u32,
    /// 编码器每个 GOP 的图像数
    pub pictures_per_group: u32,
    /// 输出目录
    pub output_dir: PathBuf,
    /// 覆盖已存在的输出文件
    pub overwrite: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            version: u32::from(DpgVersion::default().number()),
            frame_rate: 15,
            sample_rate: 32000,
            pictures_per_group: DEFAULT_PICTURES_PER_GROUP,
            output_dir: PathBuf::from("."),
            overwrite: false,
        }
    }
}

/// 从视频中截取一帧, 作为 DPG4 缩略图的来源
pub trait FrameGrabber: Send + Sync {
    /// 截取 `at_secs` 秒处的画面
    fn grab(&self, video: &Path, at_secs: f64) -> DpgResult<SourceImage>;
}

/// 单个文件的转换任务
#[derive(Debug, Clone)]
pub struct ConvertJob {
    /// MPEG-1 视频基本流
    pub video: PathBuf,
    /// MP2 音频基本流
    pub audio: PathBuf,
    /// 缩略图来源 (仅 DPG4 使用)
    pub thumbnail: Option<SourceImage>,
}

impl ConvertJob {
    pub fn new(video: impl Into<PathBuf>, audio: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            audio: audio.into(),
            thumbnail: None,
        }
    }

    /// 音频取与视频同名的 `.mp2` 文件
    pub fn with_sibling_audio(video: impl Into<PathBuf>) -> Self {
        let video = video.into();
        let audio = video.with_extension("mp2");
        Self::new(video, audio)
    }

    pub fn with_thumbnail(mut self, image: SourceImage) -> Self {
        self.thumbnail = Some(image);
        self
    }
}

/// 转换结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// DPG 版本号
    pub version: u8,
    pub frame_count: u32,
    /// GOP 数 (DPG0/1 为 0)
    pub gop_count: usize,
    pub duration_secs: f64,
    /// 输出文件字节数
    pub file_size: u64,
}

/// 转换器
///
/// 不持有可变状态, 可在多个线程间共享.
#[derive(Clone)]
pub struct Converter {
    options: ConvertOptions,
    version: DpgVersion,
    grabber: Option<Arc<dyn FrameGrabber>>,
}

impl Converter {
    /// 校验参数并创建转换器
    pub fn new(options: ConvertOptions) -> DpgResult<Self> {
        let version = DpgVersion::try_from(options.version)?;
        if options.frame_rate == 0 {
            return Err(DpgError::InvalidArgument("帧率必须大于 0".into()));
        }
        if options.sample_rate == 0 {
            return Err(DpgError::InvalidArgument("采样率必须大于 0".into()));
        }
        if options.pictures_per_group == 0 {
            return Err(DpgError::InvalidArgument("每组图像数必须大于 0".into()));
        }
        Ok(Self {
            options,
            version,
            grabber: None,
        })
    }

    /// 设置截帧器, 在没有给出缩略图时使用
    pub fn with_grabber(mut self, grabber: Arc<dyn FrameGrabber>) -> Self {
        self.grabber = Some(grabber);
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn version(&self) -> DpgVersion {
        self.version
    }

    /// 输出文件路径: 输出目录 + 视频文件名 (扩展名换为 `.dpg`)
    pub fn output_path(&self, video: &Path) -> DpgResult<PathBuf> {
        Ok(self.options.output_dir.join(dpg_file_name(video)?))
    }

    /// 执行单个文件的转换
    pub fn convert(&self, job: &ConvertJob) -> DpgResult<ConvertReport> {
        let output = self.output_path(&job.video)?;
        if !self.options.overwrite && output.exists() {
            return Err(DpgError::InvalidArgument(format!(
                "输出文件已存在 '{}', 使用 -y 覆盖",
                output.display()
            )));
        }

        let audio_size = std::fs::metadata(&job.audio)?.len();
        let video_size = std::fs::metadata(&job.video)?.len();
        debug!(
            "{}: 视频 {} 字节, 音频 {} 字节",
            job.video.display(),
            video_size,
            audio_size
        );

        let scan = StreamScanner::new(self.version)
            .with_pictures_per_group(self.options.pictures_per_group)
            .scan_file(&job.video)?;

        let thumbnail = if self.version.has_thumbnail() {
            Some(self.make_thumbnail(job, scan.frame_count)?.to_bytes())
        } else {
            None
        };

        let header = DpgHeader::new(&HeaderParams {
            version: self.version,
            frame_count: scan.frame_count,
            frame_rate: self.options.frame_rate,
            sample_rate: self.options.sample_rate,
            audio_size,
            video_size,
            gop_index_size: scan.gop_index_size(),
        })?;

        let file_size = write_dpg_file(
            &output,
            &ContainerParts {
                header: &header,
                thumbnail: thumbnail.as_deref(),
                audio_path: &job.audio,
                video_path: &job.video,
                gop_index: scan.gop_index.as_ref(),
                overwrite: self.options.overwrite,
            },
        )?;

        let report = ConvertReport {
            input: job.video.clone(),
            output,
            version: self.version.number(),
            frame_count: scan.frame_count,
            gop_count: scan.gop_index.as_ref().map_or(0, |g| g.len()),
            duration_secs: header.duration_secs(),
            file_size,
        };
        info!(
            "转换完成 {} → {}: {} 帧, {} 个 GOP, {:.2} 秒, {} 字节",
            report.input.display(),
            report.output.display(),
            report.frame_count,
            report.gop_count,
            report.duration_secs,
            report.file_size
        );
        Ok(report)
    }

    /// 缩略图: 优先用任务给出的图像, 否则在视频中点截帧
    fn make_thumbnail(&self, job: &ConvertJob, frame_count: u32) -> DpgResult<Thumbnail> {
        if let Some(image) = &job.thumbnail {
            return Thumbnail::from_image(image);
        }
        let Some(grabber) = &self.grabber else {
            return Err(DpgError::ThumbnailSourceMissing(format!(
                "{} 没有缩略图来源",
                job.video.display()
            )));
        };
        let at = capture_time(frame_count, self.options.frame_rate);
        debug!("从 {} 的 {:.2} 秒处截取缩略图", job.video.display(), at);
        let image = grabber.grab(&job.video, at)?;
        Thumbnail::from_image(&image)
    }
}

/// 截帧时间点 (秒): 视频时长的一半
pub fn capture_time(frame_count: u32, frame_rate: u32) -> f64 {
    if frame_rate == 0 {
        return 0.0;
    }
    f64::from(frame_count) / f64::from(frame_rate) / 2.0
}

/// 视频文件名的扩展名换为 `.dpg`
pub fn dpg_file_name(video: &Path) -> DpgResult<OsString> {
    let stem = video.file_stem().ok_or_else(|| {
        DpgError::InvalidArgument(format!("无法从 '{}' 得到文件名", video.display()))
    })?;
    let mut name = stem.to_os_string();
    name.push(".dpg");
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_默认参数() {
        let opts = ConvertOptions::default();
        assert_eq!(opts.version, 4);
        assert_eq!(opts.frame_rate, 15);
        assert_eq!(opts.sample_rate, 32000);
        assert_eq!(opts.pictures_per_group, 10);
        assert!(!opts.overwrite);
    }

    #[test]
    fn test_无效版本() {
        let opts = ConvertOptions {
            version: 5,
            ..Default::default()
        };
        assert!(matches!(
            Converter::new(opts),
            Err(DpgError::InvalidVersion(5))
        ));
    }

    #[test]
    fn test_无效帧率() {
        let opts = ConvertOptions {
            frame_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            Converter::new(opts),
            Err(DpgError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_输出文件名() {
        assert_eq!(
            dpg_file_name(Path::new("/tmp/clips/movie.final.mpg")).unwrap(),
            "movie.final.dpg"
        );
        assert_eq!(dpg_file_name(Path::new("noext")).unwrap(), "noext.dpg");
        assert!(dpg_file_name(Path::new("/")).is_err());

        let opts = ConvertOptions {
            output_dir: PathBuf::from("out"),
            ..Default::default()
        };
        let conv = Converter::new(opts).unwrap();
        assert_eq!(
            conv.output_path(Path::new("a/b.mpg")).unwrap(),
            Path::new("out").join("b.dpg")
        );
    }

    #[test]
    fn test_同名音频() {
        let job = ConvertJob::with_sibling_audio("dir/clip.mpg");
        assert_eq!(job.audio, Path::new("dir/clip.mp2"));
    }

    #[test]
    fn test_截帧时间() {
        assert_eq!(capture_time(300, 15), 10.0);
        assert_eq!(capture_time(1, 0), 0.0);
    }
}
