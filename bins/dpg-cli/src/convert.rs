//! `convert` 子命令: 批量封装.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use log::{error, info, warn};
use rayon::prelude::*;

use dpgconv::pipeline::{ConvertJob, ConvertOptions, ConvertReport, Converter, dpg_file_name};

use crate::capture::{MplayerFrameGrabber, load_image};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// 输入视频基本流 (MPEG-1), 可指定多个
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// DPG 版本 (0-4, 默认 4)
    #[arg(long = "dpg", value_parser = clap::value_parser!(u32).range(0..=4))]
    pub dpg: Option<u32>,

    /// 帧率 (默认 15)
    #[arg(short = 'f', long)]
    pub fps: Option<u32>,

    /// 音频采样率 (默认 32000)
    #[arg(short = 'z', long)]
    pub hz: Option<u32>,

    /// 编码器每个 GOP 的图像数 (默认 10)
    #[arg(long = "gop-size")]
    pub gop_size: Option<u32>,

    /// 音频基本流 (MP2); 省略时使用与视频同名的 .mp2 文件
    #[arg(short, long)]
    pub audio: Option<PathBuf>,

    /// DPG4 缩略图图片; 省略时用 mplayer 从视频中截取
    #[arg(short, long)]
    pub thumb: Option<PathBuf>,

    /// 输出目录 (默认当前目录)
    #[arg(short, long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    pub overwrite: bool,

    /// 并行任务数 (0 表示按 CPU 数)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// 不使用 mplayer 截取缩略图
    #[arg(long)]
    pub no_capture: bool,

    /// JSON 格式的转换参数文件, 命令行参数优先
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 以 JSON 输出转换结果
    #[arg(long)]
    pub json: bool,
}

impl ConvertArgs {
    /// 合并配置文件与命令行参数
    pub fn options(&self) -> Result<ConvertOptions> {
        let mut opts = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("无法读取配置文件 '{}'", path.display()))?;
                serde_json::from_str::<ConvertOptions>(&text)
                    .with_context(|| format!("配置文件格式错误 '{}'", path.display()))?
            }
            None => ConvertOptions::default(),
        };

        if let Some(v) = self.dpg {
            opts.version = v;
        }
        if let Some(v) = self.fps {
            opts.frame_rate = v;
        }
        if let Some(v) = self.hz {
            opts.sample_rate = v;
        }
        if let Some(v) = self.gop_size {
            opts.pictures_per_group = v;
        }
        if let Some(dir) = &self.output_dir {
            opts.output_dir = dir.clone();
        }
        opts.overwrite |= self.overwrite;
        Ok(opts)
    }

    /// 生成每个输入文件的任务
    fn jobs(&self) -> Result<Vec<ConvertJob>> {
        if self.audio.is_some() && self.inputs.len() > 1 {
            bail!("--audio 只能用于单个输入文件");
        }

        // 所有输出都在同一目录, 文件名相同的输入会写到同一个 .dpg
        let mut names = HashSet::new();
        for video in &self.inputs {
            let name = dpg_file_name(video)?;
            if !names.insert(name.clone()) {
                bail!(
                    "多个输入会生成同一个输出文件 '{}': {}",
                    name.to_string_lossy(),
                    video.display()
                );
            }
        }

        let thumbnail = match &self.thumb {
            Some(path) => Some(
                load_image(path)
                    .with_context(|| format!("无法加载缩略图 '{}'", path.display()))?,
            ),
            None => None,
        };

        Ok(self
            .inputs
            .iter()
            .map(|video| {
                let job = match &self.audio {
                    Some(audio) => ConvertJob::new(video, audio),
                    None => ConvertJob::with_sibling_audio(video),
                };
                match &thumbnail {
                    Some(image) => job.with_thumbnail(image.clone()),
                    None => job,
                }
            })
            .collect())
    }
}

/// 执行批量转换, 返回失败的文件数
pub fn run(args: &ConvertArgs) -> Result<usize> {
    let options = args.options()?;
    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!("无法创建输出目录 '{}'", options.output_dir.display())
    })?;

    let mut converter = Converter::new(options)?;
    if converter.version().has_thumbnail() && args.thumb.is_none() {
        match MplayerFrameGrabber::discover() {
            Some(grabber) if !args.no_capture => {
                converter = converter.with_grabber(Arc::new(grabber));
            }
            Some(_) => {}
            None => warn!("未找到 mplayer, DPG4 需要通过 --thumb 指定缩略图"),
        }
    }

    let jobs = args.jobs()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs)
        .build()
        .context("创建线程池失败")?;

    let results: Vec<_> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                info!("正在转换 {}", job.video.display());
                converter
                    .convert(job)
                    .with_context(|| format!("转换 '{}' 失败", job.video.display()))
            })
            .collect()
    });

    let mut reports: Vec<ConvertReport> = Vec::new();
    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("{:#}", e);
                failed += 1;
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for r in &reports {
            println!(
                "{} -> {} (DPG{}, {} 帧, {:.2} 秒, {} 字节)",
                r.input.display(),
                r.output.display(),
                r.version,
                r.frame_count,
                r.duration_secs,
                r.file_size
            );
        }
    }
    info!("完成: 成功 {}, 失败 {}", reports.len(), failed);
    Ok(failed)
}
