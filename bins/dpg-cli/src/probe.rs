//! `probe` 子命令: 显示已有 DPG 文件的信息.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;

use dpg_core::version::{THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use dpg_format::IoContext;
use dpg_format::probe::{DpgInfo, probe, read_thumbnail};
use dpg_scale::Thumbnail;

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// DPG 文件路径
    pub input: PathBuf,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,

    /// 列出 GOP 索引
    #[arg(long)]
    pub show_gop: bool,

    /// 显示播放器跳转到指定帧时使用的 GOP 及文件偏移 (DPG2+)
    #[arg(long, value_name = "FRAME")]
    pub seek_frame: Option<u32>,

    /// 将 DPG4 缩略图导出为图片 (格式由扩展名决定)
    #[arg(long, value_name = "FILE")]
    pub extract_thumb: Option<PathBuf>,
}

// ============================================================
// JSON 输出结构体
// ============================================================

#[derive(Serialize)]
struct ProbeOutput {
    filename: String,
    version: u8,
    frame_count: u32,
    frame_rate: u16,
    sample_rate: u32,
    duration: f64,
    audio_offset: u32,
    audio_size: u32,
    video_offset: u32,
    video_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    gop_index_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pixel_format: Option<i32>,
    has_thumbnail: bool,
    file_size: u64,
    expected_size: u64,
    complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    gop: Option<Vec<GopInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seek: Option<SeekInfo>,
}

#[derive(Serialize)]
struct GopInfo {
    frame: u32,
    offset: u64,
}

/// 跳转目标: 包含该帧的 GOP 起点
#[derive(Serialize, Debug, PartialEq)]
struct SeekInfo {
    frame: u32,
    gop_frame: u32,
    /// 相对文件开头的偏移
    file_offset: u64,
}

fn seek_info(info: &DpgInfo, frame: u32) -> Result<SeekInfo> {
    let h = &info.header;
    let Some(index) = &info.gop_index else {
        bail!("{} 没有可用的 GOP 索引", h.version);
    };
    if frame >= h.frame_count {
        bail!("帧号 {} 超出范围 (共 {} 帧)", frame, h.frame_count);
    }
    let entry = index
        .entry_for_frame(frame)
        .with_context(|| format!("GOP 索引中没有帧 {} 之前的条目", frame))?;
    Ok(SeekInfo {
        frame,
        gop_frame: entry.frame_number,
        file_offset: u64::from(h.video_offset) + entry.byte_offset,
    })
}

fn build_output(
    path: &Path,
    info: &DpgInfo,
    show_gop: bool,
    seek: Option<SeekInfo>,
) -> ProbeOutput {
    let h = &info.header;
    let has_gop = h.version.has_gop_index();
    ProbeOutput {
        filename: path.display().to_string(),
        version: h.version.number(),
        frame_count: h.frame_count,
        frame_rate: h.frame_rate,
        sample_rate: h.sample_rate,
        duration: h.duration_secs(),
        audio_offset: h.audio_offset,
        audio_size: h.audio_size,
        video_offset: h.video_offset,
        video_size: h.video_size,
        gop_index_size: has_gop.then_some(h.gop_index_size),
        pixel_format: h.pixel_format,
        has_thumbnail: h.has_thumbnail(),
        file_size: info.file_size,
        expected_size: h.file_len(),
        complete: info.is_complete(),
        gop: if show_gop {
            info.gop_index.as_ref().map(|g| {
                g.entries()
                    .iter()
                    .map(|e| GopInfo {
                        frame: e.frame_number,
                        offset: e.byte_offset,
                    })
                    .collect()
            })
        } else {
            None
        },
        seek,
    }
}

fn print_text(out: &ProbeOutput) {
    println!("[FORMAT]");
    println!("filename={}", out.filename);
    println!("version=DPG{}", out.version);
    println!("frame_count={}", out.frame_count);
    println!("frame_rate={}", out.frame_rate);
    println!("sample_rate={}", out.sample_rate);
    println!("duration={:.3}", out.duration);
    println!("audio={}+{}", out.audio_offset, out.audio_size);
    println!("video={}+{}", out.video_offset, out.video_size);
    if let Some(size) = out.gop_index_size {
        println!("gop_index_size={}", size);
    }
    if let Some(code) = out.pixel_format {
        println!("pixel_format={}", code);
    }
    println!("thumbnail={}", out.has_thumbnail);
    println!("size={} (头部描述 {})", out.file_size, out.expected_size);
    println!("[/FORMAT]");

    if let Some(gop) = &out.gop {
        println!("[GOP]");
        for (i, e) in gop.iter().enumerate() {
            println!("{:5}: frame={} offset={}", i, e.frame, e.offset);
        }
        println!("[/GOP]");
    }

    if let Some(seek) = &out.seek {
        println!("[SEEK]");
        println!("frame={}", seek.frame);
        println!("gop_frame={}", seek.gop_frame);
        println!("file_offset={}", seek.file_offset);
        println!("[/SEEK]");
    }
}

fn export_thumbnail(io: &mut IoContext, info: &DpgInfo, out: &Path) -> Result<()> {
    let data = read_thumbnail(io, &info.header)?;
    let thumb = Thumbnail::from_bytes(&data)?;
    let img = image::RgbImage::from_raw(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, thumb.to_rgb24())
        .context("缩略图尺寸错误")?;
    img.save(out)
        .with_context(|| format!("无法写入 '{}'", out.display()))?;
    Ok(())
}

/// 执行探测; 文件不完整时返回错误
pub fn run(args: &ProbeArgs) -> Result<()> {
    let mut io = IoContext::open_read(&args.input)
        .with_context(|| format!("无法打开文件 '{}'", args.input.display()))?;
    let info = probe(&mut io)
        .with_context(|| format!("无法解析 DPG 头部 '{}'", args.input.display()))?;

    let seek = args.seek_frame.map(|f| seek_info(&info, f)).transpose()?;
    let out = build_output(&args.input, &info, args.show_gop, seek);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_text(&out);
    }

    if let Some(path) = &args.extract_thumb {
        export_thumbnail(&mut io, &info, path)?;
    }

    if !info.is_complete() {
        bail!(
            "文件长度 {} 与头部描述的 {} 不一致",
            info.file_size,
            info.header.file_len()
        );
    }
    Ok(())
}
