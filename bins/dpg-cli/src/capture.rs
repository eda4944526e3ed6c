//! 缩略图来源: 图像文件与 mplayer 截帧.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use dpg_core::{DpgError, DpgResult, PixelFormat};
use dpg_scale::SourceImage;
use dpgconv::pipeline::FrameGrabber;

/// mplayer 截帧时输出的第一张图片
const SHOT_FILE: &str = "00000001.png";

/// 读取任意 `image` 支持的图片, 转为 RGB24 或 RGBA
pub fn load_image(path: &Path) -> DpgResult<SourceImage> {
    let img = image::open(path).map_err(|e| {
        DpgError::InvalidData(format!("无法读取图像 '{}': {}", path.display(), e))
    })?;
    let (width, height) = (img.width(), img.height());
    debug!(
        "读取图像 {}: {}x{} {:?}",
        path.display(),
        width,
        height,
        img.color()
    );

    if img.color().has_alpha() {
        SourceImage::new(img.to_rgba8().into_raw(), width, height, PixelFormat::Rgba)
    } else {
        SourceImage::new(img.to_rgb8().into_raw(), width, height, PixelFormat::Rgb24)
    }
}

/// 调用 mplayer 截取一帧 PNG
pub struct MplayerFrameGrabber {
    program: PathBuf,
}

impl MplayerFrameGrabber {
    /// 在 PATH 中查找 mplayer
    pub fn discover() -> Option<Self> {
        which::which("mplayer").ok().map(Self::with_program)
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self { program }
    }
}

impl FrameGrabber for MplayerFrameGrabber {
    fn grab(&self, video: &Path, at_secs: f64) -> DpgResult<SourceImage> {
        // 每次截帧使用独立目录, 批量并发时互不覆盖
        let dir = tempfile::tempdir()?;
        let status = Command::new(&self.program)
            .arg(video)
            .arg("-nosound")
            .arg("-vo")
            .arg(format!("png:outdir={}", dir.path().display()))
            .args(["-frames", "1", "-ss"])
            .arg(format!("{:.2}", at_secs))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                DpgError::ThumbnailSourceMissing(format!(
                    "无法运行 {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let shot = dir.path().join(SHOT_FILE);
        if !shot.exists() {
            return Err(DpgError::ThumbnailSourceMissing(format!(
                "mplayer 未能从 {} 截取画面 ({})",
                video.display(),
                status
            )));
        }
        load_image(&shot)
    }
}
