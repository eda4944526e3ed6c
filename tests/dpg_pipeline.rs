//! 端到端集成测试: 基本流 → DPG 文件.
//!
//! 测试流程: 生成合成的 MPEG-1 起始码流与音频数据 → 转换 → 探测 → 验证布局

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dpgconv::core::{DpgError, DpgResult, DpgVersion};
use dpgconv::format::probe_file;
use dpgconv::pipeline::{ConvertJob, ConvertOptions, Converter, FrameGrabber};
use dpgconv::scale::SourceImage;

const SEQ: [u8; 4] = [0x00, 0x00, 0x01, 0xB3];
const PIC: [u8; 4] = [0x00, 0x00, 0x01, 0x00];

/// 生成视频基本流: 每个 GOP 一个序列头 + 若干图像, 中间填充非起始码数据
fn make_video(gops: &[u32]) -> Vec<u8> {
    let mut data = Vec::new();
    for &pictures in gops {
        data.extend_from_slice(&SEQ);
        data.extend_from_slice(&[0x11; 8]);
        for _ in 0..pictures {
            data.extend_from_slice(&PIC);
            data.extend_from_slice(&[0xAB; 13]);
        }
    }
    data
}

/// 辅助: 在目录中写入视频与同名音频
fn write_inputs(dir: &Path, name: &str, video: &[u8], audio: &[u8]) -> ConvertJob {
    let video_path = dir.join(format!("{name}.mpg"));
    std::fs::write(&video_path, video).unwrap();
    std::fs::write(video_path.with_extension("mp2"), audio).unwrap();
    ConvertJob::with_sibling_audio(video_path)
}

fn converter(version: u32, out: &Path) -> Converter {
    Converter::new(ConvertOptions {
        version,
        output_dir: out.to_path_buf(),
        ..Default::default()
    })
    .unwrap()
}

fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(data[at..at + 4].try_into().unwrap())
}

fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let mut v: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    v.sort();
    v
}

#[test]
fn test_全部版本_布局() {
    let dir = tempfile::tempdir().unwrap();
    let video = make_video(&[10, 10, 3]);
    let audio: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
    let job = write_inputs(dir.path(), "clip", &video, &audio)
        .with_thumbnail(SourceImage::solid(320, 240, [255, 0, 0]).unwrap());

    for version in DpgVersion::ALL {
        let out = dir.path().join(format!("out{}", version.number()));
        std::fs::create_dir(&out).unwrap();
        let report = converter(u32::from(version.number()), &out)
            .convert(&job)
            .unwrap();

        assert_eq!(report.output, out.join("clip.dpg"));
        assert_eq!(report.frame_count, 23);
        let data = std::fs::read(&report.output).unwrap();
        assert_eq!(data.len() as u64, report.file_size);
        assert_eq!(&data[..4], &version.magic());
        assert_eq!(read_i32(&data, 4), 23);
        // 帧率为大端
        assert_eq!(&data[8..12], &[0, 15, 0, 0]);
        assert_eq!(read_i32(&data, 12), 32000);

        let audio_offset = version.base_header_len() as usize;
        let video_offset = audio_offset + audio.len();
        assert_eq!(read_i32(&data, 20) as usize, audio_offset);
        assert_eq!(read_i32(&data, 24) as usize, audio.len());
        assert_eq!(read_i32(&data, 28) as usize, video_offset);
        assert_eq!(read_i32(&data, 32) as usize, video.len());
        assert_eq!(&data[audio_offset..video_offset], &audio[..]);
        assert_eq!(&data[video_offset..video_offset + video.len()], &video[..]);

        let video_end = video_offset + video.len();
        if version.has_gop_index() {
            assert_eq!(report.gop_count, 3);
            assert_eq!(read_i32(&data, 36) as usize, video_end);
            assert_eq!(read_i32(&data, 40), 24);
            let gop = &data[video_end..];
            assert_eq!(gop.len(), 24);
            let frames: Vec<i32> = (0..3).map(|i| read_i32(gop, i * 8)).collect();
            assert_eq!(frames, vec![0, 10, 20]);
            // 第二个 GOP: 序列头 12 字节 + 10 张图像各 17 字节
            assert_eq!(read_i32(gop, 4), 0);
            assert_eq!(read_i32(gop, 12), 12 + 10 * 17);
        } else {
            assert_eq!(report.gop_count, 0);
            assert_eq!(data.len(), video_end);
        }

        if version.has_thumbnail() {
            assert_eq!(&data[48..52], b"THM0");
            assert!(data[52..audio_offset].chunks_exact(2).all(|p| p == [0x1F, 0x80]));
        }

        let info = probe_file(&report.output).unwrap();
        assert!(info.is_complete());
        assert_eq!(info.header.version, version);
        assert_eq!(info.header.frame_count, 23);
    }
}

#[test]
fn test_dpg0_音频紧跟头部() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_inputs(dir.path(), "a", &make_video(&[5]), b"MP2!");
    let report = converter(0, dir.path()).convert(&job).unwrap();
    let data = std::fs::read(report.output).unwrap();
    assert_eq!(&data[36..40], b"MP2!");
    assert!((report.duration_secs - 5.0 / 15.0).abs() < 1e-9);
}

#[test]
fn test_无帧_不产生输出() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_inputs(dir.path(), "empty", &[0x42; 4096], b"audio");
    let before = dir_entries(dir.path());

    let err = converter(2, dir.path()).convert(&job).unwrap_err();
    assert!(matches!(err, DpgError::ScanFailure(_)), "{err:?}");
    assert_eq!(dir_entries(dir.path()), before);
}

#[test]
fn test_dpg4_缺少缩略图来源() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_inputs(dir.path(), "v", &make_video(&[4]), b"a");
    let before = dir_entries(dir.path());

    let err = converter(4, dir.path()).convert(&job).unwrap_err();
    assert!(matches!(err, DpgError::ThumbnailSourceMissing(_)));
    assert_eq!(dir_entries(dir.path()), before);
}

/// 记录调用参数, 返回纯蓝画面
struct FakeGrabber {
    calls: Mutex<Vec<(PathBuf, f64)>>,
}

impl FrameGrabber for FakeGrabber {
    fn grab(&self, video: &Path, at_secs: f64) -> DpgResult<SourceImage> {
        self.calls
            .lock()
            .unwrap()
            .push((video.to_path_buf(), at_secs));
        SourceImage::solid(640, 360, [0, 0, 255])
    }
}

#[test]
fn test_dpg4_截帧缩略图() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_inputs(dir.path(), "grab", &make_video(&[10, 10, 10]), b"aa");
    let grabber = Arc::new(FakeGrabber {
        calls: Mutex::new(Vec::new()),
    });

    let report = converter(4, dir.path())
        .with_grabber(grabber.clone())
        .convert(&job)
        .unwrap();

    let calls = grabber.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, job.video);
    // 30 帧 / 15 fps 的中点
    assert_eq!(calls[0].1, 1.0);

    let data = std::fs::read(report.output).unwrap();
    assert!(data[52..98356].chunks_exact(2).all(|p| p == [0x00, 0xFC]));
}

#[test]
fn test_拒绝覆盖() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_inputs(dir.path(), "x", &make_video(&[2]), b"a");
    let existing = dir.path().join("x.dpg");
    std::fs::write(&existing, b"keep").unwrap();

    let err = converter(1, dir.path()).convert(&job).unwrap_err();
    assert!(matches!(err, DpgError::InvalidArgument(_)));
    assert_eq!(std::fs::read(&existing).unwrap(), b"keep");

    let conv = Converter::new(ConvertOptions {
        version: 1,
        output_dir: dir.path().to_path_buf(),
        overwrite: true,
        ..Default::default()
    })
    .unwrap();
    let report = conv.convert(&job).unwrap();
    assert_eq!(report.frame_count, 2);
    assert_eq!(&std::fs::read(&existing).unwrap()[..4], b"DPG1");
}

#[test]
fn test_自定义每组图像数() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_inputs(dir.path(), "g", &make_video(&[15, 15]), b"a");
    let conv = Converter::new(ConvertOptions {
        version: 3,
        pictures_per_group: 15,
        output_dir: dir.path().to_path_buf(),
        ..Default::default()
    })
    .unwrap();
    let report = conv.convert(&job).unwrap();
    assert_eq!(report.frame_count, 30);
    assert_eq!(report.gop_count, 2);
}

#[test]
fn test_音频文件缺失() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("noaudio.mpg");
    std::fs::write(&video, make_video(&[3])).unwrap();
    let err = converter(2, dir.path())
        .convert(&ConvertJob::with_sibling_audio(&video))
        .unwrap_err();
    assert!(matches!(err, DpgError::Io(_)));
}

#[test]
fn test_参数_json() {
    let opts: ConvertOptions =
        serde_json::from_str(r#"{"version": 2, "sample_rate": 22050}"#).unwrap();
    assert_eq!(opts.version, 2);
    assert_eq!(opts.sample_rate, 22050);
    assert_eq!(opts.frame_rate, 15);

    let text = serde_json::to_string(&opts).unwrap();
    let back: ConvertOptions = serde_json::from_str(&text).unwrap();
    assert_eq!(back, opts);
}

/// 截帧期间在输出位置写入文件, 模拟另一个任务抢先生成同名输出
struct RacingGrabber {
    output: PathBuf,
}

impl FrameGrabber for RacingGrabber {
    fn grab(&self, _video: &Path, _at_secs: f64) -> DpgResult<SourceImage> {
        std::fs::write(&self.output, b"other job").unwrap();
        SourceImage::solid(16, 12, [0, 255, 0])
    }
}

#[test]
fn test_转换中出现的输出不被覆盖() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_inputs(dir.path(), "x", &make_video(&[4]), b"a");
    let output = dir.path().join("x.dpg");
    let grabber = Arc::new(RacingGrabber {
        output: output.clone(),
    });

    let err = converter(4, dir.path())
        .with_grabber(grabber)
        .convert(&job)
        .unwrap_err();
    assert!(matches!(err, DpgError::InvalidArgument(_)), "{err:?}");
    assert_eq!(std::fs::read(&output).unwrap(), b"other job");

    // 没有遗留临时文件
    let mut names: Vec<_> = dir_entries(dir.path())
        .into_iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["x.dpg", "x.mp2", "x.mpg"]);
}
