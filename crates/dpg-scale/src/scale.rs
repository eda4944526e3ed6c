//! 仿射变换采样.
//!
//! 对每个目标像素 `(x, y)`, 以像素中心 `(x + 0.5, y + 0.5)` 经仿射矩阵
//! 映射到源图像坐标后插值. 源坐标超出边界时按边缘像素取值.
//!
//! 目标图像按行并行计算.

use rayon::prelude::*;

use dpg_core::{DpgError, DpgResult};

use super::ScaleAlgorithm;

/// 双三次插值参数 (Catmull-Rom)
const CUBIC_A: f64 = -0.5;

/// 从目标坐标到源坐标的仿射变换
///
/// ```text
/// src_x = a * x + b * y + c
/// src_y = d * x + e * y + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    /// 缩放加平移
    pub const fn scale_offset(sx: f64, sy: f64, ox: f64, oy: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: ox,
            d: 0.0,
            e: sy,
            f: oy,
        }
    }

    /// 映射一个点
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }
}

/// 一帧 packed 图像 (只读)
#[derive(Debug, Clone, Copy)]
pub struct PackedPlane<'a> {
    pub data: &'a [u8],
    pub linesize: usize,
    pub width: u32,
    pub height: u32,
    /// 每像素字节数
    pub bpp: usize,
}

impl PackedPlane<'_> {
    fn check(&self) -> DpgResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DpgError::InvalidArgument(format!(
                "图像尺寸无效: {}x{}",
                self.width, self.height
            )));
        }
        let row = self.width as usize * self.bpp;
        if self.linesize < row {
            return Err(DpgError::InvalidArgument(format!(
                "行字节数 {} 小于 {}",
                self.linesize, row
            )));
        }
        let need = self.linesize * (self.height as usize - 1) + row;
        if self.data.len() < need {
            return Err(DpgError::InvalidArgument(format!(
                "图像数据不足: 需要 {} 字节, 实际 {} 字节",
                need,
                self.data.len()
            )));
        }
        Ok(())
    }

    #[inline]
    fn at(&self, x: i64, y: i64, channel: usize) -> f64 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        f64::from(self.data[y * self.linesize + x * self.bpp + channel])
    }
}

/// 按仿射变换将 `src` 采样到 `dst`
///
/// `dst` 与 `src` 像素布局相同, 每行 `dst_linesize` 字节, 共 `dst_height` 行.
pub fn transform_packed(
    src: &PackedPlane<'_>,
    dst: &mut [u8],
    dst_linesize: usize,
    dst_width: u32,
    dst_height: u32,
    transform: &AffineTransform,
    algorithm: ScaleAlgorithm,
) -> DpgResult<()> {
    src.check()?;
    let bpp = src.bpp;
    let row_bytes = dst_width as usize * bpp;
    if dst_linesize < row_bytes || dst.len() < dst_linesize * dst_height as usize {
        return Err(DpgError::InvalidArgument(format!(
            "目标缓冲区不足以容纳 {}x{}",
            dst_width, dst_height
        )));
    }

    dst.par_chunks_mut(dst_linesize)
        .take(dst_height as usize)
        .enumerate()
        .for_each(|(dy, row)| {
            let yc = dy as f64 + 0.5;
            for dx in 0..dst_width as usize {
                let (sx, sy) = transform.apply(dx as f64 + 0.5, yc);
                let out = &mut row[dx * bpp..(dx + 1) * bpp];
                for (ch, px) in out.iter_mut().enumerate() {
                    let v = match algorithm {
                        ScaleAlgorithm::NearestNeighbor => sample_nearest(src, sx, sy, ch),
                        ScaleAlgorithm::Bilinear => sample_bilinear(src, sx, sy, ch),
                        ScaleAlgorithm::Bicubic => sample_bicubic(src, sx, sy, ch),
                    };
                    *px = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    Ok(())
}

fn sample_nearest(src: &PackedPlane<'_>, sx: f64, sy: f64, ch: usize) -> f64 {
    src.at(sx.floor() as i64, sy.floor() as i64, ch)
}

fn sample_bilinear(src: &PackedPlane<'_>, sx: f64, sy: f64, ch: usize) -> f64 {
    let (x, y) = (sx - 0.5, sy - 0.5);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let top = src.at(x0, y0, ch) * (1.0 - fx) + src.at(x0 + 1, y0, ch) * fx;
    let bottom = src.at(x0, y0 + 1, ch) * (1.0 - fx) + src.at(x0 + 1, y0 + 1, ch) * fx;
    top * (1.0 - fy) + bottom * fy
}

fn sample_bicubic(src: &PackedPlane<'_>, sx: f64, sy: f64, ch: usize) -> f64 {
    let (x, y) = (sx - 0.5, sy - 0.5);
    let (x0, y0) = (x.floor(), y.floor());
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut sum = 0.0;
    for (j, wyj) in wy.iter().enumerate() {
        let yy = y0 - 1 + j as i64;
        let mut row = 0.0;
        for (i, wxi) in wx.iter().enumerate() {
            row += src.at(x0 - 1 + i as i64, yy, ch) * wxi;
        }
        sum += row * wyj;
    }
    sum
}

/// 4 个采样点 (-1, 0, 1, 2) 的三次卷积权重, 和恒为 1
fn cubic_weights(t: f64) -> [f64; 4] {
    [
        cubic(1.0 + t),
        cubic(t),
        cubic(1.0 - t),
        cubic(2.0 - t),
    ]
}

fn cubic(x: f64) -> f64 {
    let x = x.abs();
    if x < 1.0 {
        ((CUBIC_A + 2.0) * x - (CUBIC_A + 3.0)) * x * x + 1.0
    } else if x < 2.0 {
        (((x - 5.0) * x + 8.0) * x - 4.0) * CUBIC_A
    } else {
        0.0
    }
}
