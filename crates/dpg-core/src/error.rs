//! 统一错误类型定义.
//!
//! 所有 DPG crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// DPG 统一错误类型
#[derive(Debug, Error)]
pub enum DpgError {
    /// 视频基本流中未找到任何帧
    #[error("扫描失败: {0}")]
    ScanFailure(String),

    /// DPG 版本超出 0-4 范围
    #[error("无效的 DPG 版本: {0} (支持 0-4)")]
    InvalidVersion(u32),

    /// DPG4 需要缩略图, 但既没有源图像也无法截取视频帧
    #[error("缺少缩略图源: {0}")]
    ThumbnailSourceMissing(String),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的 DPG 文件等)
    #[error("无效数据: {0}")]
    InvalidData(String),
}

/// DPG 统一 Result 类型
pub type DpgResult<T> = Result<T, DpgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.m1v");
        let err: DpgError = io.into();
        assert!(matches!(err, DpgError::Io(_)));
        assert!(err.to_string().contains("missing.m1v"));
    }

    #[test]
    fn test_invalid_version_message() {
        let err = DpgError::InvalidVersion(7);
        assert_eq!(err.to_string(), "无效的 DPG 版本: 7 (支持 0-4)");
    }
}
