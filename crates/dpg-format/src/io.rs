//! I/O 抽象层.
//!
//! 提供统一的读写接口, 支持文件和内存缓冲区两种后端.
//! 扫描器、封装器和头部解析都只通过 [`IoContext`] 访问数据.

use std::io::{self, Read, Seek, Write};

use dpg_core::{DpgError, DpgResult};

/// I/O 上下文
///
/// 封装底层 I/O 操作, 为扫描器/封装器提供统一的数据读写接口.
pub struct IoContext {
    /// 内部 I/O 实现
    inner: Box<dyn IoBackend>,
    /// 读缓冲区
    buffer: Vec<u8>,
    /// 缓冲区中的有效数据长度
    buf_len: usize,
    /// 缓冲区当前读取位置
    buf_pos: usize,
}

/// I/O 后端 trait
///
/// 实现此 trait 以支持不同的 I/O 来源 (文件、内存等).
pub trait IoBackend: Send {
    /// 读取数据到缓冲区
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 全部写入
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    /// 刷新写缓冲
    fn flush(&mut self) -> io::Result<()>;
    /// 定位 (seek)
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64>;
    /// 获取当前位置
    fn position(&mut self) -> io::Result<u64>;
    /// 获取总大小 (如果可知)
    fn size(&self) -> Option<u64>;
}

/// 默认缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

impl IoContext {
    /// 从 I/O 后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            inner: backend,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            buf_len: 0,
            buf_pos: 0,
        }
    }

    /// 从内存数据创建只读上下文
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::new(Box::new(MemoryBackend::from_data(data)))
    }

    /// 创建空的内存上下文 (用于写入)
    pub fn memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// 从文件路径打开 (只读)
    pub fn open_read(path: impl AsRef<std::path::Path>) -> DpgResult<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::from_file(file))
    }

    /// 包装一个已打开的文件
    pub fn from_file(file: std::fs::File) -> Self {
        Self::new(Box::new(FileBackend::new(file)))
    }

    // ========================
    // 读取方法
    // ========================

    /// 读取尽可能多的数据, 返回实际读取的字节数
    ///
    /// 返回 0 表示已到达流末尾.
    pub fn read_some(&mut self, buf: &mut [u8]) -> DpgResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let buffered = self.buf_len - self.buf_pos;
        if buffered > 0 {
            let to_copy = buffered.min(buf.len());
            buf[..to_copy].copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
            self.buf_pos += to_copy;
            return Ok(to_copy);
        }
        // 缓冲区已空: 大块读取直接绕过缓冲区
        if buf.len() >= self.buffer.len() {
            return Ok(self.inner.read(buf)?);
        }
        self.buf_pos = 0;
        self.buf_len = self.inner.read(&mut self.buffer)?;
        if self.buf_len == 0 {
            return Ok(0);
        }
        self.read_some(buf)
    }

    /// 读取指定字节数
    pub fn read_exact(&mut self, buf: &mut [u8]) -> DpgResult<()> {
        let mut total_read = 0;
        while total_read < buf.len() {
            let n = self.read_some(&mut buf[total_read..])?;
            if n == 0 {
                return Err(DpgError::Eof);
            }
            total_read += n;
        }
        Ok(())
    }

    /// 读取 i32 小端
    pub fn read_i32_le(&mut self) -> DpgResult<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// 读取 i16 大端
    pub fn read_i16_be(&mut self) -> DpgResult<i16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    /// 读取 4 字节标签 (FourCC)
    pub fn read_tag(&mut self) -> DpgResult<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 读取指定数量的字节
    pub fn read_bytes(&mut self, count: usize) -> DpgResult<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 读取直到流末尾
    pub fn read_to_end(&mut self) -> DpgResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = vec![0u8; DEFAULT_BUFFER_SIZE];
        loop {
            let n = self.read_some(&mut chunk)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    // ========================
    // 写入方法
    // ========================

    /// 写入全部数据
    pub fn write_all(&mut self, buf: &[u8]) -> DpgResult<()> {
        self.inner.write_all(buf)?;
        Ok(())
    }

    /// 从另一个上下文复制数据直到其末尾, 返回复制的字节数
    pub fn copy_from(&mut self, src: &mut IoContext) -> DpgResult<u64> {
        let mut chunk = vec![0u8; DEFAULT_BUFFER_SIZE];
        let mut copied = 0u64;
        loop {
            let n = src.read_some(&mut chunk)?;
            if n == 0 {
                return Ok(copied);
            }
            self.write_all(&chunk[..n])?;
            copied += n as u64;
        }
    }

    /// 刷新写缓冲
    pub fn flush(&mut self) -> DpgResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    // ========================
    // 定位方法
    // ========================

    /// 定位 (seek)
    ///
    /// 注意: seek 会清空读缓冲区.
    pub fn seek(&mut self, pos: io::SeekFrom) -> DpgResult<u64> {
        self.buf_pos = 0;
        self.buf_len = 0;
        Ok(self.inner.seek(pos)?)
    }

    /// 获取当前位置
    ///
    /// 考虑读缓冲区中尚未消耗的数据量.
    pub fn position(&mut self) -> DpgResult<u64> {
        let raw_pos = self.inner.position()?;
        let buffered = (self.buf_len - self.buf_pos) as u64;
        Ok(raw_pos - buffered)
    }

    /// 获取总大小
    pub fn size(&self) -> Option<u64> {
        self.inner.size()
    }
}

/// 文件 I/O 后端
struct FileBackend {
    file: std::fs::File,
    size: Option<u64>,
}

impl FileBackend {
    fn new(file: std::fs::File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self { file, size }
    }
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&self) -> Option<u64> {
        self.size
    }
}

/// 内存缓冲区 I/O 后端
///
/// 用于测试和内存中处理.
pub struct MemoryBackend {
    /// 数据缓冲区
    data: Vec<u8>,
    /// 当前位置
    pos: usize,
}

impl MemoryBackend {
    /// 从已有数据创建 (用于读取)
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// 创建空缓冲区 (用于写入)
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // 当前位置在数据末尾时追加, 否则覆盖已有数据
        if self.pos >= self.data.len() {
            self.data.resize(self.pos, 0);
            self.data.extend_from_slice(buf);
        } else {
            let overlap = (self.data.len() - self.pos).min(buf.len());
            self.data[self.pos..self.pos + overlap].copy_from_slice(&buf[..overlap]);
            if buf.len() > overlap {
                self.data.extend_from_slice(&buf[overlap..]);
            }
        }
        self.pos += buf.len();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(offset) => offset as i64,
            io::SeekFrom::End(offset) => self.data.len() as i64 + offset,
            io::SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}
