//! Stream IO facade / 流式IO门面
//!
//! Opens scoped byte streams over local files, HTTP(S) endpoints and
//! S3-compatible object storage. Readers release their resources on drop;
//! writers must be closed with [`StreamWriter::close`], which drives the
//! underlying shutdown and only returns once the written bytes are
//! durable. A writer dropped without close aborts its upload.
//! 打开本地文件、HTTP(S)和S3对象存储上的受限字节流。读取流在drop时释放；
//! 写入流必须通过 close 关闭，close 返回即表示数据已持久化。
//! 未关闭就被丢弃的写入流会中止其上传。

use std::ops::Range;
use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::{anyhow, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::config::StreamOptions;
use crate::storage::{default_registry, ByteReader, ByteWriter, ObjectInfo, StreamBackend};
use crate::utils::StreamTarget;

/// Stream open mode / 流打开模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl OpenMode {
    /// Parse conventional mode strings / 解析常规模式字符串
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "r" | "rb" | "read" => Ok(OpenMode::Read),
            "w" | "wb" | "write" => Ok(OpenMode::Write),
            _ => Err(anyhow!("不支持的打开模式: {}", mode)),
        }
    }
}

/// Scoped readable stream / 受限读取流
pub struct StreamReader {
    uri: String,
    inner: ByteReader,
}

impl StreamReader {
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl AsyncRead for StreamReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

/// Scoped writable stream / 受限写入流
pub struct StreamWriter {
    uri: String,
    inner: ByteWriter,
    closed: bool,
}

impl StreamWriter {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Close the stream, waiting for durable completion / 关闭流并等待持久化完成
    pub async fn close(mut self) -> Result<()> {
        self.shutdown()
            .await
            .map_err(|e| anyhow!("关闭写入流失败: {}: {}", self.uri, e))?;
        Ok(())
    }
}

impl AsyncWrite for StreamWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_shutdown(cx) {
            Poll::Ready(Ok(())) => {
                this.closed = true;
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if !self.closed {
            // 丢弃inner会中止后台上传，不会留下部分对象
            tracing::warn!("写入流未关闭即被丢弃，上传已中止: {}", self.uri);
        }
    }
}

/// Stream opened by mode / 按模式打开的流
pub enum ObjectStream {
    Reader(StreamReader),
    Writer(StreamWriter),
}

impl ObjectStream {
    pub fn into_reader(self) -> Result<StreamReader> {
        match self {
            ObjectStream::Reader(reader) => Ok(reader),
            ObjectStream::Writer(_) => Err(anyhow!("流以写入模式打开")),
        }
    }

    pub fn into_writer(self) -> Result<StreamWriter> {
        match self {
            ObjectStream::Writer(writer) => Ok(writer),
            ObjectStream::Reader(_) => Err(anyhow!("流以读取模式打开")),
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            ObjectStream::Reader(_) => Ok(()),
            ObjectStream::Writer(writer) => writer.close().await,
        }
    }
}

fn backend_for(uri: &str, options: &StreamOptions) -> Result<(Box<dyn StreamBackend>, StreamTarget)> {
    let target = StreamTarget::parse(uri)?;
    let backend = default_registry().create_for(&target, options)?;
    Ok((backend, target))
}

/// Open a stream under the given mode / 按给定模式打开流
pub async fn open_stream(uri: &str, mode: OpenMode, options: &StreamOptions) -> Result<ObjectStream> {
    match mode {
        OpenMode::Read => Ok(ObjectStream::Reader(open_reader(uri, options).await?)),
        OpenMode::Write => Ok(ObjectStream::Writer(open_writer(uri, options).await?)),
    }
}

/// Open a reader over the full resource / 打开完整资源的读取流
pub async fn open_reader(uri: &str, options: &StreamOptions) -> Result<StreamReader> {
    open_reader_range(uri, None, options).await
}

/// Open a reader over a byte range / 打开字节范围的读取流
pub async fn open_reader_range(
    uri: &str,
    range: Option<Range<u64>>,
    options: &StreamOptions,
) -> Result<StreamReader> {
    let (backend, target) = backend_for(uri, options)?;
    if range.is_some() && !backend.capabilities().can_range_read {
        return Err(anyhow!("后端不支持范围读取: {}", backend.name()));
    }
    let inner = backend.open_reader(target.key(), range).await?;
    tracing::debug!("打开读取流: uri={}", uri);
    Ok(StreamReader {
        uri: uri.to_string(),
        inner,
    })
}

/// Open a writer / 打开写入流
pub async fn open_writer(uri: &str, options: &StreamOptions) -> Result<StreamWriter> {
    let (backend, target) = backend_for(uri, options)?;
    if !backend.capabilities().can_write {
        return Err(anyhow!("后端不支持写入: {}", backend.name()));
    }
    let inner = backend.open_writer(target.key(), None).await?;
    tracing::debug!("打开写入流: uri={}", uri);
    Ok(StreamWriter {
        uri: uri.to_string(),
        inner,
        closed: false,
    })
}

/// Delete the addressed resource / 删除目标资源
pub async fn remove(uri: &str, options: &StreamOptions) -> Result<()> {
    let (backend, target) = backend_for(uri, options)?;
    if !backend.capabilities().can_delete {
        return Err(anyhow!("后端不支持删除: {}", backend.name()));
    }
    backend.delete(target.key()).await?;
    tracing::debug!("删除资源: uri={}", uri);
    Ok(())
}

/// Metadata of the addressed resource / 获取目标资源元数据
pub async fn stat(uri: &str, options: &StreamOptions) -> Result<ObjectInfo> {
    let (backend, target) = backend_for(uri, options)?;
    backend.stat(target.key()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const TEST_BYTES: &[u8] = b"Widening gyre";

    #[test]
    fn test_mode_parse() {
        assert_eq!(OpenMode::parse("rb").unwrap(), OpenMode::Read);
        assert_eq!(OpenMode::parse("r").unwrap(), OpenMode::Read);
        assert_eq!(OpenMode::parse("read").unwrap(), OpenMode::Read);
        assert_eq!(OpenMode::parse("wb").unwrap(), OpenMode::Write);
        assert_eq!(OpenMode::parse("w").unwrap(), OpenMode::Write);
        assert_eq!(OpenMode::parse("write").unwrap(), OpenMode::Write);
        assert!(OpenMode::parse("a").is_err());
        assert!(OpenMode::parse("").is_err());
    }

    #[tokio::test]
    async fn test_local_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let uri = path.to_str().unwrap();
        let options = StreamOptions::default();

        let mut writer = open_writer(uri, &options).await.unwrap();
        writer.write_all(TEST_BYTES).await.unwrap();
        writer.close().await.unwrap();

        let info = stat(uri, &options).await.unwrap();
        assert_eq!(info.size, TEST_BYTES.len() as u64);

        let mut reader = open_reader(uri, &options).await.unwrap();
        let mut redownloaded = Vec::new();
        reader.read_to_end(&mut redownloaded).await.unwrap();
        assert_eq!(redownloaded, TEST_BYTES);

        remove(uri, &options).await.unwrap();
        assert!(open_reader(uri, &options).await.is_err());
    }

    #[tokio::test]
    async fn test_local_range_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let uri = path.to_str().unwrap();
        let options = StreamOptions::default();

        let mut writer = open_writer(uri, &options).await.unwrap();
        writer.write_all(TEST_BYTES).await.unwrap();
        writer.close().await.unwrap();

        let mut reader = open_reader_range(uri, Some(0..8), &options).await.unwrap();
        let mut part = Vec::new();
        reader.read_to_end(&mut part).await.unwrap();
        assert_eq!(part, b"Widening");
    }

    #[tokio::test]
    async fn test_open_stream_mode_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let uri = path.to_str().unwrap();
        let options = StreamOptions::default();

        let stream = open_stream(uri, OpenMode::Write, &options).await.unwrap();
        let mut writer = stream.into_writer().unwrap();
        writer.write_all(TEST_BYTES).await.unwrap();
        writer.close().await.unwrap();

        let stream = open_stream(uri, OpenMode::Read, &options).await.unwrap();
        let mut reader = stream.into_reader().unwrap();
        let mut redownloaded = Vec::new();
        reader.read_to_end(&mut redownloaded).await.unwrap();
        assert_eq!(redownloaded, TEST_BYTES);

        // 写入模式访问器拒绝读取流
        let stream = open_stream(uri, OpenMode::Read, &options).await.unwrap();
        assert!(stream.into_writer().is_err());
    }

    #[tokio::test]
    async fn test_read_missing_local_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bin");
        let uri = path.to_str().unwrap();
        assert!(open_reader(uri, &StreamOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_write_rejected_on_http() {
        // HTTP后端只读，打开写入流在任何网络活动前失败
        let options = StreamOptions::default();
        assert!(open_writer("http://example.com/data.bin", &options).await.is_err());
        assert!(remove("http://example.com/data.bin", &options).await.is_err());
    }
}
