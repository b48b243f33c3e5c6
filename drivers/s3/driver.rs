//! S3后端核心实现
//!
//! 设计原则：
//! - 只提供原语（open_reader, open_writer, delete, stat）
//! - 小对象单次put，超过分片大小走分片上传
//! - 写入流未正常关闭时中止上传，不留下部分对象

use std::future::Future;
use std::ops::Range;
use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use s3::bucket::Bucket;
use s3::serde_types::Part;
use s3::Region;
use tokio::sync::{mpsc, oneshot};

use crate::storage::{ByteReader, ByteWriter, Capability, ObjectInfo, StreamBackend};
use super::config::S3Config;

const CHUNK_SIZE: usize = 8 * 1024 * 1024; // 8MB per chunk (S3最小5MB)
const MAX_BUFFER_CHUNKS: usize = 2; // channel容量2

/// S3后端
pub struct S3Backend {
    bucket: Box<Bucket>,
}

impl S3Backend {
    /// 创建新的S3后端实例（凭证决策在此完成，不触发网络）
    pub fn new(config: S3Config) -> Result<Self> {
        let bucket = Self::create_bucket(&config)?;
        Ok(Self { bucket })
    }

    /// 创建S3 Bucket客户端
    fn create_bucket(config: &S3Config) -> Result<Box<Bucket>> {
        let credentials = config.resolve_credentials()?;

        let region = match &config.endpoint {
            Some(endpoint) if !endpoint.is_empty() => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            _ => Region::Custom {
                region: config.region.clone(),
                endpoint: format!("https://s3.{}.amazonaws.com", config.region),
            },
        };

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| anyhow!("创建S3 Bucket失败: {}", e))?;

        let bucket = if config.force_path_style {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(bucket)
    }
}

#[async_trait]
impl StreamBackend for S3Backend {
    fn name(&self) -> &str {
        "s3"
    }

    fn capabilities(&self) -> Capability {
        Capability {
            can_range_read: true,
            can_write: true,
            can_delete: true,
        }
    }

    async fn open_reader(&self, key: &str, range: Option<Range<u64>>) -> Result<ByteReader> {
        // 流式获取对象
        let response = if let Some(r) = range {
            // Range为右开区间，HTTP Range头为闭区间
            self.bucket
                .get_object_range(key, r.start, Some(r.end.saturating_sub(1)))
                .await
                .map_err(|e| anyhow!("获取S3对象失败: {}", e))?
        } else {
            self.bucket
                .get_object(key)
                .await
                .map_err(|e| anyhow!("获取S3对象失败: {}", e))?
        };

        // rust-s3返回完整响应，封装为AsyncRead
        let data = response.bytes().to_vec();
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn open_writer(&self, key: &str, _size_hint: Option<u64>) -> Result<ByteWriter> {
        let key = key.to_string();
        let bucket = self.bucket.clone();

        // 有限容量的channel实现背压
        let (tx, rx) = mpsc::channel::<ChunkData>(MAX_BUFFER_CHUNKS);
        let (result_tx, result_rx) = oneshot::channel::<Result<(), String>>();

        // 后台任务：上传对象
        tokio::spawn(async move {
            let result = upload_object(bucket, key, rx).await;
            if let Err(ref e) = result {
                tracing::warn!("S3上传任务失败: {}", e);
            }
            let _ = result_tx.send(result.map_err(|e| e.to_string()));
        });

        Ok(Box::new(S3Writer {
            tx: Some(tx),
            result_rx: Some(result_rx),
            buffer: BytesMut::with_capacity(CHUNK_SIZE),
            pending_chunk: None,
            shutdown_state: ShutdownState::NotStarted,
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.bucket
            .delete_object(key)
            .await
            .map_err(|e| anyhow!("删除S3对象失败: {}", e))?;
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        let (head, code) = self
            .bucket
            .head_object(key)
            .await
            .map_err(|e| anyhow!("获取S3对象元数据失败: {}", e))?;

        if code != 200 {
            return Err(anyhow!("S3对象不存在: key={}, head返回: {}", key, code));
        }

        Ok(ObjectInfo {
            size: head.content_length.unwrap_or(0) as u64,
            modified: head.last_modified.clone(),
        })
    }
}

/// 分片数据
enum ChunkData {
    Part(Bytes),
    Complete,
}

/// 上传后台任务
///
/// 第一片之后到达Complete则单次put；出现第二片则切换到分片上传。
/// channel断开（写入流被丢弃）时中止，不提交任何对象。
async fn upload_object(bucket: Box<Bucket>, key: String, mut rx: mpsc::Receiver<ChunkData>) -> Result<()> {
    let first = match rx.recv().await {
        Some(ChunkData::Part(data)) => data,
        Some(ChunkData::Complete) => {
            // 空写入创建空对象
            bucket
                .put_object(&key, &[])
                .await
                .map_err(|e| anyhow!("上传S3对象失败: {}", e))?;
            tracing::debug!("S3空对象上传完成: key={}", key);
            return Ok(());
        }
        None => return Err(anyhow!("写入流在完成前被丢弃，已取消上传: key={}", key)),
    };

    match rx.recv().await {
        Some(ChunkData::Complete) => {
            bucket
                .put_object(&key, &first)
                .await
                .map_err(|e| anyhow!("上传S3对象失败: {}", e))?;
            tracing::debug!("S3对象上传完成: key={}, size={}", key, first.len());
            Ok(())
        }
        Some(ChunkData::Part(second)) => multipart_upload(bucket, key, first, second, rx).await,
        None => Err(anyhow!("写入流在完成前被丢弃，已取消上传: key={}", key)),
    }
}

/// 上传单个分片
async fn put_part(
    bucket: &Bucket,
    key: &str,
    upload_id: &str,
    part_number: u32,
    data: Bytes,
) -> Result<Part> {
    tracing::debug!("S3上传分片: key={}, part={}, size={}", key, part_number, data.len());
    bucket
        .put_multipart_chunk(
            data.to_vec(),
            key,
            part_number,
            upload_id,
            "application/octet-stream",
        )
        .await
        .map_err(|e| anyhow!("上传分片失败: part={}, error={}", part_number, e))
}

/// 分片上传，失败或流被丢弃时中止
async fn multipart_upload(
    bucket: Box<Bucket>,
    key: String,
    first: Bytes,
    second: Bytes,
    mut rx: mpsc::Receiver<ChunkData>,
) -> Result<()> {
    let init = bucket
        .initiate_multipart_upload(&key, "application/octet-stream")
        .await
        .map_err(|e| anyhow!("初始化分片上传失败: {}", e))?;
    let upload_id = init.upload_id;

    tracing::debug!("S3分片上传开始: key={}, upload_id={}", key, upload_id);

    let upload_result = async {
        let mut parts: Vec<Part> = Vec::new();
        let mut part_number: u32 = 0;

        for data in [first, second] {
            part_number += 1;
            parts.push(put_part(&bucket, &key, &upload_id, part_number, data).await?);
        }

        loop {
            match rx.recv().await {
                Some(ChunkData::Part(data)) => {
                    part_number += 1;
                    parts.push(put_part(&bucket, &key, &upload_id, part_number, data).await?);
                }
                Some(ChunkData::Complete) => break,
                None => {
                    return Err(anyhow!("写入流在完成前被丢弃: key={}", key));
                }
            }
        }

        Ok(parts)
    }
    .await;

    match upload_result {
        Ok(parts) => {
            let total = parts.len();
            bucket
                .complete_multipart_upload(&key, &upload_id, parts)
                .await
                .map_err(|e| anyhow!("完成分片上传失败: {}", e))?;
            tracing::debug!("S3分片上传完成: key={}, parts={}", key, total);
            Ok(())
        }
        Err(e) => {
            let _ = bucket.abort_upload(&key, &upload_id).await;
            tracing::debug!("S3分片上传已中止: key={}", key);
            Err(e)
        }
    }
}

/// S3写入器 - 缓冲满一个分片就推给后台任务，shutdown等待上传结果
struct S3Writer {
    tx: Option<mpsc::Sender<ChunkData>>,
    result_rx: Option<oneshot::Receiver<Result<(), String>>>,
    buffer: BytesMut,
    pending_chunk: Option<Bytes>, // 待发送的分片
    shutdown_state: ShutdownState,
}

#[derive(Clone, Copy, PartialEq)]
enum ShutdownState {
    NotStarted,
    SendingComplete,
    Done,
}

impl S3Writer {
    /// 尝试补发待发送分片，channel满时返回Pending
    fn flush_pending(&mut self, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        if let Some(data) = self.pending_chunk.take() {
            if let Some(ref tx) = self.tx {
                match tx.try_send(ChunkData::Part(data)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(ChunkData::Part(data))) => {
                        self.pending_chunk = Some(data);
                        cx.waker().wake_by_ref();
                        return Poll::Pending;
                    }
                    Err(_) => {
                        return Poll::Ready(Err(std::io::Error::new(
                            std::io::ErrorKind::BrokenPipe,
                            "S3上传通道已关闭",
                        )));
                    }
                }
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl tokio::io::AsyncWrite for S3Writer {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();

        // 有待发送的分片时必须先发送完，不接受新数据
        match this.flush_pending(cx) {
            Poll::Ready(Ok(())) => {}
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
        }

        // 只接受能填满一个分片的数据，至少接受1字节避免死锁
        let space_in_buffer = CHUNK_SIZE.saturating_sub(this.buffer.len());
        let bytes_to_accept = buf.len().min(space_in_buffer.max(1));
        this.buffer.extend_from_slice(&buf[..bytes_to_accept]);

        // 缓冲区达到分片大小，发送分片
        if this.buffer.len() >= CHUNK_SIZE {
            let chunk = this.buffer.split_to(CHUNK_SIZE).freeze();
            if let Some(ref tx) = this.tx {
                match tx.try_send(ChunkData::Part(chunk)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(ChunkData::Part(data))) => {
                        // channel满了，留到下次poll发送
                        this.pending_chunk = Some(data);
                        cx.waker().wake_by_ref();
                    }
                    Err(_) => {
                        return Poll::Ready(Err(std::io::Error::new(
                            std::io::ErrorKind::BrokenPipe,
                            "S3上传通道已关闭",
                        )));
                    }
                }
            }
        }

        Poll::Ready(Ok(bytes_to_accept))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();

        loop {
            // 每次循环先补发待发送分片；channel已关闭则直接等待任务结果
            match this.flush_pending(cx) {
                Poll::Ready(Ok(())) => {}
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(_)) => {
                    this.tx = None;
                    this.shutdown_state = ShutdownState::Done;
                }
            }

            match this.shutdown_state {
                ShutdownState::NotStarted => {
                    // 发送剩余数据
                    if !this.buffer.is_empty() {
                        let chunk = this.buffer.split().freeze();
                        if let Some(ref tx) = this.tx {
                            match tx.try_send(ChunkData::Part(chunk)) {
                                Ok(()) => {}
                                Err(mpsc::error::TrySendError::Full(ChunkData::Part(data))) => {
                                    this.pending_chunk = Some(data);
                                    cx.waker().wake_by_ref();
                                    return Poll::Pending;
                                }
                                Err(_) => {
                                    this.tx = None;
                                    this.shutdown_state = ShutdownState::Done;
                                    continue;
                                }
                            }
                        }
                    }
                    this.shutdown_state = ShutdownState::SendingComplete;
                }
                ShutdownState::SendingComplete => {
                    // 发送完成信号
                    if let Some(tx) = this.tx.take() {
                        match tx.try_send(ChunkData::Complete) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                this.tx = Some(tx);
                                cx.waker().wake_by_ref();
                                return Poll::Pending;
                            }
                            Err(_) => {}
                        }
                    }
                    this.shutdown_state = ShutdownState::Done;
                }
                ShutdownState::Done => {
                    // 等待后台任务完成
                    if let Some(ref mut result_rx) = this.result_rx {
                        match Pin::new(result_rx).poll(cx) {
                            Poll::Ready(Ok(Ok(()))) => {
                                this.result_rx = None;
                                return Poll::Ready(Ok(()));
                            }
                            Poll::Ready(Ok(Err(e))) => {
                                this.result_rx = None;
                                return Poll::Ready(Err(std::io::Error::new(
                                    std::io::ErrorKind::Other,
                                    format!("S3上传失败: {}", e),
                                )));
                            }
                            Poll::Ready(Err(_)) => {
                                this.result_rx = None;
                                return Poll::Ready(Err(std::io::Error::new(
                                    std::io::ErrorKind::BrokenPipe,
                                    "S3上传任务异常终止",
                                )));
                            }
                            Poll::Pending => return Poll::Pending,
                        }
                    }
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::StreamOptions;
    use crate::stream::{open_reader, open_writer, remove};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const TEST_BYTES: &[u8] = b"Widening gyre";

    /// 需要AWS_S3_TEST_PATH指向可写的S3路径（s3://bucket/key），
    /// 且环境中能发现具备权限的凭证；未设置时跳过。
    #[tokio::test]
    async fn test_s3_upload_download() {
        let path = match std::env::var("AWS_S3_TEST_PATH") {
            Ok(p) => p,
            Err(_) => {
                eprintln!("AWS_S3_TEST_PATH not set, skipping S3 upload/download test");
                return;
            }
        };
        let options = StreamOptions::default();

        // 测试前清理，目标可能不存在 / pre-test cleanup, target may not exist
        let _ = remove(&path, &options).await;

        let mut writer = open_writer(&path, &options).await.unwrap();
        writer.write_all(TEST_BYTES).await.unwrap();
        writer.close().await.unwrap();

        let mut reader = open_reader(&path, &options).await.unwrap();
        let mut redownloaded = Vec::new();
        reader.read_to_end(&mut redownloaded).await.unwrap();
        assert_eq!(redownloaded, TEST_BYTES);

        remove(&path, &options).await.unwrap();
    }

    /// fallback关闭且无显式凭证时，读写打开都必须失败。
    /// 凭证决策在打开时完成，本测试不触发网络。
    #[tokio::test]
    async fn test_error_without_ambient_fallback() {
        let options = StreamOptions::default().no_ambient_fallback();
        assert!(open_writer("s3://bucket/key", &options).await.is_err());
        assert!(open_reader("s3://bucket/key", &options).await.is_err());
    }
}
