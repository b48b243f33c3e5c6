use async_trait::async_trait;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use std::ops::Range;

/// Boxed byte reader / 字节读取流
pub type ByteReader = Box<dyn AsyncRead + Unpin + Send>;
/// Boxed byte writer / 字节写入流
pub type ByteWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Object metadata / 对象元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Size in bytes / 字节大小
    pub size: u64,
    /// Last modified time (RFC3339) / 最后修改时间
    pub modified: Option<String>,
}

/// Backend capability declaration / 后端能力声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Support range reading / 支持范围读取
    pub can_range_read: bool,
    /// Support writing / 支持写入
    pub can_write: bool,
    /// Support deletion / 支持删除
    pub can_delete: bool,
}

impl Default for Capability {
    fn default() -> Self {
        Self {
            can_range_read: false,
            can_write: false,
            can_delete: false,
        }
    }
}

/// Stream backend interface (provides only primitive operations) / 流后端接口
///
/// One instance is scoped to a single target (an S3 bucket, the local
/// filesystem, an HTTP origin); the facade creates it per open call from
/// the parsed URI and the caller's options.
#[async_trait]
pub trait StreamBackend: Send + Sync {
    /// Backend name / 后端名称
    fn name(&self) -> &str;

    /// Backend capabilities / 后端能力
    fn capabilities(&self) -> Capability;

    /// Open reader (supports range reading) / 打开读取流
    async fn open_reader(&self, key: &str, range: Option<Range<u64>>) -> Result<ByteReader>;

    /// Open writer / 打开写入流
    /// Completion of shutdown implies the full byte sequence is durable.
    /// shutdown完成即表示完整字节序列已持久化。
    async fn open_writer(&self, key: &str, size_hint: Option<u64>) -> Result<ByteWriter>;

    /// Delete object / 删除对象
    async fn delete(&self, key: &str) -> Result<()>;

    /// Object metadata / 获取对象元数据
    async fn stat(&self, key: &str) -> Result<ObjectInfo>;
}

pub mod registry;

pub use registry::{default_registry, BackendFactory, BackendRegistry};
