//! HTTP只读后端
//!
//! 通过GET流式读取远程URL，HEAD获取元数据。写入和删除不受支持。

use async_trait::async_trait;
use anyhow::{anyhow, Result};
use futures::TryStreamExt;
use std::ops::Range;

use crate::config::StreamOptions;
use crate::storage::{BackendFactory, ByteReader, ByteWriter, Capability, ObjectInfo, StreamBackend};
use crate::utils::StreamTarget;

/// HTTP后端
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn capabilities(&self) -> Capability {
        Capability {
            can_range_read: true,
            can_write: false,
            can_delete: false,
        }
    }

    async fn open_reader(&self, url: &str, range: Option<Range<u64>>) -> Result<ByteReader> {
        let mut request = self.client.get(url);
        if let Some(r) = range {
            // Range为右开区间，HTTP Range头为闭区间
            request = request.header(
                reqwest::header::RANGE,
                format!("bytes={}-{}", r.start, r.end.saturating_sub(1)),
            );
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("HTTP请求失败: {}: {}", url, e))?
            .error_for_status()
            .map_err(|e| anyhow!("HTTP响应错误: {}: {}", url, e))?;

        // 将响应体流桥接为AsyncRead（Box::pin保证Unpin）
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(tokio_util::io::StreamReader::new(Box::pin(stream))))
    }

    async fn open_writer(&self, url: &str, _size_hint: Option<u64>) -> Result<ByteWriter> {
        Err(anyhow!("HTTP后端不支持写入: {}", url))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        Err(anyhow!("HTTP后端不支持删除: {}", url))
    }

    async fn stat(&self, url: &str) -> Result<ObjectInfo> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP请求失败: {}: {}", url, e))?
            .error_for_status()
            .map_err(|e| anyhow!("HTTP响应错误: {}: {}", url, e))?;

        let size = response.content_length().unwrap_or(0);
        let modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(ObjectInfo { size, modified })
    }
}

/// HTTP后端工厂（http与https共用）
pub struct HttpBackendFactory;

impl BackendFactory for HttpBackendFactory {
    fn scheme(&self) -> &'static str {
        "http"
    }

    fn create_backend(
        &self,
        target: &StreamTarget,
        _options: &StreamOptions,
    ) -> Result<Box<dyn StreamBackend>> {
        match target {
            StreamTarget::Http { .. } => Ok(Box::new(HttpBackend::new())),
            _ => Err(anyhow!("目标不是HTTP地址")),
        }
    }
}
