use async_trait::async_trait;
use anyhow::{anyhow, Result};
use std::ops::Range;
use std::path::PathBuf;

use crate::config::StreamOptions;
use crate::storage::{BackendFactory, ByteReader, ByteWriter, Capability, ObjectInfo, StreamBackend};
use crate::utils::StreamTarget;

/// Local filesystem backend / 本地文件系统后端
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }

    fn resolve_path(&self, key: &str) -> PathBuf {
        PathBuf::from(key.replace('\\', "/"))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn capabilities(&self) -> Capability {
        Capability {
            can_range_read: true,
            can_write: true,
            can_delete: true,
        }
    }

    async fn open_reader(&self, key: &str, range: Option<Range<u64>>) -> Result<ByteReader> {
        let full_path = self.resolve_path(key);
        let range_clone = range.clone();

        // Use sync IO to improve network share performance / 使用同步IO
        let file = tokio::task::spawn_blocking(move || {
            let mut file = std::fs::File::open(&full_path)?;
            if let Some(r) = range_clone {
                use std::io::Seek;
                file.seek(std::io::SeekFrom::Start(r.start))?;
            }
            Ok::<std::fs::File, anyhow::Error>(file)
        })
        .await??;

        // Convert to async / 转换为异步
        let async_file = tokio::fs::File::from_std(file);

        if let Some(r) = range {
            use tokio::io::AsyncReadExt;
            let limited = async_file.take(r.end - r.start);
            Ok(Box::new(limited))
        } else {
            Ok(Box::new(async_file))
        }
    }

    async fn open_writer(&self, key: &str, _size_hint: Option<u64>) -> Result<ByteWriter> {
        let full_path = self.resolve_path(key);

        // Use sync IO to improve network share performance / 使用同步IO
        let file = tokio::task::spawn_blocking(move || {
            // Ensure parent directory exists / 确保父目录存在
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(&full_path)?;
            Ok::<std::fs::File, anyhow::Error>(file)
        })
        .await??;

        // Convert to async / 转换为异步
        let async_file = tokio::fs::File::from_std(file);
        Ok(Box::new(async_file))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.resolve_path(key);
        tokio::fs::remove_file(full_path).await?;
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        let full_path = self.resolve_path(key);
        let metadata = tokio::fs::metadata(&full_path).await?;
        if metadata.is_dir() {
            return Err(anyhow!("目标是目录而不是文件: {:?}", full_path));
        }

        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| chrono::DateTime::from_timestamp(d.as_secs() as i64, 0))
            .map(|dt| dt.to_rfc3339());

        Ok(ObjectInfo {
            size: metadata.len(),
            modified,
        })
    }
}

/// 本地后端工厂
pub struct LocalBackendFactory;

impl BackendFactory for LocalBackendFactory {
    fn scheme(&self) -> &'static str {
        "local"
    }

    fn create_backend(
        &self,
        target: &StreamTarget,
        _options: &StreamOptions,
    ) -> Result<Box<dyn StreamBackend>> {
        match target {
            StreamTarget::Local { .. } => Ok(Box::new(LocalBackend::new())),
            _ => Err(anyhow!("目标不是本地路径")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_writer_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/payload.bin");
        let backend = LocalBackend::new();

        let mut writer = backend
            .open_writer(path.to_str().unwrap(), None)
            .await
            .unwrap();
        writer.write_all(b"abc").await.unwrap();
        writer.shutdown().await.unwrap();

        let info = backend.stat(path.to_str().unwrap()).await.unwrap();
        assert_eq!(info.size, 3);
    }

    #[tokio::test]
    async fn test_range_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"0123456789").unwrap();
        let backend = LocalBackend::new();

        let mut reader = backend
            .open_reader(path.to_str().unwrap(), Some(2..6))
            .await
            .unwrap();
        let mut part = Vec::new();
        reader.read_to_end(&mut part).await.unwrap();
        assert_eq!(part, b"2345");
    }

    #[tokio::test]
    async fn test_delete_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bin");
        let backend = LocalBackend::new();
        assert!(backend.delete(path.to_str().unwrap()).await.is_err());
    }
}
