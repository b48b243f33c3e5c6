//! URI parsing utility functions / 路径解析工具函数

use anyhow::{anyhow, Result};

/// Parsed stream target / 解析后的流目标
///
/// `s3://bucket/key` addresses an object, `http(s)://` a remote URL,
/// everything else (including `file://`) a local filesystem path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// Local filesystem path / 本地文件系统路径
    Local { path: String },
    /// S3 object: bucket + object key / S3对象：存储桶 + 对象键
    S3 { bucket: String, key: String },
    /// HTTP(S) URL / HTTP(S)地址
    Http { url: String },
}

impl StreamTarget {
    /// Parse a URI into a target / 解析URI
    ///
    /// For S3 the second path segment is the bucket and the remainder is
    /// the object key. / S3路径的第二段是存储桶，其余部分是对象键。
    pub fn parse(uri: &str) -> Result<Self> {
        if let Some(rest) = uri.strip_prefix("s3://") {
            let (bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| anyhow!("S3路径缺少对象键: {}", uri))?;
            if bucket.is_empty() {
                return Err(anyhow!("S3路径缺少存储桶名称: {}", uri));
            }
            let key = key.trim_start_matches('/');
            if key.is_empty() {
                return Err(anyhow!("S3路径缺少对象键: {}", uri));
            }
            return Ok(StreamTarget::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        if uri.starts_with("http://") || uri.starts_with("https://") {
            let parsed = url::Url::parse(uri).map_err(|e| anyhow!("无效的HTTP地址: {}: {}", uri, e))?;
            if parsed.host_str().is_none() {
                return Err(anyhow!("HTTP地址缺少主机名: {}", uri));
            }
            return Ok(StreamTarget::Http {
                url: uri.to_string(),
            });
        }

        let path = uri.strip_prefix("file://").unwrap_or(uri);
        if path.is_empty() {
            return Err(anyhow!("路径为空"));
        }
        Ok(StreamTarget::Local {
            path: path.to_string(),
        })
    }

    /// Registry key for this target / 后端注册表使用的scheme
    pub fn scheme(&self) -> &'static str {
        match self {
            StreamTarget::Local { .. } => "local",
            StreamTarget::S3 { .. } => "s3",
            StreamTarget::Http { .. } => "http",
        }
    }

    /// Backend-relative key: object key, URL, or local path
    /// 后端相对键：对象键、URL或本地路径
    pub fn key(&self) -> &str {
        match self {
            StreamTarget::Local { path } => path,
            StreamTarget::S3 { key, .. } => key,
            StreamTarget::Http { url } => url,
        }
    }
}

/// Decompose an s3:// URI into (bucket, key) / 拆分S3路径为（存储桶，对象键）
pub fn split_bucket_key(uri: &str) -> Result<(String, String)> {
    match StreamTarget::parse(uri)? {
        StreamTarget::S3 { bucket, key } => Ok((bucket, key)),
        _ => Err(anyhow!("不是S3路径: {}", uri)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_target() {
        let target = StreamTarget::parse("s3://my-bucket/models/weights.tensors").unwrap();
        assert_eq!(
            target,
            StreamTarget::S3 {
                bucket: "my-bucket".to_string(),
                key: "models/weights.tensors".to_string(),
            }
        );
        assert_eq!(target.scheme(), "s3");
        assert_eq!(target.key(), "models/weights.tensors");
    }

    #[test]
    fn test_parse_s3_invalid() {
        // 缺少对象键
        assert!(StreamTarget::parse("s3://my-bucket").is_err());
        assert!(StreamTarget::parse("s3://my-bucket/").is_err());
        // 缺少存储桶
        assert!(StreamTarget::parse("s3:///key").is_err());
    }

    #[test]
    fn test_parse_http_target() {
        let target = StreamTarget::parse("https://example.com/data.bin").unwrap();
        assert_eq!(target.scheme(), "http");
        assert_eq!(target.key(), "https://example.com/data.bin");
        assert!(StreamTarget::parse("http://").is_err());
    }

    #[test]
    fn test_parse_local_target() {
        let target = StreamTarget::parse("/tmp/weights.tensors").unwrap();
        assert_eq!(target.scheme(), "local");
        assert_eq!(target.key(), "/tmp/weights.tensors");

        // file:// prefix is stripped / file://前缀被剥离
        let target = StreamTarget::parse("file:///tmp/weights.tensors").unwrap();
        assert_eq!(target.key(), "/tmp/weights.tensors");

        assert!(StreamTarget::parse("").is_err());
    }

    #[test]
    fn test_split_bucket_key() {
        let (bucket, key) = split_bucket_key("s3://bucket/a/b/c").unwrap();
        assert_eq!(bucket, "bucket");
        assert_eq!(key, "a/b/c");
        assert!(split_bucket_key("/local/path").is_err());
    }
}
