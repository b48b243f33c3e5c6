//! S3后端配置与凭证决策

use serde::{Deserialize, Serialize};
use s3::creds::Credentials;
use thiserror::Error;

use crate::config::StreamOptions;

/// S3配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// 存储桶名称
    pub bucket: String,
    /// S3端点地址，None时使用AWS区域端点
    /// MinIO: http://localhost:9000
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// Access Key ID
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret Access Key
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Session Token（用于临时凭证）
    #[serde(default)]
    pub session_token: Option<String>,
    /// 强制使用路径风格（而非虚拟主机风格）
    /// MinIO等需要设置为true
    #[serde(default)]
    pub force_path_style: bool,
    /// 缺省显式凭证时是否允许环境凭证发现
    #[serde(default = "default_fallback")]
    pub fallback_to_ambient_credentials: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_fallback() -> bool {
    true
}

/// Credential resolution failure / 凭证解析失败
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing S3 credentials: no explicit access key and ambient fallback is disabled")]
    MissingCredentials,
    #[error("incomplete S3 credentials: access_key_id and secret_access_key must be provided together")]
    IncompleteCredentials,
    #[error("ambient credential discovery failed: {0}")]
    Discovery(#[from] s3::creds::error::CredentialsError),
}

impl S3Config {
    /// Build from facade options plus the parsed bucket / 从门面选项和存储桶构建
    pub fn from_options(bucket: String, options: &StreamOptions) -> Self {
        Self {
            bucket,
            endpoint: options.endpoint.clone(),
            region: options.region.clone(),
            access_key_id: options.access_key_id.clone(),
            secret_access_key: options.secret_access_key.clone(),
            session_token: options.session_token.clone(),
            force_path_style: options.force_path_style,
            fallback_to_ambient_credentials: options.fallback_to_ambient_credentials,
        }
    }

    /// Decide how credentials are obtained / 凭证获取决策
    ///
    /// 显式密钥对直接构建；两者都缺省时，仅在fallback开启的情况下运行
    /// SDK的环境凭证链（环境变量、共享配置文件、实例元数据服务）。
    pub fn resolve_credentials(&self) -> Result<Credentials, CredentialError> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access_key), Some(secret_key)) => Ok(Credentials::new(
                Some(access_key),
                Some(secret_key),
                self.session_token.as_deref(),
                None,
                None,
            )?),
            (None, None) => {
                if !self.fallback_to_ambient_credentials {
                    return Err(CredentialError::MissingCredentials);
                }
                // 委托给SDK的凭证链，查找顺序属于SDK的职责
                Ok(Credentials::default()?)
            }
            _ => Err(CredentialError::IncompleteCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> S3Config {
        S3Config::from_options("bucket".to_string(), &StreamOptions::default())
    }

    #[test]
    fn test_resolve_credentials_explicit() {
        let mut config = base_config();
        config.access_key_id = Some("AKIAEXAMPLE".to_string());
        config.secret_access_key = Some("secret".to_string());
        let credentials = config.resolve_credentials().unwrap();
        assert_eq!(credentials.access_key.as_deref(), Some("AKIAEXAMPLE"));
    }

    #[test]
    fn test_resolve_credentials_fallback_disabled() {
        let mut config = base_config();
        config.fallback_to_ambient_credentials = false;
        let err = config.resolve_credentials().unwrap_err();
        assert!(matches!(err, CredentialError::MissingCredentials));
    }

    #[test]
    fn test_resolve_credentials_incomplete_pair() {
        let mut config = base_config();
        config.access_key_id = Some("AKIAEXAMPLE".to_string());
        let err = config.resolve_credentials().unwrap_err();
        assert!(matches!(err, CredentialError::IncompleteCredentials));

        let mut config = base_config();
        config.secret_access_key = Some("secret".to_string());
        assert!(matches!(
            config.resolve_credentials().unwrap_err(),
            CredentialError::IncompleteCredentials
        ));
    }
}
