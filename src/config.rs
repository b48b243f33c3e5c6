//! Stream open options / 流打开选项
//!
//! The option surface accepted by every open call. Credential fields are
//! nullable; when both key parts are absent the ambient fallback flag
//! decides whether the S3 backend may search the environment, shared
//! config files and the instance metadata service for credentials.
//! 每次打开调用接受的选项。凭证字段可空；当两个密钥都缺省时，
//! 由 fallback 开关决定 S3 后端是否允许从环境中自动发现凭证。

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options consumed by the facade open call / 打开调用消费的选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Explicit access key (optional) / 显式 Access Key ID（可选）
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Explicit secret key (optional) / 显式 Secret Access Key（可选）
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Session token for temporary credentials / 临时凭证的会话令牌
    #[serde(default)]
    pub session_token: Option<String>,
    /// Custom S3 endpoint, None uses the regional AWS endpoint
    /// 自定义S3端点，None时使用AWS区域端点
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// 强制使用路径风格（而非虚拟主机风格）
    /// MinIO等需要设置为true
    #[serde(default)]
    pub force_path_style: bool,
    /// Allow ambient credential discovery when no explicit credentials
    /// are given / 缺省显式凭证时是否允许环境凭证发现
    #[serde(default = "default_fallback")]
    pub fallback_to_ambient_credentials: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_fallback() -> bool {
    true
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint: None,
            region: default_region(),
            force_path_style: false,
            fallback_to_ambient_credentials: default_fallback(),
        }
    }
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credentials(mut self, access_key_id: &str, secret_access_key: &str) -> Self {
        self.access_key_id = Some(access_key_id.to_string());
        self.secret_access_key = Some(secret_access_key.to_string());
        self
    }

    pub fn session_token(mut self, token: &str) -> Self {
        self.session_token = Some(token.to_string());
        self
    }

    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn force_path_style(mut self) -> Self {
        self.force_path_style = true;
        self
    }

    /// Disable ambient credential discovery; opening an S3 stream without
    /// explicit credentials then fails before any network activity.
    /// 关闭环境凭证发现；此时无显式凭证的S3打开在任何网络活动前失败。
    pub fn no_ambient_fallback(mut self) -> Self {
        self.fallback_to_ambient_credentials = false;
        self
    }

    /// Parse options from a JSON value / 从JSON解析选项
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| anyhow!("选项解析失败: {}", e))
    }
}
