use std::collections::HashMap;
use std::sync::Arc;
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::StreamOptions;
use crate::utils::StreamTarget;
use super::StreamBackend;

/// Backend factory trait / 后端工厂 trait
pub trait BackendFactory: Send + Sync {
    /// URI scheme handled by this factory / 工厂处理的scheme
    fn scheme(&self) -> &'static str;

    /// 创建后端实例
    fn create_backend(
        &self,
        target: &StreamTarget,
        options: &StreamOptions,
    ) -> Result<Box<dyn StreamBackend>>;
}

/// Backend registry (maps URI schemes to factories) / 后端注册表
pub struct BackendRegistry {
    factories: RwLock<HashMap<String, Arc<dyn BackendFactory>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register backend factory / 注册后端工厂
    pub fn register_factory(&self, factory: Arc<dyn BackendFactory>) {
        let scheme = factory.scheme().to_string();
        self.factories.write().insert(scheme.clone(), factory);
        tracing::debug!("Backend factory registered: {}", scheme);
    }

    /// Create a backend for the parsed target / 为目标创建后端实例
    pub fn create_for(
        &self,
        target: &StreamTarget,
        options: &StreamOptions,
    ) -> Result<Box<dyn StreamBackend>> {
        let factories = self.factories.read();
        let factory = factories
            .get(target.scheme())
            .ok_or_else(|| anyhow!("未注册的存储后端: {}", target.scheme()))?;
        factory.create_backend(target, options)
    }

    /// List registered schemes / 列出已注册的scheme
    pub fn list_schemes(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide registry with all built-in backends registered
/// 进程级注册表，内置后端已全部注册
pub fn default_registry() -> &'static BackendRegistry {
    static REGISTRY: Lazy<BackendRegistry> = Lazy::new(|| {
        let registry = BackendRegistry::new();
        crate::drivers::register_all(&registry);
        registry
    });
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_schemes() {
        let mut schemes = default_registry().list_schemes();
        schemes.sort();
        assert_eq!(schemes, vec!["http", "local", "s3"]);
    }

    #[test]
    fn test_create_for_local() {
        let target = StreamTarget::parse("/tmp/data.bin").unwrap();
        let backend = default_registry()
            .create_for(&target, &StreamOptions::default())
            .unwrap();
        assert_eq!(backend.name(), "local");
    }

    #[test]
    fn test_create_for_unregistered_scheme() {
        let registry = BackendRegistry::new();
        let target = StreamTarget::parse("s3://bucket/key").unwrap();
        let err = registry
            .create_for(&target, &StreamOptions::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("s3"));
    }

    #[test]
    fn test_create_for_s3_without_credentials_or_fallback() {
        // 凭证决策在创建后端时完成，不触发网络
        let target = StreamTarget::parse("s3://bucket/key").unwrap();
        let options = StreamOptions::default().no_ambient_fallback();
        assert!(default_registry().create_for(&target, &options).is_err());
    }
}
