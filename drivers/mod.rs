// Backend package / 后端包
pub mod local;
pub mod s3;
pub mod http;

use std::sync::Arc;

use crate::storage::BackendRegistry;

/// Register all backends to BackendRegistry / 注册所有后端
pub fn register_all(registry: &BackendRegistry) {
    // Register local filesystem backend / 注册本地文件系统后端
    registry.register_factory(Arc::new(local::LocalBackendFactory));
    // Register S3 object storage backend / 注册S3对象存储后端
    registry.register_factory(Arc::new(s3::S3BackendFactory));
    // Register read-only HTTP backend / 注册HTTP只读后端
    registry.register_factory(Arc::new(http::HttpBackendFactory));
}
