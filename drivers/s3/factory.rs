//! S3后端工厂

use anyhow::{anyhow, Result};

use crate::config::StreamOptions;
use crate::storage::{BackendFactory, StreamBackend};
use crate::utils::StreamTarget;
use super::config::S3Config;
use super::driver::S3Backend;

/// S3后端工厂
pub struct S3BackendFactory;

impl BackendFactory for S3BackendFactory {
    fn scheme(&self) -> &'static str {
        "s3"
    }

    fn create_backend(
        &self,
        target: &StreamTarget,
        options: &StreamOptions,
    ) -> Result<Box<dyn StreamBackend>> {
        let bucket = match target {
            StreamTarget::S3 { bucket, .. } => bucket.clone(),
            _ => return Err(anyhow!("目标不是S3路径")),
        };
        let config = S3Config::from_options(bucket, options);
        Ok(Box::new(S3Backend::new(config)?))
    }
}
