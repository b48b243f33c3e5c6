mod config;
mod driver;
mod factory;

pub use config::{CredentialError, S3Config};
pub use driver::S3Backend;
pub use factory::S3BackendFactory;
