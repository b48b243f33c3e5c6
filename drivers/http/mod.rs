mod driver;

pub use driver::{HttpBackend, HttpBackendFactory};
