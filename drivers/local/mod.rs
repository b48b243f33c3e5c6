mod driver;

pub use driver::{LocalBackend, LocalBackendFactory};
