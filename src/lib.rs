pub mod config;
pub mod utils;
pub mod storage;
pub mod stream;

// Backend modules (point to project root drivers via path attribute) / 后端模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use config::StreamOptions;
pub use storage::{default_registry, BackendFactory, BackendRegistry, Capability, ObjectInfo, StreamBackend};
pub use stream::{
    open_reader, open_reader_range, open_stream, open_writer, remove, stat, ObjectStream,
    OpenMode, StreamReader, StreamWriter,
};
pub use utils::StreamTarget;
