// 存储能力模块
//
// 定义门面所依赖的分层存储能力，并提供内存与本地目录两种实现

mod backend;
mod guard;
mod local;
mod memory;
mod types;

pub use backend::{StorageBackend, WritableFileStream};
pub use guard::{is_temp_name, NameGuard, DEFAULT_MAX_NAME_LEN, TEMP_FILE_SUFFIX};
pub use local::DirStorage;
pub use memory::MemoryStorage;
pub use types::*;
