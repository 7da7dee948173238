// Private FS Rust Library
// 按源隔离的私有文件系统门面

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 事件通知模块
pub mod events;

// 存储后端模块
pub mod storage;

// 下载保存 / 上传传输模块
pub mod transport;

// 门面模块
pub mod facade;

// 导出常用类型
pub use config::{AppConfig, LogConfig, StorageBackendKind};
pub use events::{EventKind, EventNotifier, EventPayload, FileCreatedPayload};
pub use facade::{FacadeState, StorageFacade, StorageIndex};
pub use storage::{
    DirStorage, MemoryStorage, NameGuard, StorageBackend, StorageError, StorageErrorCode,
};
pub use transport::{FileSaver, FileUploader, HttpUploader, LocalFileSaver};
