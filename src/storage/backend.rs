//! 存储能力抽象
//!
//! 私有文件系统本身不在本库实现范围内，这里只约定门面需要的最小能力集：
//! 获取根目录、按名取得（或创建）目录与文件、删除条目、枚举目录、整文件读写。

use async_trait::async_trait;

use super::types::{DirHandle, FileHandle, StorageEntry, StorageError};

/// 分层存储能力
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// 获取根目录句柄
    async fn root(&self) -> Result<DirHandle, StorageError>;

    /// 获取 `parent` 下名为 `name` 的目录
    ///
    /// `create` 为 false 时目录必须已存在
    async fn directory(
        &self,
        parent: &DirHandle,
        name: &str,
        create: bool,
    ) -> Result<DirHandle, StorageError>;

    /// 获取 `dir` 下名为 `name` 的文件
    ///
    /// `create` 为 true 时不存在则创建空文件
    async fn file(
        &self,
        dir: &DirHandle,
        name: &str,
        create: bool,
    ) -> Result<FileHandle, StorageError>;

    /// 删除 `dir` 下的条目，非空目录需要 `recursive`
    async fn remove_entry(
        &self,
        dir: &DirHandle,
        name: &str,
        recursive: bool,
    ) -> Result<(), StorageError>;

    /// 枚举目录的直接子条目
    async fn entries(&self, dir: &DirHandle) -> Result<Vec<StorageEntry>, StorageError>;

    /// 以文本读取整个文件（非法 UTF-8 按替换字符处理）
    async fn read_text(&self, file: &FileHandle) -> Result<String, StorageError>;

    /// 打开整文件覆盖写入流
    async fn create_writable(
        &self,
        file: &FileHandle,
    ) -> Result<Box<dyn WritableFileStream>, StorageError>;
}

/// 整文件覆盖写入流
///
/// 写入内容先缓存，`close` 时一次性替换文件内容；未关闭即丢弃则不生效
#[async_trait]
pub trait WritableFileStream: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), StorageError>;

    async fn close(&mut self) -> Result<(), StorageError>;
}
