// 内存存储后端
//
// 进程内的目录树，适用于测试和临时会话。克隆出的实例共享同一棵树。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::{StorageBackend, WritableFileStream};
use super::guard::NameGuard;
use super::types::*;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<String, Node>),
}

impl Node {
    fn size(&self) -> u64 {
        match self {
            Node::File(data) => data.len() as u64,
            Node::Dir(children) => children.values().map(Node::size).sum(),
        }
    }
}

#[derive(Debug)]
struct MemoryInner {
    tree: Mutex<BTreeMap<String, Node>>,
    /// 全部文件内容的字节上限
    quota: Option<u64>,
}

/// 内存存储后端
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    inner: Arc<MemoryInner>,
    guard: NameGuard,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// 创建带字节配额的内存存储
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self::build(Some(quota_bytes))
    }

    fn build(quota: Option<u64>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                tree: Mutex::new(BTreeMap::new()),
                quota,
            }),
            guard: NameGuard::default(),
        }
    }

    pub fn with_guard(mut self, guard: NameGuard) -> Self {
        self.guard = guard;
        self
    }

    /// 当前已用字节数
    pub fn used_bytes(&self) -> u64 {
        self.inner.tree.lock().values().map(Node::size).sum()
    }
}

fn dir_ref<'a>(
    root: &'a BTreeMap<String, Node>,
    dir: &DirHandle,
) -> Result<&'a BTreeMap<String, Node>, StorageError> {
    let mut current = root;
    for segment in dir.segments() {
        current = match current.get(segment) {
            Some(Node::Dir(children)) => children,
            Some(Node::File(_)) => {
                return Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(segment))
            }
            None => {
                return Err(StorageError::new(StorageErrorCode::DirectoryNotFound).with_name(segment))
            }
        };
    }
    Ok(current)
}

fn dir_mut<'a>(
    root: &'a mut BTreeMap<String, Node>,
    dir: &DirHandle,
) -> Result<&'a mut BTreeMap<String, Node>, StorageError> {
    let mut current = root;
    for segment in dir.segments() {
        current = match current.get_mut(segment) {
            Some(Node::Dir(children)) => children,
            Some(Node::File(_)) => {
                return Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(segment))
            }
            None => {
                return Err(StorageError::new(StorageErrorCode::DirectoryNotFound).with_name(segment))
            }
        };
    }
    Ok(current)
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn root(&self) -> Result<DirHandle, StorageError> {
        Ok(DirHandle::root())
    }

    async fn directory(
        &self,
        parent: &DirHandle,
        name: &str,
        create: bool,
    ) -> Result<DirHandle, StorageError> {
        let name = self.guard.check(name)?;
        let mut tree = self.inner.tree.lock();
        let children = dir_mut(&mut tree, parent)?;

        match children.get(name) {
            Some(Node::Dir(_)) => {}
            Some(Node::File(_)) => {
                return Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(name))
            }
            None if create => {
                children.insert(name.to_string(), Node::Dir(BTreeMap::new()));
            }
            None => {
                return Err(StorageError::new(StorageErrorCode::DirectoryNotFound).with_name(name))
            }
        }

        Ok(parent.child(name))
    }

    async fn file(
        &self,
        dir: &DirHandle,
        name: &str,
        create: bool,
    ) -> Result<FileHandle, StorageError> {
        let name = self.guard.check(name)?;
        let mut tree = self.inner.tree.lock();
        let children = dir_mut(&mut tree, dir)?;

        match children.get(name) {
            Some(Node::File(_)) => {}
            Some(Node::Dir(_)) => {
                return Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(name))
            }
            None if create => {
                children.insert(name.to_string(), Node::File(Vec::new()));
            }
            None => {
                return Err(StorageError::new(StorageErrorCode::FileNotFound).with_name(name))
            }
        }

        Ok(FileHandle::new(dir.clone(), name))
    }

    async fn remove_entry(
        &self,
        dir: &DirHandle,
        name: &str,
        recursive: bool,
    ) -> Result<(), StorageError> {
        let name = self.guard.check(name)?;
        let mut tree = self.inner.tree.lock();
        let children = dir_mut(&mut tree, dir)?;

        match children.get(name) {
            None => Err(StorageError::new(StorageErrorCode::FileNotFound).with_name(name)),
            Some(Node::Dir(grandchildren)) if !recursive && !grandchildren.is_empty() => {
                Err(StorageError::new(StorageErrorCode::DirectoryNotEmpty).with_name(name))
            }
            Some(_) => {
                children.remove(name);
                Ok(())
            }
        }
    }

    async fn entries(&self, dir: &DirHandle) -> Result<Vec<StorageEntry>, StorageError> {
        let tree = self.inner.tree.lock();
        let children = dir_ref(&tree, dir)?;

        Ok(children
            .iter()
            .map(|(name, node)| match node {
                Node::File(_) => StorageEntry::file(name.as_str()),
                Node::Dir(_) => StorageEntry::directory(name.as_str()),
            })
            .collect())
    }

    async fn read_text(&self, file: &FileHandle) -> Result<String, StorageError> {
        let tree = self.inner.tree.lock();
        let children = dir_ref(&tree, &file.dir)?;

        match children.get(&file.name) {
            Some(Node::File(data)) => Ok(String::from_utf8_lossy(data).into_owned()),
            Some(Node::Dir(_)) => {
                Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(&file.name))
            }
            None => Err(StorageError::new(StorageErrorCode::FileNotFound).with_name(&file.name)),
        }
    }

    async fn create_writable(
        &self,
        file: &FileHandle,
    ) -> Result<Box<dyn WritableFileStream>, StorageError> {
        // 打开时文件必须存在
        self.read_text(file).await?;

        Ok(Box::new(MemoryWritable {
            inner: Arc::clone(&self.inner),
            file: file.clone(),
            buffer: Vec::new(),
            closed: false,
        }))
    }
}

/// 内存写入流
struct MemoryWritable {
    inner: Arc<MemoryInner>,
    file: FileHandle,
    buffer: Vec<u8>,
    closed: bool,
}

#[async_trait]
impl WritableFileStream for MemoryWritable {
    async fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::new(StorageErrorCode::StreamClosed)
                .with_name(self.file.display_path()));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::new(StorageErrorCode::StreamClosed)
                .with_name(self.file.display_path()));
        }
        self.closed = true;

        let mut tree = self.inner.tree.lock();

        if let Some(quota) = self.inner.quota {
            let used: u64 = tree.values().map(Node::size).sum();
            let old_len = match dir_ref(&tree, &self.file.dir)?.get(&self.file.name) {
                Some(Node::File(data)) => data.len() as u64,
                _ => 0,
            };
            let projected = used - old_len + self.buffer.len() as u64;
            if projected > quota {
                return Err(StorageError::new(StorageErrorCode::QuotaExceeded)
                    .with_name(self.file.display_path())
                    .with_message(format!(
                        "超出存储配额: 需要 {} 字节，上限 {} 字节",
                        projected, quota
                    )));
            }
        }

        let children = dir_mut(&mut tree, &self.file.dir)?;
        match children.get_mut(&self.file.name) {
            Some(Node::File(data)) => {
                *data = std::mem::take(&mut self.buffer);
                Ok(())
            }
            Some(Node::Dir(_)) => {
                Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(&self.file.name))
            }
            None => {
                Err(StorageError::new(StorageErrorCode::FileNotFound).with_name(&self.file.name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_text(storage: &MemoryStorage, file: &FileHandle, text: &str) {
        let mut writer = storage.create_writable(file).await.unwrap();
        writer.write(text.as_bytes()).await.unwrap();
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_create_and_lookup() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();

        let err = storage.directory(&root, "docs", false).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::DirectoryNotFound);

        let docs = storage.directory(&root, "docs", true).await.unwrap();
        assert_eq!(docs.name(), "docs");
        // 已存在时再次创建不报错
        assert!(storage.directory(&root, "docs", true).await.is_ok());
        assert!(storage.directory(&root, "docs", false).await.is_ok());
    }

    #[tokio::test]
    async fn test_file_write_and_read() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        let file = storage.file(&root, "a.txt", true).await.unwrap();

        assert_eq!(storage.read_text(&file).await.unwrap(), "");

        write_text(&storage, &file, "hello").await;
        assert_eq!(storage.read_text(&file).await.unwrap(), "hello");

        // 覆盖写入
        write_text(&storage, &file, "v2").await;
        assert_eq!(storage.read_text(&file).await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_writer_without_close_does_not_commit() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        let file = storage.file(&root, "a.txt", true).await.unwrap();

        let mut writer = storage.create_writable(&file).await.unwrap();
        writer.write(b"pending").await.unwrap();
        drop(writer);

        assert_eq!(storage.read_text(&file).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_writer_rejects_after_close() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        let file = storage.file(&root, "a.txt", true).await.unwrap();

        let mut writer = storage.create_writable(&file).await.unwrap();
        writer.close().await.unwrap();
        let err = writer.write(b"late").await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::StreamClosed);
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        let docs = storage.directory(&root, "docs", true).await.unwrap();
        storage.file(&docs, "a.txt", true).await.unwrap();

        let err = storage.remove_entry(&root, "docs", false).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::DirectoryNotEmpty);

        storage.remove_entry(&root, "docs", true).await.unwrap();
        assert!(storage.entries(&root).await.unwrap().is_empty());

        let err = storage.remove_entry(&root, "docs", true).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::FileNotFound);
    }

    #[tokio::test]
    async fn test_entries_kinds() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        storage.directory(&root, "docs", true).await.unwrap();
        storage.file(&root, "readme.md", true).await.unwrap();

        let entries = storage.entries(&root).await.unwrap();
        assert_eq!(
            entries,
            vec![StorageEntry::directory("docs"), StorageEntry::file("readme.md")]
        );
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        storage.file(&root, "x", true).await.unwrap();

        let err = storage.directory(&root, "x", true).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::TypeMismatch);
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let storage = MemoryStorage::with_quota(4);
        let root = storage.root().await.unwrap();
        let file = storage.file(&root, "a.txt", true).await.unwrap();

        write_text(&storage, &file, "abcd").await;
        assert_eq!(storage.used_bytes(), 4);

        let mut writer = storage.create_writable(&file).await.unwrap();
        writer.write(b"abcde").await.unwrap();
        let err = writer.close().await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::QuotaExceeded);
        assert_eq!(storage.read_text(&file).await.unwrap(), "abcd");
    }

    #[tokio::test]
    async fn test_clones_share_tree() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        let root = storage.root().await.unwrap();
        storage.directory(&root, "docs", true).await.unwrap();

        assert_eq!(other.entries(&root).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_name() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        let err = storage.file(&root, "../etc", true).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::InvalidName);
    }
}
