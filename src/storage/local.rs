// 本地目录存储后端
//
// 以磁盘上的一个沙箱目录充当私有文件系统的根

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::backend::{StorageBackend, WritableFileStream};
use super::guard::{is_temp_name, NameGuard, TEMP_FILE_SUFFIX};
use super::types::*;

/// 本地目录存储后端
#[derive(Debug, Clone)]
pub struct DirStorage {
    root_dir: PathBuf,
    guard: NameGuard,
}

impl DirStorage {
    /// 创建存储后端（根目录在 `root()` 时按需创建）
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            guard: NameGuard::default(),
        }
    }

    pub fn with_guard(mut self, guard: NameGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn dir_path(&self, dir: &DirHandle) -> PathBuf {
        let mut path = self.root_dir.clone();
        for segment in dir.segments() {
            path.push(segment);
        }
        path
    }

    fn file_path(&self, file: &FileHandle) -> PathBuf {
        self.dir_path(&file.dir).join(&file.name)
    }

    /// 确认句柄指向的目录仍然存在
    async fn ensure_dir(&self, dir: &DirHandle) -> Result<PathBuf, StorageError> {
        let path = self.dir_path(dir);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(dir.name())),
            Err(_) => {
                Err(StorageError::new(StorageErrorCode::DirectoryNotFound).with_name(dir.name()))
            }
        }
    }
}

#[async_trait]
impl StorageBackend for DirStorage {
    async fn root(&self) -> Result<DirHandle, StorageError> {
        fs::create_dir_all(&self.root_dir).await?;
        debug!("存储根目录: {:?}", self.root_dir);
        Ok(DirHandle::root())
    }

    async fn directory(
        &self,
        parent: &DirHandle,
        name: &str,
        create: bool,
    ) -> Result<DirHandle, StorageError> {
        let name = self.guard.check(name)?;
        let path = self.ensure_dir(parent).await?.join(name);

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(name)),
            Err(_) if create => fs::create_dir(&path).await?,
            Err(_) => {
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
        let path = self.ensure_dir(dir).await?.join(name);

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StorageError::new(StorageErrorCode::TypeMismatch).with_name(name)),
            Err(_) if create => {
                fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(false)
                    .open(&path)
                    .await?;
            }
            Err(_) => {
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
        let path = self.ensure_dir(dir).await?.join(name);

        let meta = fs::symlink_metadata(&path)
            .await
            .map_err(|_| StorageError::new(StorageErrorCode::FileNotFound).with_name(name))?;

        if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(&path).await?;
            } else {
                let mut read_dir = fs::read_dir(&path).await?;
                if read_dir.next_entry().await?.is_some() {
                    return Err(
                        StorageError::new(StorageErrorCode::DirectoryNotEmpty).with_name(name)
                    );
                }
                fs::remove_dir(&path).await?;
            }
        } else {
            fs::remove_file(&path).await?;
        }

        Ok(())
    }

    async fn entries(&self, dir: &DirHandle) -> Result<Vec<StorageEntry>, StorageError> {
        let path = self.ensure_dir(dir).await?;
        let mut read_dir = fs::read_dir(&path).await?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_temp_name(&name) {
                // 中断写入遗留的临时文件
                debug!("跳过临时文件: {:?}", entry.path());
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                entries.push(StorageEntry::directory(name));
            } else if file_type.is_file() {
                entries.push(StorageEntry::file(name));
            } else {
                // 符号链接等特殊条目不属于私有文件系统的模型
                debug!("跳过特殊条目: {:?}", entry.path());
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_text(&self, file: &FileHandle) -> Result<String, StorageError> {
        let path = self.file_path(file);
        let data = fs::read(&path).await.map_err(|e| {
            StorageError::from(e).with_name(file.display_path())
        })?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    async fn create_writable(
        &self,
        file: &FileHandle,
    ) -> Result<Box<dyn WritableFileStream>, StorageError> {
        let path = self.file_path(file);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(StorageError::new(StorageErrorCode::TypeMismatch)
                    .with_name(file.display_path()))
            }
            Err(_) => {
                return Err(StorageError::new(StorageErrorCode::FileNotFound)
                    .with_name(file.display_path()))
            }
        }

        Ok(Box::new(DirWritable {
            path,
            display: file.display_path(),
            buffer: Vec::new(),
            closed: false,
        }))
    }
}

/// 本地文件写入流
struct DirWritable {
    path: PathBuf,
    display: String,
    buffer: Vec<u8>,
    closed: bool,
}

#[async_trait]
impl WritableFileStream for DirWritable {
    async fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::new(StorageErrorCode::StreamClosed).with_name(&self.display));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::new(StorageErrorCode::StreamClosed).with_name(&self.display));
        }
        self.closed = true;

        let dir = match self.path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => {
                return Err(StorageError::new(StorageErrorCode::InvalidName).with_name(&self.display))
            }
        };
        let target = self.path.clone();
        let data = std::mem::take(&mut self.buffer);

        // 在同目录写唯一命名的临时文件后整体替换；失败时临时文件随 drop 删除
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".")
                .suffix(TEMP_FILE_SUFFIX)
                .tempfile_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| {
            StorageError::new(StorageErrorCode::Io)
                .with_name(&self.display)
                .with_message(format!("写入任务异常退出: {}", e))
        })??;
        Ok(())
    }
}
