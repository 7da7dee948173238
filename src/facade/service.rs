// 私有文件系统门面
//
// 所有操作都不会把失败抛给调用方：失败在方法边界被捕获，记录日志并发布 `error` 事件
// （下载和上传只记录日志）。`read_file` 额外以 Result 返回读取结果。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, StorageBackendKind};
use crate::events::{EventKind, EventNotifier, EventPayload, FileCreatedPayload};
use crate::storage::{
    DirHandle, DirStorage, EntryKind, MemoryStorage, NameGuard, StorageBackend, StorageError,
    StorageErrorCode,
};
use crate::transport::{FileSaver, FileUploader, HttpUploader, LocalFileSaver};

use super::index::StorageIndex;

/// 上传时使用的表单字段名
pub const UPLOAD_FIELD_NAME: &str = "file";

/// 门面生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacadeState {
    Uninitialized,
    Initializing,
    Ready,
    /// 初始化失败，可以再次调用 `init`
    Failed,
}

/// 私有文件系统门面
pub struct StorageFacade {
    backend: Arc<dyn StorageBackend>,
    saver: Arc<dyn FileSaver>,
    uploader: Arc<dyn FileUploader>,
    events: EventNotifier,
    /// 首次初始化成功后固定
    root: RwLock<Option<DirHandle>>,
    state: RwLock<FacadeState>,
    /// 每段读改写只在同步代码内持锁，不跨 await
    index: Mutex<StorageIndex>,
}

impl std::fmt::Debug for StorageFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFacade")
            .field("state", &*self.state.read())
            .field("index", &*self.index.lock())
            .field("events", &self.events)
            .finish()
    }
}

impl StorageFacade {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        saver: Arc<dyn FileSaver>,
        uploader: Arc<dyn FileUploader>,
    ) -> Self {
        Self {
            backend,
            saver,
            uploader,
            events: EventNotifier::new(),
            root: RwLock::new(None),
            state: RwLock::new(FacadeState::Uninitialized),
            index: Mutex::new(StorageIndex::new()),
        }
    }

    /// 按配置组装存储后端、保存与上传能力
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().context("配置校验失败")?;

        let guard = NameGuard::new(config.storage.max_name_len);
        let backend: Arc<dyn StorageBackend> = match config.storage.backend {
            StorageBackendKind::Memory => Arc::new(MemoryStorage::new().with_guard(guard)),
            StorageBackendKind::Directory => {
                Arc::new(DirStorage::new(&config.storage.root_dir).with_guard(guard))
            }
        };

        let saver = Arc::new(LocalFileSaver::new(&config.download.download_dir));
        let uploader = Arc::new(
            HttpUploader::new(Duration::from_secs(config.upload.timeout_secs))
                .context("创建上传客户端失败")?,
        );

        info!(
            "存储门面已创建: backend={:?}, root_dir={:?}",
            config.storage.backend, config.storage.root_dir
        );

        Ok(Self::new(backend, saver, uploader))
    }

    /// 事件通知器
    pub fn events(&self) -> &EventNotifier {
        &self.events
    }

    pub fn state(&self) -> FacadeState {
        *self.state.read()
    }

    /// 已知目录名
    pub fn directories(&self) -> Vec<String> {
        self.index.lock().directory_names()
    }

    pub fn has_directory(&self, dir_name: &str) -> bool {
        self.index.lock().has_directory(dir_name)
    }

    /// 目录内的已知文件名，目录未登记返回 None
    pub fn files_in(&self, dir_name: &str) -> Option<Vec<String>> {
        self.index.lock().files_in(dir_name).map(<[String]>::to_vec)
    }

    /// 根目录下的已知文件名
    pub fn root_files(&self) -> Vec<String> {
        self.index.lock().root_files().to_vec()
    }

    /// 索引快照
    pub fn index_snapshot(&self) -> StorageIndex {
        self.index.lock().clone()
    }

    // ==================== 初始化 ====================

    /// 获取根目录并扫描其直接子条目
    ///
    /// 可重复调用；已有索引内容不会被清空
    pub async fn init(&self) {
        *self.state.write() = FacadeState::Initializing;

        match self.try_init().await {
            Ok(()) => {
                *self.state.write() = FacadeState::Ready;
                info!("私有文件系统初始化完成");
                self.events.emit_kind(EventKind::Initialized, EventPayload::None);
            }
            Err(e) => {
                *self.state.write() = FacadeState::Failed;
                self.report_error("init", e);
            }
        }
    }

    async fn try_init(&self) -> Result<(), StorageError> {
        let existing = self.root.read().clone();
        let root = match existing {
            Some(root) => root,
            None => self.backend.root().await?,
        };

        let entries = self.backend.entries(&root).await?;
        {
            let mut index = self.index.lock();
            for entry in &entries {
                match entry.kind {
                    EntryKind::Directory => {
                        index.insert_directory(&entry.name);
                    }
                    EntryKind::File => index.push_root_file(&entry.name),
                }
            }
        }
        debug!("根目录扫描完成: {} 个条目", entries.len());

        self.root.write().get_or_insert(root);
        Ok(())
    }

    fn root_handle(&self) -> Result<DirHandle, StorageError> {
        self.root
            .read()
            .clone()
            .ok_or_else(|| StorageError::new(StorageErrorCode::NotInitialized))
    }

    /// 解析目标目录：给定目录名时取根目录下的该目录，否则为根目录
    async fn resolve_dir(
        &self,
        dir_name: Option<&str>,
        create: bool,
    ) -> Result<DirHandle, StorageError> {
        let root = self.root_handle()?;
        match dir_name {
            Some(dir) => self.backend.directory(&root, dir, create).await,
            None => Ok(root),
        }
    }

    fn report_error(&self, op: &str, err: StorageError) {
        error!("{} 失败: {} (code={})", op, err, err.code.code());
        self.events.emit_kind(EventKind::Error, EventPayload::Error(err));
    }

    // ==================== 目录 ====================

    /// 创建目录
    ///
    /// 目录已登记时什么也不做；存储创建成功后才登记到索引
    pub async fn create_dir(&self, dir_name: &str) {
        if self.index.lock().has_directory(dir_name) {
            info!("目录已存在，跳过创建: {}", dir_name);
            return;
        }

        match self.try_create_dir(dir_name).await {
            Ok(true) => {
                info!("目录已创建: {}", dir_name);
                self.events
                    .emit_kind(EventKind::DirCreated, EventPayload::DirName(dir_name.to_string()));
            }
            Ok(false) => {
                debug!("目录已由并发调用登记: {}", dir_name);
            }
            Err(e) => self.report_error("create_dir", e),
        }
    }

    async fn try_create_dir(&self, dir_name: &str) -> Result<bool, StorageError> {
        self.resolve_dir(Some(dir_name), true).await?;
        Ok(self.index.lock().insert_directory(dir_name))
    }

    /// 递归删除已登记的目录
    pub async fn delete_dir(&self, dir_name: &str) {
        if !self.index.lock().has_directory(dir_name) {
            info!("目录未登记，跳过删除: {}", dir_name);
            return;
        }

        match self.try_delete_dir(dir_name).await {
            Ok(()) => info!("目录已删除: {}", dir_name),
            Err(e) => self.report_error("delete_dir", e),
        }
    }

    async fn try_delete_dir(&self, dir_name: &str) -> Result<(), StorageError> {
        let root = self.root_handle()?;
        self.backend.remove_entry(&root, dir_name, true).await?;
        self.index.lock().remove_directory(dir_name);
        Ok(())
    }

    // ==================== 文件 ====================

    /// 创建空文件
    ///
    /// 给定的目录未登记时什么也不做
    pub async fn create_file(&self, file_name: &str, dir_name: Option<&str>) {
        if let Some(dir) = dir_name {
            if !self.index.lock().has_directory(dir) {
                warn!("目录未登记，跳过创建文件: {}/{}", dir, file_name);
                return;
            }
        }

        match self.try_create_file(file_name, dir_name).await {
            Ok(()) => {
                info!("文件已创建: {}", display_name(file_name, dir_name));
                self.events.emit_kind(
                    EventKind::FileCreated,
                    EventPayload::FileCreated(FileCreatedPayload {
                        file_name: file_name.to_string(),
                        dir_name: dir_name.map(str::to_string),
                    }),
                );
            }
            Err(e) => self.report_error("create_file", e),
        }
    }

    async fn try_create_file(
        &self,
        file_name: &str,
        dir_name: Option<&str>,
    ) -> Result<(), StorageError> {
        let dir = self.resolve_dir(dir_name, true).await?;
        self.backend.file(&dir, file_name, true).await?;

        let mut index = self.index.lock();
        match dir_name {
            Some(dir_name) => {
                index.push_file(dir_name, file_name);
            }
            None => index.push_root_file(file_name),
        }
        Ok(())
    }

    /// 读取整个文件的文本内容
    ///
    /// 失败时发布 `error` 事件并返回同一个错误；空文件返回 `Ok("")`
    pub async fn read_file(
        &self,
        file_name: &str,
        dir_name: Option<&str>,
    ) -> Result<String, StorageError> {
        match self.try_read_file(file_name, dir_name).await {
            Ok(text) => Ok(text),
            Err(e) => {
                self.report_error("read_file", e.clone());
                Err(e)
            }
        }
    }

    async fn try_read_file(
        &self,
        file_name: &str,
        dir_name: Option<&str>,
    ) -> Result<String, StorageError> {
        let dir = self.resolve_dir(dir_name, false).await?;
        let file = self.backend.file(&dir, file_name, false).await?;
        self.backend.read_text(&file).await
    }

    /// 覆盖写入整个文件，目录和文件不存在时自动创建
    ///
    /// 成功时不发布事件，也不更新索引
    pub async fn write_file(&self, file_name: &str, content: &str, dir_name: Option<&str>) {
        match self.try_write_file(file_name, content, dir_name).await {
            Ok(()) => debug!(
                "文件已写入: {} ({} 字节)",
                display_name(file_name, dir_name),
                content.len()
            ),
            Err(e) => self.report_error("write_file", e),
        }
    }

    async fn try_write_file(
        &self,
        file_name: &str,
        content: &str,
        dir_name: Option<&str>,
    ) -> Result<(), StorageError> {
        let dir = self.resolve_dir(dir_name, true).await?;
        let file = self.backend.file(&dir, file_name, true).await?;
        let mut writer = self.backend.create_writable(&file).await?;
        writer.write(content.as_bytes()).await?;
        writer.close().await
    }

    /// 删除文件并从索引中移除
    pub async fn delete_file(&self, file_name: &str, dir_name: Option<&str>) {
        match self.try_delete_file(file_name, dir_name).await {
            Ok(()) => info!("文件已删除: {}", display_name(file_name, dir_name)),
            Err(e) => self.report_error("delete_file", e),
        }
    }

    async fn try_delete_file(
        &self,
        file_name: &str,
        dir_name: Option<&str>,
    ) -> Result<(), StorageError> {
        let dir = self.resolve_dir(dir_name, false).await?;
        self.backend.remove_entry(&dir, file_name, false).await?;

        let mut index = self.index.lock();
        match dir_name {
            Some(dir_name) => {
                index.remove_file(dir_name, file_name);
            }
            None => {
                index.remove_root_file(file_name);
            }
        }
        Ok(())
    }

    // ==================== 下载 / 上传 ====================

    /// 读取文件并交给客户端保存
    ///
    /// 保存失败只记录日志
    pub async fn download_file(&self, file_name: &str, dir_name: Option<&str>) {
        let name = display_name(file_name, dir_name);
        let text = match self.read_file(file_name, dir_name).await {
            Ok(text) => text,
            Err(e) => {
                error!("下载文件失败: {}, 错误: {}", name, e);
                return;
            }
        };

        match self.saver.save(text.into_bytes(), file_name).await {
            Ok(location) => info!("✓ 文件已下载: {} -> {}", name, location),
            Err(e) => error!("下载文件失败: {}, 错误: {:#}", name, e),
        }
    }

    /// 读取文件并以 multipart 表单上传到服务器
    ///
    /// 传输失败或非成功状态码只记录日志
    pub async fn send_file_to_server(
        &self,
        file_name: &str,
        dir_name: Option<&str>,
        server_url: &str,
    ) {
        let name = display_name(file_name, dir_name);
        let text = match self.read_file(file_name, dir_name).await {
            Ok(text) => text,
            Err(e) => {
                error!("上传文件失败: {}, 错误: {}", name, e);
                return;
            }
        };

        match self
            .uploader
            .upload(server_url, UPLOAD_FIELD_NAME, text.into_bytes(), file_name)
            .await
        {
            Ok(response) if response.is_success() => {
                info!("✓ 文件已上传: {} -> {}", name, server_url);
            }
            Ok(response) => {
                error!(
                    "上传文件失败: {} -> {}, 状态码: {}",
                    name, server_url, response.status
                );
            }
            Err(e) => error!("上传文件失败: {} -> {}, 错误: {}", name, server_url, e),
        }
    }
}

fn display_name(file_name: &str, dir_name: Option<&str>) -> String {
    match dir_name {
        Some(dir) => format!("{}/{}", dir, file_name),
        None => file_name.to_string(),
    }
}
