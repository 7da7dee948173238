//! 存储事件类型定义
//!
//! 事件集合是固定的，订阅语法糖 `on<EventName>` 通过静态映射表解析，不做运行时名称猜测

use serde::Serialize;

use crate::storage::StorageError;

/// 门面发出的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// 初始化完成
    Initialized,
    /// 操作失败
    Error,
    /// 目录创建完成
    DirCreated,
    /// 文件创建完成
    FileCreated,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Initialized,
        EventKind::Error,
        EventKind::DirCreated,
        EventKind::FileCreated,
    ];

    /// 事件键（小驼峰）
    pub fn key(&self) -> &'static str {
        match self {
            EventKind::Initialized => "initialized",
            EventKind::Error => "error",
            EventKind::DirCreated => "dirCreated",
            EventKind::FileCreated => "fileCreated",
        }
    }

    /// 订阅语法糖名称
    pub fn accessor(&self) -> &'static str {
        match self {
            EventKind::Initialized => "onInitialized",
            EventKind::Error => "onError",
            EventKind::DirCreated => "onDirCreated",
            EventKind::FileCreated => "onFileCreated",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// 解析 `on<EventName>` 形式的订阅名
    pub fn from_accessor(accessor: &str) -> Option<Self> {
        let key = accessor_event_key(accessor)?;
        Self::from_key(&key)
    }
}

/// 将 `on` + 事件名 转换为事件键
///
/// 名称必须以 `on` 开头且长度大于 2；后缀首字符转小写，其余保持不变。
/// 例如 `onFileCreated` -> `fileCreated`
pub fn accessor_event_key(accessor: &str) -> Option<String> {
    let suffix = accessor.strip_prefix("on")?;
    if suffix.is_empty() {
        return None;
    }
    Some(lower_first(suffix))
}

/// 首字符转小写
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `fileCreated` 事件载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCreatedPayload {
    pub file_name: String,
    /// 根目录下创建时为 None，序列化时不输出该键
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir_name: Option<String>,
}

/// 事件载荷
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// 无载荷
    None,
    /// 失败原因
    Error(StorageError),
    /// 目录名
    DirName(String),
    /// 创建的文件
    FileCreated(FileCreatedPayload),
}

impl EventPayload {
    pub fn as_error(&self) -> Option<&StorageError> {
        match self {
            EventPayload::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_dir_name(&self) -> Option<&str> {
        match self {
            EventPayload::DirName(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_file_created(&self) -> Option<&FileCreatedPayload> {
        match self {
            EventPayload::FileCreated(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, EventPayload::None)
    }
}
