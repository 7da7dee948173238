// 存储模块数据类型定义

use serde::Serialize;
use std::io;

/// 存储错误码
/// 错误码范围：60001 - 60099
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StorageErrorCode {
    /// 尚未初始化
    NotInitialized = 60001,
    /// 目录不存在
    DirectoryNotFound = 60002,
    /// 文件不存在
    FileNotFound = 60003,
    /// 权限不足
    PermissionDenied = 60004,
    /// 超出存储配额
    QuotaExceeded = 60005,
    /// 条目名称无效
    InvalidName = 60006,
    /// 条目类型不匹配
    TypeMismatch = 60007,
    /// 目录非空
    DirectoryNotEmpty = 60008,
    /// 写入流已关闭
    StreamClosed = 60009,
    /// 底层 I/O 错误
    Io = 60010,
}

impl StorageErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::NotInitialized => "存储尚未初始化",
            Self::DirectoryNotFound => "目录不存在",
            Self::FileNotFound => "文件不存在",
            Self::PermissionDenied => "没有权限访问该条目",
            Self::QuotaExceeded => "超出存储配额",
            Self::InvalidName => "条目名称无效",
            Self::TypeMismatch => "条目类型不匹配",
            Self::DirectoryNotEmpty => "目录非空",
            Self::StreamClosed => "写入流已关闭",
            Self::Io => "存储读写失败",
        }
    }
}

/// 存储错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageError {
    pub code: StorageErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StorageError {
    pub fn new(code: StorageErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref name) = self.name {
            write!(f, "{}: {}", self.message, name)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => StorageErrorCode::FileNotFound,
            io::ErrorKind::PermissionDenied => StorageErrorCode::PermissionDenied,
            io::ErrorKind::InvalidInput => StorageErrorCode::InvalidName,
            _ => StorageErrorCode::Io,
        };
        StorageError::new(code).with_message(format!("{}: {}", code.message(), err))
    }
}

/// 条目类型
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// 目录枚举得到的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl StorageEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }
}

/// 目录句柄
///
/// 只记录从根目录出发的路径分段，不持有任何底层资源
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DirHandle {
    segments: Vec<String>,
}

impl DirHandle {
    /// 根目录句柄
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// 目录名（根目录为空字符串）
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

/// 文件句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub dir: DirHandle,
    pub name: String,
}

impl FileHandle {
    pub fn new(dir: DirHandle, name: impl Into<String>) -> Self {
        Self {
            dir,
            name: name.into(),
        }
    }

    /// 用于日志输出的相对路径
    pub fn display_path(&self) -> String {
        if self.dir.is_root() {
            self.name.clone()
        } else {
            format!("{}/{}", self.dir.segments().join("/"), self.name)
        }
    }
}
