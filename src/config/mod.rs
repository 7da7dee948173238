// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::storage::DEFAULT_MAX_NAME_LEN;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 下载（客户端保存）配置
    #[serde(default)]
    pub download: DownloadConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 20MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// 进程内存储，进程退出即丢失
    Memory,
    /// 本地沙箱目录
    #[default]
    Directory,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 后端类型
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// 本地目录后端的根目录
    #[serde(default = "default_storage_root_dir")]
    pub root_dir: PathBuf,
    /// 条目名最大长度（字节）
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

fn default_storage_root_dir() -> PathBuf {
    PathBuf::from("data/private-fs")
}

fn default_max_name_len() -> usize {
    DEFAULT_MAX_NAME_LEN
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            root_dir: default_storage_root_dir(),
            max_name_len: default_max_name_len(),
        }
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// 下载文件的保存目录
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 启动时记录的上传地址（仅供参考，`send_file_to_server` 调用时需显式传入地址）
    #[serde(default)]
    pub server_url: Option<String>,
    /// 请求超时（秒）
    #[serde(default = "default_upload_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upload_timeout_secs() -> u64 {
    60
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            timeout_secs: default_upload_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.storage.max_name_len == 0 {
            anyhow::bail!("storage.max_name_len 必须大于 0");
        }

        if self.upload.timeout_secs == 0 {
            anyhow::bail!("upload.timeout_secs 必须大于 0");
        }

        if let Some(ref url) = self.upload.server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("upload.server_url 必须以 http:// 或 https:// 开头: {}", url);
            }
        }

        Ok(())
    }

    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate().context("配置文件校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);

        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.storage.backend, StorageBackendKind::Directory);
        assert_eq!(config.storage.max_name_len, 255);
        assert_eq!(config.upload.timeout_secs, 60);
        assert!(config.upload.server_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [storage]
            backend = "memory"

            [upload]
            server_url = "http://127.0.0.1:8080/upload"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
        assert_eq!(config.storage.root_dir, PathBuf::from("data/private-fs"));
        assert_eq!(
            config.upload.server_url.as_deref(),
            Some("http://127.0.0.1:8080/upload")
        );
        assert_eq!(config.upload.timeout_secs, 60);
        assert_eq!(config.download.download_dir, PathBuf::from("downloads"));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.upload.server_url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upload.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.max_name_len = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("app.toml");
        let path = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.storage.backend = StorageBackendKind::Memory;
        config.upload.server_url = Some("https://example.com/upload".to_string());
        config.log.retention_days = 3;

        config.save_to_file(path).await.unwrap();
        let loaded = AppConfig::load_from_file(path).await.unwrap();

        assert_eq!(loaded.storage.backend, StorageBackendKind::Memory);
        assert_eq!(
            loaded.upload.server_url.as_deref(),
            Some("https://example.com/upload")
        );
        assert_eq!(loaded.log.retention_days, 3);
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.toml");
        let config = AppConfig::load_or_default(path.to_str().unwrap()).await;
        assert_eq!(config.storage.backend, StorageBackendKind::Directory);
    }
}
