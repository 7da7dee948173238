// 客户端保存能力
//
// 给定内容和建议文件名，把文件交给用户（本地实现为写入下载目录）

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::info;

/// 客户端文件保存能力
#[async_trait]
pub trait FileSaver: Send + Sync {
    /// 保存内容，返回实际保存位置的描述
    async fn save(&self, data: Vec<u8>, suggested_name: &str) -> Result<String>;
}

/// 保存到本地下载目录
#[derive(Debug, Clone)]
pub struct LocalFileSaver {
    download_dir: PathBuf,
}

impl LocalFileSaver {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// 选择不冲突的目标路径
    ///
    /// `a.txt` 已存在时依次尝试 `a (1).txt`、`a (2).txt`……
    async fn unique_target(&self, file_name: &str) -> Result<PathBuf> {
        let candidate = self.download_dir.join(file_name);
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return Ok(candidate);
        }

        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string());
        let ext = path.extension().map(|e| e.to_string_lossy().to_string());

        for n in 1..10_000u32 {
            let name = match &ext {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            let candidate = self.download_dir.join(name);
            if !fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(candidate);
            }
        }

        anyhow::bail!("下载目录中同名文件过多: {}", file_name)
    }
}

/// 只保留建议名中的最后一个路径分段
fn sanitize_file_name(suggested_name: &str) -> String {
    let name = suggested_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        "download".to_string()
    } else {
        name.to_string()
    }
}

#[async_trait]
impl FileSaver for LocalFileSaver {
    async fn save(&self, data: Vec<u8>, suggested_name: &str) -> Result<String> {
        fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| format!("创建下载目录失败: {:?}", self.download_dir))?;

        let file_name = sanitize_file_name(suggested_name);
        let target = self.unique_target(&file_name).await?;

        fs::write(&target, &data)
            .await
            .with_context(|| format!("写入下载文件失败: {:?}", target))?;

        info!("文件已保存: {:?} ({} 字节)", target, data.len());
        Ok(target.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a.txt"), "a.txt");
        assert_eq!(sanitize_file_name("docs/a.txt"), "a.txt");
        assert_eq!(sanitize_file_name("..\\evil.txt"), "evil.txt");
        assert_eq!(sanitize_file_name(".."), "download");
        assert_eq!(sanitize_file_name("dir/"), "download");
    }

    #[tokio::test]
    async fn test_save_creates_download_dir() {
        let temp = TempDir::new().unwrap();
        let saver = LocalFileSaver::new(temp.path().join("downloads"));

        let saved = saver.save(b"v1".to_vec(), "a.txt").await.unwrap();

        assert!(saved.ends_with("a.txt"));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("downloads").join("a.txt")).unwrap(),
            "v1"
        );
    }

    #[tokio::test]
    async fn test_save_does_not_overwrite() {
        let temp = TempDir::new().unwrap();
        let saver = LocalFileSaver::new(temp.path());

        saver.save(b"first".to_vec(), "a.txt").await.unwrap();
        saver.save(b"second".to_vec(), "a.txt").await.unwrap();
        saver.save(b"third".to_vec(), "noext").await.unwrap();
        saver.save(b"fourth".to_vec(), "noext").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(temp.path().join("a.txt")).unwrap(),
            "first"
        );
        assert_eq!(
            std::fs::read_to_string(temp.path().join("a (1).txt")).unwrap(),
            "second"
        );
        assert_eq!(
            std::fs::read_to_string(temp.path().join("noext (1)")).unwrap(),
            "fourth"
        );
    }
}
