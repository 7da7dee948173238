//! 日志系统配置
//!
//! 控制台输出 + 可选的文件持久化。文件按启动时间命名、按大小滚动，启动时清理过期文件

use crate::config::LogConfig;
use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
pub const LOG_FILE_PREFIX: &str = "private-fs";

const TIMER_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

struct RotatingState {
    /// 启动时间戳（YYYY-MM-DD-HHMMSS）
    start_timestamp: String,
    log_dir: PathBuf,
    file: Option<File>,
    /// 0 为基础文件，之后每次滚动加一
    index: u32,
    max_file_size: u64,
    written: u64,
}

impl RotatingState {
    fn open(&mut self) -> io::Result<()> {
        let path = log_file_path(&self.log_dir, &self.start_timestamp, self.index);
        self.file = Some(OpenOptions::new().create(true).append(true).open(path)?);
        self.written = 0;
        Ok(())
    }

    fn write_data(&mut self, buf: &[u8]) -> io::Result<usize> {
        // 空文件不滚动，避免单条超长日志不断产生新文件
        if self.written > 0 && self.written + buf.len() as u64 > self.max_file_size {
            if let Some(mut file) = self.file.take() {
                file.flush()?;
            }
            self.index += 1;
            self.open()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "日志文件未打开"))?;
        let written = file.write(buf)?;
        self.written += written as u64;
        Ok(written)
    }
}

/// 按大小滚动的日志写入器
///
/// 文件名: `private-fs.<启动时间>.log`、`private-fs.<启动时间>_N.log`
#[derive(Clone)]
pub struct RotatingLogWriter {
    state: Arc<Mutex<RotatingState>>,
}

impl RotatingLogWriter {
    pub fn new(log_dir: impl Into<PathBuf>, max_file_size: u64) -> io::Result<Self> {
        let start_timestamp = Local::now().format("%Y-%m-%d-%H%M%S").to_string();
        Self::with_timestamp(log_dir, max_file_size, start_timestamp)
    }

    fn with_timestamp(
        log_dir: impl Into<PathBuf>,
        max_file_size: u64,
        start_timestamp: String,
    ) -> io::Result<Self> {
        let mut state = RotatingState {
            start_timestamp,
            log_dir: log_dir.into(),
            file: None,
            index: 0,
            max_file_size,
            written: 0,
        };
        state.open()?;

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// 当前写入的文件路径
    pub fn current_path(&self) -> PathBuf {
        let state = self.state.lock();
        log_file_path(&state.log_dir, &state.start_timestamp, state.index)
    }
}

impl Write for RotatingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.lock().write_data(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.state.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn log_file_path(log_dir: &Path, start_timestamp: &str, index: u32) -> PathBuf {
    let filename = if index == 0 {
        format!("{}.{}.log", LOG_FILE_PREFIX, start_timestamp)
    } else {
        format!("{}.{}_{}.log", LOG_FILE_PREFIX, start_timestamp, index)
    };
    log_dir.join(filename)
}

/// 日志系统守卫
/// 必须保持存活，否则文件写入线程会提前退出
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LogGuard {
    /// 是否启用了文件输出
    pub fn has_file_output(&self) -> bool {
        self._file_guard.is_some()
    }
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先于配置中的级别。文件输出准备失败时回退到仅控制台。
/// 全局订阅器已存在时不会覆盖
pub fn init_logging(config: &LogConfig) -> LogGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIMER_FORMAT.to_string()))
        .with_ansi(true);

    let file_writer = if config.enabled {
        open_file_writer(config)
    } else {
        None
    };

    let (file_layer, file_guard) = match file_writer {
        Some(writer) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(writer);
            let layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_timer(ChronoLocal::new(TIMER_FORMAT.to_string()))
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let has_file = file_guard.is_some();
    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("日志系统已初始化，跳过: {}", e);
        return LogGuard { _file_guard: None };
    }

    if has_file {
        info!(
            "日志系统初始化完成: 目录={:?}, 保留天数={}, 级别={}, 单文件最大={:.1}MB",
            config.log_dir,
            config.retention_days,
            config.level,
            config.max_file_size as f64 / 1024.0 / 1024.0
        );
        let removed = cleanup_old_logs(&config.log_dir, config.retention_days);
        if removed > 0 {
            info!("已清理 {} 个过期日志文件", removed);
        }
    } else {
        info!("日志系统初始化完成（仅控制台输出）");
    }

    LogGuard {
        _file_guard: file_guard,
    }
}

fn open_file_writer(config: &LogConfig) -> Option<RotatingLogWriter> {
    if let Err(e) = fs::create_dir_all(&config.log_dir) {
        eprintln!("创建日志目录失败: {:?}, 错误: {}", config.log_dir, e);
        return None;
    }

    match RotatingLogWriter::new(config.log_dir.clone(), config.max_file_size) {
        Ok(writer) => Some(writer),
        Err(e) => {
            eprintln!("创建日志文件失败: {}, 回退到仅控制台输出", e);
            None
        }
    }
}

/// 删除超过保留天数的日志文件，返回删除数量
fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> usize {
    let today = Local::now().date_naive();
    let retention = chrono::Duration::days(retention_days as i64);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("读取日志目录失败: {:?}, 错误: {}", log_dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };

        let expired = match log_file_date(filename) {
            Some(date) => today.signed_duration_since(date) > retention,
            None if is_log_file(filename) => expired_by_mtime(&entry, retention),
            None => continue,
        };

        if expired {
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!("已删除过期日志文件: {:?}", path);
                }
                Err(e) => tracing::warn!("删除过期日志文件失败: {:?}, 错误: {}", path, e),
            }
        }
    }

    removed
}

fn is_log_file(filename: &str) -> bool {
    filename.starts_with(&format!("{}.", LOG_FILE_PREFIX)) && filename.ends_with(".log")
}

/// 从日志文件名中解析日期
///
/// `private-fs.2024-05-01-081500_2.log` -> 2024-05-01
fn log_file_date(filename: &str) -> Option<chrono::NaiveDate> {
    let name = filename
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_prefix('.')?
        .strip_suffix(".log")?;
    let date = name.get(..10)?;
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// 无法从文件名解析日期时按修改时间判断
fn expired_by_mtime(entry: &fs::DirEntry, retention: chrono::Duration) -> bool {
    let modified = match entry.metadata().and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => return false,
    };
    let modified: chrono::DateTime<chrono::Utc> = modified.into();
    chrono::Utc::now().signed_duration_since(modified) > retention
}
