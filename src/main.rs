use private_fs_rust::{
    config::{AppConfig, LogConfig, DEFAULT_CONFIG_PATH},
    logging, StorageFacade,
};
use tracing::{error, info};

/// 加载日志配置
///
/// 只读取配置文件中的 `[log]` 段，失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志先于完整配置初始化，_log_guard 必须保持存活
    let log_config = load_log_config().await;
    let _log_guard = logging::init_logging(&log_config);

    info!("Private FS v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await;
    let facade = StorageFacade::from_config(&config)?;

    facade.events().on_initialized(|_| info!("✓ 私有文件系统已就绪"));
    facade.events().on_error(|payload| {
        if let Some(err) = payload.as_error() {
            error!("存储错误: {} (code={})", err, err.code.code());
        }
    });
    facade.events().on_dir_created(|payload| {
        if let Some(name) = payload.as_dir_name() {
            info!("📁 目录已创建: {}", name);
        }
    });
    facade.events().on_file_created(|payload| {
        if let Some(created) = payload.as_file_created() {
            info!("📄 文件已创建: {:?}", created);
        }
    });

    facade.init().await;

    let directories = facade.directories();
    info!("已知目录 {} 个: {:?}", directories.len(), directories);
    let root_files = facade.root_files();
    info!("根目录文件 {} 个: {:?}", root_files.len(), root_files);

    if let Some(url) = config.upload.server_url.as_deref() {
        info!("已配置上传地址: {}", url);
    }

    Ok(())
}
