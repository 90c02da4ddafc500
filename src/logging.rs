use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

/// 指定 log4rs 設定檔路徑的環境變數。
pub const LOG_CONFIG_ENV: &str = "NETDIAG_LOG_CONFIG";

/// log4rs 設定檔相對於工作區根目錄的預設位置。
pub const DEFAULT_LOG_CONFIG: &str = "config/log4rs.yaml";

/// 初始化日誌系統。
///
/// 有 log4rs 設定檔時依照設定輸出（例如寫入滾動檔案），
/// 否則使用 env_logger 輸出到 stderr，過濾規則取自 `RUST_LOG`，預設為 `info`。
pub fn init(workspace_root: &Path) -> Result<()> {
    let config_path = config_path(workspace_root, env::var_os(LOG_CONFIG_ENV).map(PathBuf::from));
    if config_path.is_file() {
        log4rs::init_file(&config_path, Default::default())
            .with_context(|| format!("載入日誌設定失敗: {}", config_path.display()))?;
        debug!("logging configured from {}", config_path.display());
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init()
            .context("日誌系統已初始化")?;
    }
    Ok(())
}

fn config_path(workspace_root: &Path, overridden: Option<PathBuf>) -> PathBuf {
    overridden.unwrap_or_else(|| workspace_root.join(DEFAULT_LOG_CONFIG))
}
