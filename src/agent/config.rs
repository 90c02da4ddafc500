use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::assembler::UnclassifiedPolicy;

/// 設定檔相對於工作區根目錄的位置。
pub const CONFIG_FILE: &str = "config/netdiag.toml";

/// 覆寫 `base_url` 的環境變數。
pub const BASE_URL_ENV: &str = "NETDIAG_BASE_URL";

/// 頂層設定，通常從 `config/netdiag.toml` 載入。缺少的欄位使用預設值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatSettings {
    /// 後端的來源網址。
    pub base_url: String,
    /// 即時模式使用的 POST 路徑。
    pub chat_path: String,
    /// 重播模式使用的 GET 路徑。
    pub replay_path: String,
    /// 無法歸類到任何代理的 label 如何處理。
    pub unclassified_policy: UnclassifiedPolicy,
    /// 每個請求額外附加的標頭。
    pub extra_headers: BTreeMap<String, String>,
    /// 模擬後端的設定。
    pub server: ServerSettings,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:3001"),
            chat_path: String::from("/freestyle"),
            replay_path: String::from("/api/replay"),
            unclassified_policy: UnclassifiedPolicy::default(),
            extra_headers: BTreeMap::new(),
            server: ServerSettings::default(),
        }
    }
}

/// 模擬 SSE 後端的設定。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// 串流內容之間的延遲（毫秒）。
    pub stream_delay_ms: u64,
    /// 腳本步驟之間的延遲（毫秒）。
    pub step_delay_ms: u64,
    /// 重播端點要原樣送出的 SSE 紀錄檔。
    pub transcript: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 3001,
            stream_delay_ms: 300,
            step_delay_ms: 500,
            transcript: None,
        }
    }
}

impl ChatSettings {
    /// 從指定的工作區目錄讀取設定。
    /// 如果設定檔不存在，使用預設值。之後套用環境變數覆寫。
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_FILE);
        let settings = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("讀取設定失敗: {}", config_path.display()))?;
            let parsed: ChatSettings = toml::from_str(&raw)
                .with_context(|| format!("解析設定失敗: {}", config_path.display()))?;
            parsed.normalize(workspace_root)
        } else {
            Self::default()
        };
        Ok(settings.with_base_url(env::var(BASE_URL_ENV).ok()))
    }

    /// 以指定的網址覆寫 `base_url`；`None` 時保持原值。
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|url| !url.trim().is_empty()) {
            self.base_url = url;
        }
        self
    }

    /// 將紀錄檔的相對路徑轉換為相對於工作區根目錄的絕對路徑。
    fn normalize(mut self, workspace_root: &Path) -> Self {
        if let Some(path) = self.server.transcript.as_mut()
            && path.is_relative()
        {
            *path = workspace_root.join(&*path);
        }
        self
    }

    pub fn chat_url(&self) -> String {
        join_url(&self.base_url, &self.chat_path)
    }

    pub fn replay_url(&self) -> String {
        join_url(&self.base_url, &self.replay_path)
    }

    /// 將當前的設定儲存到 `config/netdiag.toml` 檔案中。
    pub fn save_to_file(&self, workspace_root: &Path) -> Result<()> {
        let config_dir = workspace_root.join("config");
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("建立設定目錄失敗: {}", config_dir.display()))?;
        }
        let config_path = workspace_root.join(CONFIG_FILE);
        let serialized = toml::to_string_pretty(self).context("序列化設定失敗")?;
        fs::write(&config_path, serialized)
            .with_context(|| format!("寫入設定失敗: {}", config_path.display()))?;
        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
