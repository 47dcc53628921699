// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "WATCHER_CONFIG_PATH";

/// Watcher policy and environment knobs. Every field has a documented
/// default; config files may override any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Page the watcher polls.
    pub news_url: String,
    /// Origin used to absolutize relative links found on the page.
    pub origin: String,
    /// Root for the cache file and the media directory.
    pub data_dir: PathBuf,
    /// Seconds between scheduled poll cycles.
    pub interval_secs: u64,
    /// How long the renderer waits for the news cards to appear.
    pub render_wait_secs: u64,
    /// Settle delay after switching the page filter.
    pub settle_delay_secs: u64,
    /// Per-download timeout for media files.
    pub download_timeout_secs: u64,
    /// Cards taken from the top of the page per cycle.
    pub max_cards: usize,
    /// Most-recent items kept for replies and media retention.
    pub retain_items: usize,
    /// Items returned by the manual latest-news command.
    pub reply_items: usize,
    /// Delay between successive outbound notifications.
    pub notify_pacing_ms: u64,
    /// Explicit Chrome/Chromium executable; discovered when unset.
    pub chrome_path: Option<PathBuf>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            news_url: "https://idolmaster-official.jp/news".into(),
            origin: "https://idolmaster-official.jp".into(),
            data_dir: PathBuf::from("data/imas_news"),
            interval_secs: 60,
            render_wait_secs: 10,
            settle_delay_secs: 2,
            download_timeout_secs: 30,
            max_cards: 10,
            retain_items: 5,
            reply_items: 3,
            notify_pacing_ms: 500,
            chrome_path: None,
        }
    }
}

impl WatcherConfig {
    pub fn cache_file(&self) -> PathBuf {
        self.data_dir.join("cache.json")
    }

    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Load config from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
    }

    /// Load config using env var + fallbacks:
    /// 1) $WATCHER_CONFIG_PATH
    /// 2) config/watcher.toml
    /// 3) config/watcher.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("WATCHER_CONFIG_PATH points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/watcher.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/watcher.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<WatcherConfig> {
    // Try TOML first if hinted.
    if hint_ext == "toml" {
        if let Ok(c) = toml::from_str(s) {
            return Ok(c);
        }
    }
    // Try JSON
    if let Ok(c) = serde_json::from_str(s) {
        return Ok(c);
    }
    // Fallback: also try TOML if not attempted
    if hint_ext != "toml" {
        if let Ok(c) = toml::from_str(s) {
            return Ok(c);
        }
    }
    Err(anyhow!("unsupported config format"))
}
