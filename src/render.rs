// src/render.rs
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WatcherConfig;

/// News-type filter buttons; the first must be active before the card list
/// shows the default feed.
const FILTER_BTN_SELECTOR: &str = ".style_btn__u7_Bt";
/// Presence of a card marks the client-side render as finished.
const CARD_READY_SELECTOR: &str = ".style_card__uwotf";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A setup problem, not a transient one; the scheduler cannot retry it
    /// away.
    #[error("no Chrome/Chromium executable found (set chrome_path or CHROMIUM_PATH)")]
    Unavailable,
    #[error("invalid browser configuration: {0}")]
    Config(String),
    #[error("news cards did not appear within {0:?}")]
    Timeout(Duration),
    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
}

/// Source of the rendered news-page markup. The orchestrator only sees this
/// seam, so tests substitute canned pages.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self) -> Result<String, RenderError>;
}

/// Drives a headless Chrome session to load the news page and waits for the
/// dynamic card list before handing back the markup.
pub struct ChromeRenderer {
    executable: PathBuf,
    news_url: String,
    wait: Duration,
    settle: Duration,
}

impl ChromeRenderer {
    /// The browser capability check lives here: construction fails with
    /// `RenderError::Unavailable` when no executable can be found, so the
    /// caller learns about the configuration error before the first cycle.
    pub fn new(cfg: &WatcherConfig) -> Result<Self, RenderError> {
        let executable = find_browser_executable(cfg.chrome_path.as_deref())
            .ok_or(RenderError::Unavailable)?;
        info!(path = %executable.display(), "using browser executable");
        Ok(Self {
            executable,
            news_url: cfg.news_url.clone(),
            wait: Duration::from_secs(cfg.render_wait_secs),
            settle: Duration::from_secs(cfg.settle_delay_secs),
        })
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>), RenderError> {
        let config = BrowserConfigBuilder::default()
            .chrome_executable(&self.executable)
            .headless_mode(HeadlessMode::default())
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={USER_AGENT}"))
            .build()
            .map_err(RenderError::Config)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler: {e}");
                }
            }
        });
        Ok((browser, handler_task))
    }

    async fn render_page(&self, browser: &Browser) -> Result<String, RenderError> {
        let page = browser.new_page(self.news_url.as_str()).await?;

        // The default filter may start unselected; switching it is
        // best-effort and extraction proceeds on whatever the page shows.
        match self.wait_for(&page, FILTER_BTN_SELECTOR, self.wait).await {
            Some(btn) => {
                let selected = btn.attribute("data-selected").await.ok().flatten();
                if selected.as_deref() != Some("true") {
                    match btn.click().await {
                        Ok(_) => tokio::time::sleep(self.settle).await,
                        Err(e) => warn!("could not switch news filter: {e}"),
                    }
                }
            }
            None => warn!("news filter buttons never appeared, extracting as-is"),
        }

        if self.wait_for(&page, CARD_READY_SELECTOR, self.wait).await.is_none() {
            return Err(RenderError::Timeout(self.wait));
        }

        Ok(page.content().await?)
    }

    /// Poll for a selector until it appears or `timeout` elapses. The HTTP
    /// response arriving is not enough; the page renders cards client-side
    /// afterwards.
    async fn wait_for(&self, page: &Page, selector: &str, timeout: Duration) -> Option<Element> {
        let start = Instant::now();
        loop {
            if let Ok(el) = page.find_element(selector).await {
                return Some(el);
            }
            if start.elapsed() >= timeout {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait::async_trait]
impl PageSource for ChromeRenderer {
    async fn fetch_page(&self) -> Result<String, RenderError> {
        let (mut browser, handler_task) = self.launch().await?;

        let result = self.render_page(&browser).await;

        // Release the browser process on every exit path, including a failed
        // render, so cycles never leak OS processes.
        if let Err(e) = browser.close().await {
            warn!("failed to close browser: {e}");
        }
        if let Err(e) = browser.wait().await {
            warn!("failed to reap browser process: {e}");
        }
        handler_task.abort();

        result
    }
}

/// Executable discovery order: explicit config, `CHROMIUM_PATH`, well-known
/// install locations, then `which` on the usual binary names.
fn find_browser_executable(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = configured {
        if p.exists() {
            return Some(p.to_path_buf());
        }
        warn!("configured chrome_path {} does not exist", p.display());
        return None;
    }

    if let Ok(p) = std::env::var("CHROMIUM_PATH") {
        let p = PathBuf::from(p);
        if p.exists() {
            return Some(p);
        }
        warn!("CHROMIUM_PATH points to a non-existent file: {}", p.display());
    }

    const CANDIDATES: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/opt/google/chrome/chrome",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    for cand in CANDIDATES {
        let p = PathBuf::from(cand);
        if p.exists() {
            return Some(p);
        }
    }

    for cmd in ["google-chrome", "chromium", "chromium-browser", "chrome"] {
        if let Ok(out) = Command::new("which").arg(cmd).output() {
            if out.status.success() {
                let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if !s.is_empty() {
                    return Some(PathBuf::from(s));
                }
            }
        }
    }

    None
}
