// src/notify.rs
use anyhow::Result;
use tracing::info;

use crate::item::NewsPayload;

/// Delivery edge. Fan-out to real chat destinations is the host runtime's
/// job; the watcher only hands over ordered payloads.
#[async_trait::async_trait]
pub trait NotifySink: Send + Sync {
    async fn deliver(&self, payload: &NewsPayload) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: NotifySink + ?Sized> NotifySink for std::sync::Arc<T> {
    async fn deliver(&self, payload: &NewsPayload) -> Result<()> {
        (**self).deliver(payload).await
    }
}

/// Default sink for standalone runs: logs the rendered payload.
pub struct LogSink;

#[async_trait::async_trait]
impl NotifySink for LogSink {
    async fn deliver(&self, payload: &NewsPayload) -> Result<()> {
        info!(image = ?payload.image, "news update:\n{}", payload.render_text());
        Ok(())
    }
}

// --- Test helper ---
pub struct RecordingSink {
    pub delivered: std::sync::Mutex<Vec<NewsPayload>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            delivered: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotifySink for RecordingSink {
    async fn deliver(&self, payload: &NewsPayload) -> Result<()> {
        self.delivered.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
