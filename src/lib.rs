// src/lib.rs
// Public library surface for integration tests (and host embedding).

pub mod cache;
pub mod config;
pub mod extract;
pub mod item;
pub mod janitor;
pub mod media;
pub mod notify;
pub mod render;
pub mod watch;

// ---- Re-exports for stable public API ----
pub use crate::config::WatcherConfig;
pub use crate::item::{NewsItem, NewsPayload};
pub use crate::notify::{LogSink, NotifySink, RecordingSink};
pub use crate::render::{ChromeRenderer, PageSource, RenderError};
pub use crate::watch::{CycleOutcome, NewsWatcher};
