// src/watch.rs
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::NewsCache;
use crate::config::WatcherConfig;
use crate::extract::extract_items;
use crate::item::{NewsItem, NewsPayload};
use crate::janitor::sweep_orphans;
use crate::media::{fetch_image, media_key};
use crate::notify::NotifySink;
use crate::render::PageSource;

/// One-time metrics registration (series names, wherever the host exports
/// them).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_cycles_total", "Completed poll cycles.");
        describe_counter!(
            "watch_cycle_failures_total",
            "Cycles aborted during render/extract."
        );
        describe_counter!("watch_candidates_total", "Items extracted from the page.");
        describe_counter!("watch_novel_total", "Items detected as new.");
        describe_counter!("watch_download_errors_total", "Media downloads that failed.");
        describe_counter!(
            "watch_orphans_deleted_total",
            "Media files removed by the janitor."
        );
        describe_gauge!("watch_last_cycle_ts", "Unix ts when the last cycle finished.");
    });
}

/// Summary of one poll cycle, for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub candidates: usize,
    pub novel: usize,
    pub delivered: usize,
    pub orphans_deleted: usize,
    /// True when this cycle seeded an empty cache (cold start).
    pub seeded: bool,
}

/// Ties the pipeline together: render → extract → diff → fetch media →
/// notify → janitor, one cycle at a time.
pub struct NewsWatcher<S, N> {
    cfg: WatcherConfig,
    source: S,
    sink: N,
    client: reqwest::Client,
    // Held for a whole cycle; this is the single-flight guard that
    // serializes scheduled polls with the manual command path.
    cache: Mutex<NewsCache>,
}

impl<S, N> NewsWatcher<S, N>
where
    S: PageSource + Send + Sync + 'static,
    N: NotifySink + Send + Sync + 'static,
{
    /// Loads persisted state immediately, so the first poll decision already
    /// knows what was announced before the restart.
    pub fn new(cfg: WatcherConfig, source: S, sink: N) -> Self {
        ensure_metrics_described();
        let cache = NewsCache::load(cfg.cache_file(), cfg.retain_items);
        Self {
            cfg,
            source,
            sink,
            client: reqwest::Client::new(),
            cache: Mutex::new(cache),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.cfg
    }

    /// Run one full poll cycle.
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let mut cache = self.cache.lock().await;
        self.cycle(&mut cache).await
    }

    async fn cycle(&self, cache: &mut NewsCache) -> Result<CycleOutcome> {
        let markup = match self.source.fetch_page().await {
            Ok(m) => m,
            Err(e) => {
                // Cache untouched; the next scheduled trigger retries.
                counter!("watch_cycle_failures_total").increment(1);
                return Err(anyhow::Error::new(e).context("rendering news page"));
            }
        };

        let candidates = extract_items(&markup, &self.cfg.origin, self.cfg.max_cards);
        counter!("watch_candidates_total").increment(candidates.len() as u64);
        let mut outcome = CycleOutcome {
            candidates: candidates.len(),
            ..Default::default()
        };

        if candidates.is_empty() {
            // extract_items already warned; nothing to diff against.
            self.finish_cycle();
            return Ok(outcome);
        }

        let was_cold = cache.is_cold();
        let novel = cache.diff_and_update(&candidates);
        if was_cold {
            outcome.seeded = true;
            info!(seen = candidates.len(), "news cache was empty, seeded without notifying");
            self.finish_cycle();
            return Ok(outcome);
        }
        if novel.is_empty() {
            debug!("no news updates");
            self.finish_cycle();
            return Ok(outcome);
        }

        outcome.novel = novel.len();
        counter!("watch_novel_total").increment(novel.len() as u64);
        info!(count = novel.len(), "detected news updates");

        // Oldest novel item first, so recipients read in chronological order.
        for item in novel.iter().rev() {
            let payload = self.build_payload(item).await;
            match self.sink.deliver(&payload).await {
                Ok(()) => outcome.delivered += 1,
                Err(e) => warn!(title = %item.title, "delivery failed: {e:#}"),
            }
            self.pace().await;
        }

        // The janitor runs strictly after delivery, so media for the items
        // just announced is never deleted before being used.
        let retained: HashSet<String> = cache
            .recent()
            .iter()
            .filter(|i| i.has_media())
            .map(|i| media_key(&i.id))
            .collect();
        outcome.orphans_deleted = sweep_orphans(&self.cfg.image_dir(), &retained);
        counter!("watch_orphans_deleted_total").increment(outcome.orphans_deleted as u64);

        self.finish_cycle();
        Ok(outcome)
    }

    fn finish_cycle(&self) {
        counter!("watch_cycles_total").increment(1);
        gauge!("watch_last_cycle_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
    }

    /// Assemble the notification payload for one item. A failed media
    /// download degrades to a text-only payload; it never drops the item.
    async fn build_payload(&self, item: &NewsItem) -> NewsPayload {
        let mut image = None;
        if item.has_media() {
            let dest = self.cfg.image_dir().join(media_key(&item.id));
            if dest.exists() {
                image = Some(dest);
            } else {
                let timeout = Duration::from_secs(self.cfg.download_timeout_secs);
                match fetch_image(&self.client, &item.img_url, &dest, timeout).await {
                    Ok(()) => image = Some(dest),
                    Err(e) => {
                        counter!("watch_download_errors_total").increment(1);
                        warn!(url = %item.img_url, "media download failed: {e:#}");
                    }
                }
            }
        }
        NewsPayload {
            date: (!item.date.is_empty()).then(|| item.date.clone()),
            title: item.title.clone(),
            image,
            url: item.url.clone(),
        }
    }

    /// Pacing between successive outbound messages, so a downstream channel
    /// is not flooded. Blocks only the current notification loop.
    async fn pace(&self) {
        if self.cfg.notify_pacing_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.cfg.notify_pacing_ms)).await;
        }
    }

    /// Manual command path: up to `reply_items` most-recent payloads, newest
    /// first. An empty cache triggers one on-demand cycle before giving up;
    /// the degraded answer is an empty list, never internal error detail.
    pub async fn latest_news(&self) -> Vec<NewsPayload> {
        let mut cache = self.cache.lock().await;
        if cache.recent().is_empty() {
            if let Err(e) = self.cycle(&mut cache).await {
                warn!("on-demand poll failed: {e:#}");
            }
        }
        let items: Vec<NewsItem> = cache
            .recent()
            .iter()
            .take(self.cfg.reply_items)
            .cloned()
            .collect();

        let mut replies = Vec::with_capacity(items.len());
        for item in &items {
            replies.push(self.build_payload(item).await);
            self.pace().await;
        }
        replies
    }

    /// Start the periodic trigger. Aborting the returned handle stops the
    /// loop; an abandoned in-flight cycle is accepted as-is, no rollback
    /// mechanism exists.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.cfg.interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.run_once().await {
                    Ok(o) => debug!(
                        candidates = o.candidates,
                        novel = o.novel,
                        "poll cycle finished"
                    ),
                    Err(e) => warn!("poll cycle failed: {e:#}"),
                }
            }
        })
    }
}
