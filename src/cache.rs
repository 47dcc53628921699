// src/cache.rs
use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::item::NewsItem;

/// On-disk shape: every id ever observed plus the bounded most-recent list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    seen: Vec<String>,
    recent: Vec<NewsItem>,
}

/// Dedup state for the watcher. `seen` grows monotonically and is the sole
/// novelty test; `recent` is a bounded working set replaced wholesale after
/// each poll that changed anything.
#[derive(Debug)]
pub struct NewsCache {
    path: PathBuf,
    retain: usize,
    seen: HashSet<String>,
    recent: Vec<NewsItem>,
}

impl NewsCache {
    /// Tolerant load: an unreadable or corrupt state file starts the cache
    /// empty instead of failing, so the watcher degrades to non-durable.
    pub fn load(path: impl Into<PathBuf>, retain: usize) -> Self {
        let path = path.into();
        let (seen, recent) = match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<CacheFile>(&s) {
                Ok(f) => (f.seen.into_iter().collect::<HashSet<_>>(), f.recent),
                Err(e) => {
                    warn!("corrupt cache file {}: {e}", path.display());
                    (HashSet::new(), Vec::new())
                }
            },
            Err(_) => (HashSet::new(), Vec::new()),
        };
        if !seen.is_empty() {
            info!(seen = seen.len(), recent = recent.len(), "news cache loaded");
        }
        Self {
            path,
            retain,
            seen,
            recent,
        }
    }

    /// True before the first successful poll ever recorded anything.
    pub fn is_cold(&self) -> bool {
        self.seen.is_empty()
    }

    /// Most-recent items, newest first, at most `retain` of them.
    pub fn recent(&self) -> &[NewsItem] {
        &self.recent
    }

    /// Returns the candidates absent from the seen set, in candidate order
    /// (newest first). The first-ever batch seeds the cache and reports
    /// nothing as novel, so a cold start never floods recipients.
    ///
    /// On any mutation the seen set absorbs the *full* candidate batch and
    /// `recent` is replaced with the first `retain` candidates; a quiet poll
    /// leaves the cache untouched.
    pub fn diff_and_update(&mut self, candidates: &[NewsItem]) -> Vec<NewsItem> {
        if candidates.is_empty() {
            return Vec::new();
        }
        if self.is_cold() {
            self.absorb(candidates);
            return Vec::new();
        }
        let novel: Vec<NewsItem> = candidates
            .iter()
            .filter(|c| !self.seen.contains(&c.id))
            .cloned()
            .collect();
        if !novel.is_empty() {
            self.absorb(candidates);
        }
        novel
    }

    fn absorb(&mut self, candidates: &[NewsItem]) {
        self.seen.extend(candidates.iter().map(|c| c.id.clone()));
        self.recent = candidates.iter().take(self.retain).cloned().collect();
        self.save();
    }

    /// Synchronous best-effort persistence after every mutation, so a crash
    /// right after notifying does not re-deliver on restart. Failure is
    /// logged and the in-memory state stays authoritative.
    fn save(&self) {
        if let Some(dir) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("cache dir {}: {e}", dir.display());
            }
        }
        let mut seen: Vec<String> = self.seen.iter().cloned().collect();
        seen.sort();
        let file = CacheFile {
            seen,
            recent: self.recent.clone(),
        };
        match serde_json::to_vec_pretty(&file) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    warn!("write cache {}: {e}", self.path.display());
                }
            }
            Err(e) => warn!("serialize cache: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> NewsItem {
        NewsItem {
            id: format!("https://idolmaster-official.jp/news/{id}"),
            title: format!("Title {id}"),
            date: "2025.08.01".into(),
            url: format!("https://idolmaster-official.jp/news/{id}"),
            img_url: String::new(),
        }
    }

    fn fresh(dir: &tempfile::TempDir) -> NewsCache {
        NewsCache::load(dir.path().join("cache.json"), 5)
    }

    #[test]
    fn cold_start_seeds_and_reports_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = fresh(&tmp);
        assert!(cache.is_cold());

        let batch = vec![item("1"), item("2")];
        let novel = cache.diff_and_update(&batch);
        assert!(novel.is_empty());
        assert!(!cache.is_cold());
        assert_eq!(cache.recent(), &batch[..]);
    }

    #[test]
    fn identical_batch_is_novel_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = fresh(&tmp);
        cache.diff_and_update(&[item("0")]);

        let batch = vec![item("1"), item("2")];
        let first = cache.diff_and_update(&batch);
        assert_eq!(first.len(), 2);
        let second = cache.diff_and_update(&batch);
        assert!(second.is_empty());
    }

    #[test]
    fn novel_subset_keeps_candidate_order() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = fresh(&tmp);
        cache.diff_and_update(&[item("a"), item("b")]);

        let batch = vec![item("new2"), item("new1"), item("a"), item("b")];
        let novel = cache.diff_and_update(&batch);
        assert_eq!(novel, vec![item("new2"), item("new1")]);
    }

    #[test]
    fn retained_items_never_exceed_bound() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = fresh(&tmp);
        let batch: Vec<NewsItem> = (0..9).map(|i| item(&i.to_string())).collect();
        cache.diff_and_update(&batch);
        assert_eq!(cache.recent().len(), 5);
        assert_eq!(cache.recent()[0], batch[0]);

        let bigger: Vec<NewsItem> = (5..14).map(|i| item(&i.to_string())).collect();
        cache.diff_and_update(&bigger);
        assert_eq!(cache.recent().len(), 5);
        assert_eq!(cache.recent()[0], bigger[0]);
    }

    #[test]
    fn quiet_poll_mutates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = fresh(&tmp);
        cache.diff_and_update(&[item("1"), item("2"), item("3")]);

        // Same ids, reordered and truncated: nothing novel, so the retained
        // list must stay as recorded by the last real change.
        let before = cache.recent().to_vec();
        let novel = cache.diff_and_update(&[item("3"), item("1")]);
        assert!(novel.is_empty());
        assert_eq!(cache.recent(), &before[..]);
    }

    #[test]
    fn empty_candidate_batch_never_seeds() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = fresh(&tmp);
        assert!(cache.diff_and_update(&[]).is_empty());
        assert!(cache.is_cold());
    }

    #[test]
    fn state_survives_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.json");
        {
            let mut cache = NewsCache::load(&path, 5);
            cache.diff_and_update(&[item("1"), item("2")]);
        }
        let mut reloaded = NewsCache::load(&path, 5);
        assert!(!reloaded.is_cold());
        assert_eq!(reloaded.recent().len(), 2);
        // Restart must not re-flag already-announced items.
        assert!(reloaded.diff_and_update(&[item("1"), item("2")]).is_empty());
    }

    #[test]
    fn corrupt_state_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(&path, b"{not json").unwrap();
        let cache = NewsCache::load(&path, 5);
        assert!(cache.is_cold());
        assert!(cache.recent().is_empty());
    }
}
