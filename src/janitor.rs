// src/janitor.rs
use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

/// Remove files in `img_dir` whose name is not one of the retained media
/// keys. Scoped strictly to that directory; per-file failures are logged
/// and skipped. Returns how many files were removed.
pub fn sweep_orphans(img_dir: &Path, retained: &HashSet<String>) -> usize {
    let entries = match std::fs::read_dir(img_dir) {
        Ok(e) => e,
        // Nothing has been downloaded yet.
        Err(_) => return 0,
    };

    let mut deleted = 0;
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if retained.contains(&name) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                info!(file = %name, "removed orphaned media file");
                deleted += 1;
            }
            Err(e) => warn!(file = %name, "failed to remove orphaned media file: {e}"),
        }
    }
    deleted
}
