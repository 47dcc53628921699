// src/item.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One detected news entry. `id` is the canonicalized absolute detail URL;
/// `date` and `img_url` use an empty string for "absent", matching the
/// persisted cache shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub date: String,
    pub url: String,
    #[serde(default)]
    pub img_url: String,
}

impl NewsItem {
    pub fn has_media(&self) -> bool {
        !self.img_url.is_empty()
    }
}

/// What a delivery sink receives for one item: optional date text, title,
/// optional local media path, detail URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsPayload {
    pub date: Option<String>,
    pub title: String,
    pub image: Option<PathBuf>,
    pub url: String,
}

impl NewsPayload {
    /// Text lines of the notification message. The image path rides
    /// alongside for sinks that can attach media inline.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(date) = &self.date {
            out.push_str(&format!("【{date}】\n"));
        }
        out.push_str(&self.title);
        out.push('\n');
        out.push_str(&format!("▲{}", self.url));
        out
    }
}
