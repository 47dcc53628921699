// src/extract.rs
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::item::NewsItem;

static SEL_CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.style_card__uwotf").unwrap());
static SEL_TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.style_title_link__FM_4I").unwrap());
static SEL_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time, p[class*=\"date\"]").unwrap());
static SEL_THUMB_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.style_thumb_link__emQuk img").unwrap());

/// Parse rendered markup into item records, document order (the page lists
/// newest first), capped at `max_cards`. A card missing its title link is
/// skipped with a diagnostic; zero cards is an empty result, not an error —
/// the caller treats it as a probable site-structure change.
pub fn extract_items(markup: &str, origin: &str, max_cards: usize) -> Vec<NewsItem> {
    let base = match Url::parse(origin) {
        Ok(u) => u,
        Err(e) => {
            warn!("invalid origin {origin}: {e}");
            return Vec::new();
        }
    };

    let doc = Html::parse_document(markup);
    let cards: Vec<_> = doc.select(&SEL_CARD).take(max_cards).collect();
    if cards.is_empty() {
        warn!("no news cards found; the page structure may have changed");
        return Vec::new();
    }
    debug!(count = cards.len(), "found news cards");

    let mut items = Vec::with_capacity(cards.len());
    for card in cards {
        let Some(link) = card.select(&SEL_TITLE_LINK).next() else {
            warn!("news card without a title link, skipping");
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();
        let href = link.value().attr("href").unwrap_or_default();
        let Some(url) = absolutize(&base, href) else {
            warn!(title = %title, "news card without a usable link, skipping");
            continue;
        };
        if title.is_empty() {
            warn!(url = %url, "news card with an empty title, skipping");
            continue;
        }

        let date = card
            .select(&SEL_DATE)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let img_url = card
            .select(&SEL_THUMB_IMG)
            .next()
            .and_then(|img| {
                img.value()
                    .attr("src")
                    .filter(|s| !s.is_empty())
                    .or_else(|| img.value().attr("data-src"))
            })
            .and_then(|raw| absolutize(&base, raw))
            .unwrap_or_default();

        items.push(NewsItem {
            id: url.clone(),
            title,
            date,
            url,
            img_url,
        });
    }
    items
}

/// Resolve a possibly relative or protocol-relative href against the site
/// origin; `//host/...` becomes `https://host/...` via the base scheme.
fn absolutize(base: &Url, raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    base.join(raw).ok().map(|u| u.to_string())
}
