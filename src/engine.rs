//! # Result Engine
//! Pure, testable logic that orders and de-duplicates finished `TrendItem`s.
//! No I/O, suitable for unit tests and offline evaluation.
//!
//! Policy: ranked stories come first (score desc), then web results
//! (score desc, newer first on ties). Duplicates are removed by normalized
//! URL or near-identical title; the first occurrence wins.

use std::cmp::Reverse;

use metrics::counter;
use strsim::normalized_levenshtein;
use tracing::debug;

use crate::ingest::types::TrendItem;

/// Titles at least this similar are considered the same story.
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Score descending.
pub fn sort_ranked(items: &mut [TrendItem]) {
    items.sort_by_key(|it| Reverse(it.score));
}

/// Score descending, then newer first.
pub fn sort_web(items: &mut [TrendItem]) {
    items.sort_by_key(|it| (Reverse(it.score), Reverse(it.published_at)));
}

/// Concatenate the two groups in output order, then drop duplicates.
/// Sorts are stable, so re-running on the output is a no-op.
pub fn combine(mut ranked: Vec<TrendItem>, mut web: Vec<TrendItem>) -> Vec<TrendItem> {
    sort_ranked(&mut ranked);
    sort_web(&mut web);
    let total = ranked.len() + web.len();
    ranked.extend(web);
    let out = dedup(ranked);
    if out.len() < total {
        let dropped = total - out.len();
        counter!("trends_items_rejected_total", "reason" => "duplicate").increment(dropped as u64);
        debug!(target: "engine", dropped, "duplicates removed");
    }
    out
}

/// Scheme, `www.`, trailing slash and fragment are ignored; host is lower-cased.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(u) => {
            let host = u.host_str().unwrap_or_default().to_ascii_lowercase();
            let host = host.strip_prefix("www.").unwrap_or(&host);
            let path = u.path().trim_end_matches('/');
            match u.query() {
                Some(q) => format!("{host}{path}?{q}"),
                None => format!("{host}{path}"),
            }
        }
        Err(_) => trimmed
            .split('#')
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_ascii_lowercase(),
    }
}

fn normalize_title(t: &str) -> String {
    t.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Drop later items that repeat an earlier URL or title. Idempotent.
pub fn dedup(items: Vec<TrendItem>) -> Vec<TrendItem> {
    let mut seen_urls: Vec<String> = Vec::new();
    let mut seen_titles: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(items.len());

    for it in items {
        let url_key = it.url.as_deref().map(normalize_url).filter(|u| !u.is_empty());
        let title_key = normalize_title(&it.title);

        let dup_url = url_key.as_ref().is_some_and(|u| seen_urls.contains(u));
        let dup_title = !title_key.is_empty()
            && seen_titles
                .iter()
                .any(|t| normalized_levenshtein(t, &title_key) >= TITLE_SIMILARITY_THRESHOLD);
        if dup_url || dup_title {
            continue;
        }

        if let Some(u) = url_key {
            seen_urls.push(u);
        }
        if !title_key.is_empty() {
            seen_titles.push(title_key);
        }
        out.push(it);
    }
    out
}
