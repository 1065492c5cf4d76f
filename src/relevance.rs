// src/relevance.rs
//! Relevance gate primitives: tokenizer, filter-term selection, strict/loose
//! item matching and the weaker title check used by backfill.
//!
//! The primary path (`is_relevant`) only considers terms of 5+ chars (or known
//! acronyms) and requires a whole-word hit unless the caller loosens it with
//! `MatchOptions`. The backfill path (`has_minimal_relevance`) accepts any 4+
//! char term found anywhere in the title.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::ingest::types::RawItem;
use crate::terms::{is_acronym, normalize_query_text};

/// Shorter stop list used by the item filter (wh-words are already < 5 chars).
const FILTER_STOP_WORDS: &[&str] = &[
    "tell", "the", "and", "for", "you", "about", "could", "find", "anything", "related",
    "everything", "news", "most", "trendy", "currently", "like", "tools", "interested", "concept",
    "things",
];

/// Terms ignored by the backfill title check.
const BACKFILL_STOP_WORDS: &[&str] = &["trends", "about", "news", "tools"];

pub const FILTER_MIN_TERM_LEN: usize = 5;
pub const BACKFILL_MIN_TERM_LEN: usize = 4;

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("tokenizer regex"));

/// Independent loosening switches for `is_relevant`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Accept "agent" for "agents" and vice versa ("s"/"es" suffixes).
    pub allow_plural: bool,
    /// Accept the term anywhere inside the searchable text.
    pub allow_substring: bool,
}

impl MatchOptions {
    /// Exact whole-word matching only.
    pub const fn strict() -> Self {
        Self {
            allow_plural: false,
            allow_substring: false,
        }
    }

    /// Both loosening switches on (primary query path).
    pub const fn loose() -> Self {
        Self {
            allow_plural: true,
            allow_substring: true,
        }
    }
}

// Dev logging gate: TRENDS_DEV_LOG=1 AND dev env (debug or TRENDS_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("TRENDS_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("TRENDS_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Short anonymised id for log lines that would otherwise carry raw text.
pub(crate) fn anon_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Lower-cased whole words of `input`.
pub fn tokenize(input: &str) -> Vec<String> {
    RE_WORD
        .find_iter(input)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Terms from `tokens` that the item filter is allowed to match on.
pub fn filter_terms(tokens: &str) -> Vec<String> {
    normalize_query_text(tokens)
        .split_whitespace()
        .filter(|t| {
            (t.chars().count() >= FILTER_MIN_TERM_LEN && !FILTER_STOP_WORDS.contains(t))
                || is_acronym(t)
        })
        .map(str::to_string)
        .collect()
}

fn searchable_blob(item: &RawItem) -> String {
    let mut blob = String::new();
    blob.push_str(&item.title);
    blob.push(' ');
    blob.push_str(item.text.as_deref().unwrap_or_default());
    blob.push(' ');
    blob.push_str(item.url.as_deref().unwrap_or_default());
    blob.trim().to_lowercase()
}

fn plural_variant_hit(term: &str, words: &HashSet<String>) -> bool {
    if let Some(singular) = term.strip_suffix('s') {
        if words.contains(singular) {
            return true;
        }
    }
    words.contains(&format!("{term}s"))
        || words.contains(&format!("{term}es"))
        || words.contains(term.trim_end_matches('s'))
}

/// Does `item` match the extracted `tokens` under `opts`?
///
/// An empty item, empty `tokens`, or `tokens` without any qualifying filter
/// term never match.
pub fn is_relevant(item: &RawItem, tokens: &str, opts: MatchOptions) -> bool {
    if tokens.trim().is_empty() {
        return false;
    }
    let blob = searchable_blob(item);
    if blob.is_empty() {
        return false;
    }

    let terms = filter_terms(tokens);
    if terms.is_empty() {
        return false;
    }

    let words: HashSet<String> = tokenize(&blob).into_iter().collect();
    let dev = dev_logging_enabled();

    for term in &terms {
        let hit = if words.contains(term) {
            Some("exact")
        } else if opts.allow_plural && plural_variant_hit(term, &words) {
            Some("plural")
        } else if opts.allow_substring && blob.contains(term.as_str()) {
            Some("substring")
        } else {
            None
        };

        if let Some(kind) = hit {
            if dev {
                info!(target: "relevance", id = %anon_hash(&item.title), %term, kind, "item matched");
            }
            return true;
        }
    }

    debug!(target: "relevance", terms = terms.len(), "item rejected: no term matched");
    false
}

/// Loose title check used when topping up from an unfiltered batch: any 4+ char
/// term (or its "s"-stripped form) found anywhere in the title. No tokens at all
/// means there is nothing to filter on, so everything passes.
pub fn has_minimal_relevance(title: &str, tokens: &str) -> bool {
    if tokens.trim().is_empty() {
        return true;
    }
    let title_lower = title.to_lowercase();
    normalize_query_text(tokens)
        .split_whitespace()
        .filter(|t| t.chars().count() >= BACKFILL_MIN_TERM_LEN && !BACKFILL_STOP_WORDS.contains(t))
        .any(|t| {
            title_lower.contains(t)
                || t.strip_suffix('s')
                    .is_some_and(|singular| title_lower.contains(singular))
        })
}
