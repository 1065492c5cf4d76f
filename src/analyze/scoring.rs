//! Score formulas for the two source kinds.
//!
//! Both return an integer in `1..=100`:
//! - ranked stories blend popularity, title substance and recency
//!   (`0.5 * points + 0.4 * substance + 0.1 * recency`);
//! - web results start from a base and accumulate bonuses for the hosting
//!   domain, term hits in title/description/url, the whole phrase and a
//!   technology keyword.

use chrono::{DateTime, Utc};

use crate::source_weights::DomainWeights;

/// Web score when there is nothing to score against.
pub const NEUTRAL_WEB_SCORE: u8 = 30;
const WEB_BASE: i32 = 15;

const TITLE_REPEAT_BONUS: i32 = 30;
const TITLE_BONUS: i32 = 20;
const DESCRIPTION_BONUS: i32 = 15;
const URL_BONUS: i32 = 12;
const PARTIAL_TITLE_BONUS: i32 = 8;
const PHRASE_TITLE_BONUS: i32 = 25;
const PHRASE_DESCRIPTION_BONUS: i32 = 15;
const TECH_KEYWORD_BONUS: i32 = 5;

/// Plain substring hits: "ai" in "maintain" still earns the bonus.
const TECH_KEYWORDS: &[&str] = &[
    "api", "framework", "library", "python", "javascript", "react", "vue", "angular", "docker",
    "kubernetes", "aws", "azure", "gcp", "ml", "ai", "database", "sql",
];

fn clamp_score(x: f64) -> u8 {
    x.clamp(1.0, 100.0) as u8
}

/// Ranked-story score from popularity, title and age.
pub fn ranked_story_score(
    popularity: Option<f64>,
    title: &str,
    published_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u8 {
    let points = popularity.unwrap_or(0.0).max(0.0);
    let popularity_score = (points / 5.0).min(100.0);

    let substantial_words = title.split_whitespace().filter(|w| w.chars().count() > 3).count();
    let substance_score = (substantial_words as f64 * 10.0).min(100.0);

    let hours = (now - published_at).num_seconds().max(0) as f64 / 3600.0;
    let recency_score = (100.0 - hours / 24.0 * 10.0).max(0.0);

    clamp_score(0.5 * popularity_score + 0.4 * substance_score + 0.1 * recency_score)
}

/// `term` with a trailing plural suffix removed.
fn stem(term: &str) -> &str {
    term.strip_suffix("es")
        .filter(|s| s.len() > 2)
        .or_else(|| term.strip_suffix('s'))
        .filter(|s| s.len() > 2)
        .unwrap_or(term)
}

/// Web-result score from textual evidence and the domain table.
pub fn web_result_score(
    title: &str,
    url: &str,
    description: &str,
    tokens: &str,
    weights: &DomainWeights,
) -> u8 {
    let terms: Vec<String> = tokens
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() > 2)
        .collect();
    if title.trim().is_empty() || tokens.trim().is_empty() {
        return NEUTRAL_WEB_SCORE;
    }

    let title_l = title.to_lowercase();
    let desc_l = description.to_lowercase();
    let url_l = url.to_lowercase();

    let mut score = WEB_BASE + i32::from(weights.bonus_for(url));

    for term in &terms {
        if title_l.contains(term.as_str()) {
            score += if title_l.matches(term.as_str()).count() > 1 {
                TITLE_REPEAT_BONUS
            } else {
                TITLE_BONUS
            };
        } else if desc_l.contains(term.as_str()) {
            score += DESCRIPTION_BONUS;
        } else if url_l.contains(term.as_str()) {
            score += URL_BONUS;
        } else if title_l.split_whitespace().any(|w| w.contains(stem(term))) {
            score += PARTIAL_TITLE_BONUS;
        }
    }

    let phrase = terms.join(" ");
    if !phrase.is_empty() {
        if title_l.contains(&phrase) {
            score += PHRASE_TITLE_BONUS;
        }
        if desc_l.contains(&phrase) {
            score += PHRASE_DESCRIPTION_BONUS;
        }
    }

    let text = format!("{title_l} {desc_l}");
    if TECH_KEYWORDS.iter().any(|k| text.contains(*k)) {
        score += TECH_KEYWORD_BONUS;
    }

    clamp_score(f64::from(score))
}
