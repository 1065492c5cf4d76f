// src/terms.rs
//! Query term extraction.
//!
//! Reduces a free-form query (possibly carrying injected `--- Content of x ---`
//! blocks, see `file_refs`) to a space-joined list of search tokens:
//! - file blocks are cut out of the query body and mined separately for
//!   `"Context"` / `"Name"` hints (or, failing that, the first few words);
//! - the body is lower-cased, punctuation becomes whitespace;
//! - tokens shorter than 3 chars or on the stop list are dropped unless they are
//!   a known technical acronym.
//!
//! Order is preserved for logging; consumers treat the result as a bag.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

/// Short technical names that survive every length filter.
pub(crate) const TECH_ACRONYMS: &[&str] = &[
    "ai", "ml", "api", "cpu", "gpu", "sql", "css", "js", "go", "c++", "rust", "java", "python",
];

/// Function words, wh-words and generic "trend/tool/news" vocabulary.
const QUERY_STOP_WORDS: &[&str] = &[
    "tell", "me", "the", "and", "for", "you", "about", "could", "find", "anything", "related",
    "everything", "news", "most", "trendy", "currently", "like", "tools", "interested", "concept",
    "things", "trends", "what", "how", "why", "when", "where", "which", "who",
];

/// Generic words taken from an unstructured file block.
const MAX_FILE_WORDS: usize = 5;

static RE_FILE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)--- Content of .*? ---\s*(?P<body>.*?)\s*--- End of .*? ---")
        .expect("file block regex")
});
static RE_CONTEXT_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"context"\s*:\s*"([^"]*)""#).expect("context hint regex"));
static RE_NAME_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"name"\s*:\s*"([^"]*)""#).expect("name hint regex"));
static RE_ALPHA_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("alpha word regex"));
static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("punct regex"));

/// Names made of punctuation that survive normalization when they stand alone.
const PUNCTUATED_NAMES: &[&str] = &["c++", "c#"];

/// Sentence punctuation allowed to trail a punctuated name ("c++?").
const TRAILING_PUNCT: &[char] = &['?', '!', '.', ',', ';', ':'];

pub(crate) fn is_acronym(token: &str) -> bool {
    TECH_ACRONYMS.contains(&token)
}

/// Lower-case and replace punctuation with spaces, except for a standalone
/// `c++` / `c#`.
pub(crate) fn normalize_query_text(s: &str) -> String {
    s.to_lowercase()
        .split_whitespace()
        .map(|word| {
            let bare = word.trim_end_matches(TRAILING_PUNCT);
            if PUNCTUATED_NAMES.contains(&bare) {
                bare.to_string()
            } else {
                RE_PUNCT.replace_all(word, " ").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove injected file blocks, returning (body, blocks).
pub fn split_file_blocks(query: &str) -> (String, Vec<String>) {
    let blocks = RE_FILE_BLOCK
        .captures_iter(query)
        .filter_map(|c| c.name("body").map(|m| m.as_str().to_string()))
        .collect();
    let body = RE_FILE_BLOCK.replace_all(query, " ").into_owned();
    (body, blocks)
}

/// Structured hints from a file block, or the first few plain words if none.
fn file_block_terms(block: &str) -> Vec<String> {
    let lowered = block.to_ascii_lowercase();
    let structured = lowered.contains("\"context\"") || lowered.contains("\"tools\"");

    if structured {
        let mut out = Vec::new();
        if let Some(c) = RE_CONTEXT_HINT.captures(block) {
            let v = c[1].trim();
            if !v.is_empty() {
                out.push(v.to_string());
            }
        }
        out.extend(
            RE_NAME_HINT
                .captures_iter(block)
                .map(|c| c[1].trim().to_string())
                .filter(|v| !v.is_empty()),
        );
        if !out.is_empty() {
            return out;
        }
    }

    RE_ALPHA_WORD
        .find_iter(block)
        .take(MAX_FILE_WORDS)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn keep_query_token(token: &str) -> bool {
    (token.chars().count() >= 3 && !QUERY_STOP_WORDS.contains(&token)) || is_acronym(token)
}

/// Extract the search tokens for `raw_query`.
pub fn extract(raw_query: &str) -> String {
    let (body, blocks) = split_file_blocks(raw_query);

    let file_terms: Vec<String> = blocks.iter().flat_map(|b| file_block_terms(b)).collect();

    let normalized = normalize_query_text(&body);
    let body_tokens: Vec<&str> = normalized.split_whitespace().collect();
    let core_terms: Vec<String> = body_tokens
        .iter()
        .copied()
        .filter(|t| keep_query_token(t))
        .map(str::to_string)
        .collect();

    let mut all_terms = core_terms;
    all_terms.extend(file_terms);

    if all_terms.is_empty() {
        let stripped = body.trim();
        // Only fall back to the verbatim body when it carries something other
        // than stop words (e.g. short non-acronym names like "qt").
        let has_non_stop = body_tokens.iter().any(|t| !QUERY_STOP_WORDS.contains(t));
        if !stripped.is_empty() && has_non_stop {
            warn!(target: "terms", "no core terms extracted; using stripped query body");
            return stripped.to_string();
        }
        debug!(target: "terms", "query reduced to nothing");
        return String::new();
    }

    let result = all_terms.join(" ");
    info!(
        target: "terms",
        terms = all_terms.len(),
        file_blocks = blocks.len(),
        "extracted search terms"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stop_words_and_short_tokens() {
        assert_eq!(extract("Tell me about the trends in Rust"), "rust");
        assert_eq!(extract("what is new with kubernetes?"), "new with kubernetes");
    }

    #[test]
    fn keeps_acronyms() {
        assert_eq!(extract("AI and ML on a GPU"), "ai ml gpu");
        assert_eq!(extract("c++ news"), "c++");
        assert_eq!(extract("is c++? still alive"), "c++ still alive");
    }

    #[test]
    fn joined_names_are_split() {
        assert_eq!(extract("tokio+axum"), "tokio axum");
        assert_eq!(extract("serde/json, rayon#threads"), "serde json rayon threads");
    }

    #[test]
    fn pure_stop_words_give_empty() {
        assert_eq!(extract("tell me about the news"), "");
        assert_eq!(extract(""), "");
    }

    #[test]
    fn short_names_fall_back_to_body() {
        assert_eq!(extract("  qt ui "), "qt ui");
    }

    #[test]
    fn structured_file_block_hints() {
        let q = "trends for @x\n\n--- Content of stack.json ---\n{\"Context\": \"edge computing\", \"Tools\": [{\"Name\": \"wasmtime\"}, {\"Name\": \"deno\"}]}\n--- End of stack.json ---\n\n";
        let out = extract(q);
        assert_eq!(out, "edge computing wasmtime deno");
    }

    #[test]
    fn unstructured_file_block_takes_first_words() {
        let q = "--- Content of notes.json ---\n[\"alpha beta gamma delta epsilon zeta eta\"]\n--- End of notes.json ---";
        assert_eq!(extract(q), "alpha beta gamma delta epsilon");
    }
}
