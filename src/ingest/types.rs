// src/ingest/types.rs
use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which kind of source produced an item. Drives scoring formula, date-resolution
/// depth and the position of the item in the combined list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Popularity-ranked stories with a reliable native timestamp (Hacker News).
    RankedStory,
    /// Free-text search hits without a reliable native timestamp (Brave).
    WebResult,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::RankedStory => "ranked_story",
            SourceKind::WebResult => "web_result",
        }
    }
}

/// Native publication hint supplied by an adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PublishedHint {
    /// Unix seconds.
    Timestamp(i64),
    /// Free-form date or age text ("2024-05-01T10:00:00Z", "3 days ago", ...).
    Text(String),
}

/// Producer-supplied item, as returned by a `SourceProvider`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawItem {
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub popularity: Option<f64>,
    pub published_hint: Option<PublishedHint>,
    #[serde(default)]
    pub source_metadata: Map<String, Value>,
}

impl RawItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = Some(popularity);
        self
    }

    pub fn with_hint(mut self, hint: PublishedHint) -> Self {
        self.published_hint = Some(hint);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.source_metadata.insert(key.to_string(), value.into());
        self
    }

    /// String metadata lookup; empty strings count as absent.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.source_metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Canonical pipeline output. Only built after a successful date resolution and
/// scoring pass, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendItem {
    pub title: String,
    pub url: Option<String>,
    pub source: SourceKind,
    /// Always within 1..=100.
    pub score: u8,
    pub published_at: DateTime<Utc>,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub metadata: Map<String, Value>,
}

/// A content source consumed by the pipeline.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Query-driven fetch of at most `count` items.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<RawItem>>;

    /// Unfiltered "top" batch used for backfill. Sources without one return nothing.
    async fn top(&self, _count: usize) -> Result<Vec<RawItem>> {
        Ok(Vec::new())
    }

    fn kind(&self) -> SourceKind;

    fn name(&self) -> &'static str;
}
