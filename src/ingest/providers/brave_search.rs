use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use serde::Deserialize;

use crate::ingest::normalize_text;
use crate::ingest::types::{PublishedHint, RawItem, SourceKind, SourceProvider};

/// The API rejects larger pages.
const MAX_COUNT: usize = 20;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    age: Option<String>,
    page_age: Option<String>,
    language: Option<String>,
    family_friendly: Option<bool>,
}

pub struct BraveSearchProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        api_key: Option<String>,
        client: reqwest::Client,
    },
}

impl BraveSearchProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    /// A missing key is accepted here and reported by every `search` call.
    pub fn from_url(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building brave client")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.to_string(),
                api_key,
                client,
            },
        })
    }

    fn parse_results(s: &str, query: &str) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let resp: SearchResponse = serde_json::from_str(s).context("parsing brave search json")?;
        let results = resp.web.map(|w| w.results).unwrap_or_default();

        let mut out = Vec::with_capacity(results.len());
        for (rank, r) in results.into_iter().enumerate() {
            let title = normalize_text(r.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let mut item = RawItem::new(title)
                .with_meta("search_terms", query)
                .with_meta("rank", rank + 1)
                .with_meta("search_engine", "brave");

            if let Some(url) = r.url.filter(|u| !u.trim().is_empty()) {
                item = item.with_url(url);
            }
            let desc = normalize_text(r.description.as_deref().unwrap_or_default());
            if !desc.is_empty() {
                item = item.with_text(desc);
            }
            // page_age is an ISO timestamp; age is often display text ("3 days ago").
            let hint = r
                .page_age
                .filter(|s| !s.trim().is_empty())
                .or_else(|| r.age.clone().filter(|s| !s.trim().is_empty()));
            if let Some(h) = hint {
                item = item.with_hint(PublishedHint::Text(h));
            }
            if let Some(age) = r.age {
                item = item.with_meta("age", age);
            }
            if let Some(lang) = r.language {
                item = item.with_meta("language", lang);
            }
            if let Some(ff) = r.family_friendly {
                item = item.with_meta("family_friendly", ff);
            }
            out.push(item);
        }

        histogram!("trends_provider_parse_ms", "source" => "brave_search")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for BraveSearchProvider {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<RawItem>> {
        let count = count.clamp(1, MAX_COUNT);
        match &self.mode {
            Mode::Fixture(s) => Ok(Self::parse_results(s, query)?
                .into_iter()
                .take(count)
                .collect()),
            Mode::Http {
                url,
                api_key,
                client,
            } => {
                let key = api_key
                    .as_deref()
                    .ok_or_else(|| anyhow!("BRAVE_API_KEY is not configured"))?;
                let count_s = count.to_string();
                let body = client
                    .get(url.as_str())
                    .header("Accept", "application/json")
                    .header("X-Subscription-Token", key)
                    .query(&[
                        ("q", query),
                        ("count", count_s.as_str()),
                        ("freshness", "pm"),
                    ])
                    .send()
                    .await
                    .context("brave search get()")?
                    .error_for_status()
                    .context("brave search status")?
                    .text()
                    .await
                    .context("brave search .text()")?;
                Self::parse_results(&body, query)
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::WebResult
    }

    fn name(&self) -> &'static str {
        "brave_search"
    }
}
