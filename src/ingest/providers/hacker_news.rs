use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::ingest::normalize_text;
use crate::ingest::types::{PublishedHint, RawItem, SourceKind, SourceProvider};

const DISCUSSION_BASE: &str = "https://news.ycombinator.com/item?id=";
const ITEM_FAN_OUT: usize = 8;

/// Algolia search response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    points: Option<i64>,
    author: Option<String>,
    created_at_i: Option<i64>,
    num_comments: Option<i64>,
    story_text: Option<String>,
}

/// Firebase item payload.
#[derive(Debug, Deserialize)]
struct FirebaseItem {
    id: u64,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    score: Option<i64>,
    by: Option<String>,
    time: Option<i64>,
    descendants: Option<i64>,
    text: Option<String>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    dead: bool,
}

struct Story {
    id: String,
    title: String,
    url: Option<String>,
    points: Option<i64>,
    author: Option<String>,
    time: Option<i64>,
    comments: Option<i64>,
    text: Option<String>,
}

impl Story {
    fn into_raw(self) -> RawItem {
        let hn_url = format!("{DISCUSSION_BASE}{}", self.id);
        let external = self.url.filter(|u| !u.trim().is_empty());

        let mut item = RawItem::new(self.title)
            .with_url(external.clone().unwrap_or_else(|| hn_url.clone()))
            .with_meta("hn_id", self.id)
            .with_meta("hn_url", hn_url)
            .with_meta("external_url", external.unwrap_or_default())
            .with_meta("author", self.author.unwrap_or_default())
            .with_meta("comments", self.comments.unwrap_or(0));

        if let Some(p) = self.points {
            item = item.with_popularity(p as f64).with_meta("hn_points", p);
        }
        if let Some(ts) = self.time {
            item = item.with_hint(PublishedHint::Timestamp(ts));
        }
        if let Some(text) = self.text.map(|t| normalize_text(&t)).filter(|t| !t.is_empty()) {
            item = item.with_text(text);
        }
        item
    }
}

pub struct HackerNewsProvider {
    mode: Mode,
}

enum Mode {
    Fixture {
        search: String,
        top: String,
    },
    Http {
        search_url: String,
        api_base: String,
        client: reqwest::Client,
    },
}

impl HackerNewsProvider {
    /// Offline provider: `search` is an Algolia response body, `top` a JSON
    /// array of Firebase items.
    pub fn from_fixture_str(search: &str, top: &str) -> Self {
        Self {
            mode: Mode::Fixture {
                search: search.to_string(),
                top: top.to_string(),
            },
        }
    }

    pub fn from_urls(search_url: &str, api_base: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building hacker news client")?;
        Ok(Self {
            mode: Mode::Http {
                search_url: search_url.to_string(),
                api_base: api_base.trim_end_matches('/').to_string(),
                client,
            },
        })
    }

    fn parse_search(s: &str) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let resp: SearchResponse = serde_json::from_str(s).context("parsing hn search json")?;
        let out: Vec<RawItem> = resp
            .hits
            .into_iter()
            .filter_map(|h| {
                let title = h.title.filter(|t| !t.trim().is_empty())?;
                Some(
                    Story {
                        id: h.object_id,
                        title,
                        url: h.url,
                        points: h.points,
                        author: h.author,
                        time: h.created_at_i,
                        comments: h.num_comments,
                        text: h.story_text,
                    }
                    .into_raw(),
                )
            })
            .collect();
        histogram!("trends_provider_parse_ms", "source" => "hacker_news")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }

    /// `None` for deleted, dead, untitled or non-story items.
    fn story_from_item(it: FirebaseItem) -> Option<RawItem> {
        if it.deleted || it.dead || it.kind.as_deref().is_some_and(|k| k != "story") {
            return None;
        }
        let title = it.title.filter(|t| !t.trim().is_empty())?;
        Some(
            Story {
                id: it.id.to_string(),
                title,
                url: it.url,
                points: it.score,
                author: it.by,
                time: it.time,
                comments: it.descendants,
                text: it.text,
            }
            .into_raw(),
        )
    }

    fn parse_item(s: &str) -> Result<Option<RawItem>> {
        let it: Option<FirebaseItem> = serde_json::from_str(s).context("parsing hn item json")?;
        Ok(it.and_then(Self::story_from_item))
    }

    fn parse_items(s: &str, count: usize) -> Result<Vec<RawItem>> {
        let items: Vec<FirebaseItem> = serde_json::from_str(s).context("parsing hn items json")?;
        Ok(items
            .into_iter()
            .filter_map(Self::story_from_item)
            .take(count)
            .collect())
    }

    async fn fetch_top(
        client: &reqwest::Client,
        api_base: &str,
        count: usize,
    ) -> Result<Vec<RawItem>> {
        let ids: Vec<u64> = client
            .get(format!("{api_base}/topstories.json"))
            .send()
            .await
            .context("hn topstories get()")?
            .error_for_status()
            .context("hn topstories status")?
            .json()
            .await
            .context("hn topstories json")?;

        let permits = Arc::new(Semaphore::new(ITEM_FAN_OUT));
        let mut set = JoinSet::new();
        for (idx, id) in ids.into_iter().take(count).enumerate() {
            let permits = permits.clone();
            let client = client.clone();
            let url = format!("{api_base}/item/{id}.json");
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                let body = match client.get(&url).send().await {
                    Ok(resp) => resp.text().await.ok()?,
                    Err(e) => {
                        tracing::debug!(target: "ingest", error = %e, id, "hn item fetch failed");
                        return None;
                    }
                };
                Self::parse_item(&body).ok().flatten().map(|item| (idx, item))
            });
        }

        let mut out = Vec::new();
        while let Some(joined) = set.join_next().await {
            if let Ok(Some(hit)) = joined {
                out.push(hit);
            }
        }
        out.sort_by_key(|(idx, _)| *idx);
        Ok(out.into_iter().map(|(_, item)| item).collect())
    }
}

#[async_trait]
impl SourceProvider for HackerNewsProvider {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture { search, .. } => {
                Ok(Self::parse_search(search)?.into_iter().take(count).collect())
            }
            Mode::Http {
                search_url, client, ..
            } => {
                let hits = count.to_string();
                let body = client
                    .get(search_url.as_str())
                    .query(&[
                        ("query", query),
                        ("tags", "story"),
                        ("hitsPerPage", hits.as_str()),
                    ])
                    .send()
                    .await
                    .context("hn search get()")?
                    .error_for_status()
                    .context("hn search status")?
                    .text()
                    .await
                    .context("hn search .text()")?;
                Ok(Self::parse_search(&body)?.into_iter().take(count).collect())
            }
        }
    }

    async fn top(&self, count: usize) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture { top, .. } => Self::parse_items(top, count),
            Mode::Http {
                api_base, client, ..
            } => Self::fetch_top(client, api_base, count).await,
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::RankedStory
    }

    fn name(&self) -> &'static str {
        "hacker_news"
    }
}
