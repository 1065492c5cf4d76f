// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyze::{extract_tech_tags, ranked_story_score, web_result_score};
use crate::config::{PipelineConfig, ProviderSettings};
use crate::dates::{DateResolver, HttpPageFetcher, ResolvedDate};
use crate::engine;
use crate::file_refs::inject_file_references;
use crate::metrics::ensure_metrics_described;
use crate::relevance::{anon_hash, has_minimal_relevance, is_relevant, MatchOptions};
use crate::ingest::providers::{BraveSearchProvider, HackerNewsProvider};
use crate::ingest::types::{RawItem, SourceKind, SourceProvider, TrendItem};
use crate::source_weights::DomainWeights;
use crate::terms;

const MAX_TEXT_CHARS: usize = 1500;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize provider text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    let out = RE_TAGS.replace_all(&out, " ");

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    let out = RE_WS.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out.chars().take(MAX_TEXT_CHARS).collect()
    } else {
        out
    }
}

/// Identity of a raw item for backfill exclusion.
fn item_key(it: &RawItem) -> String {
    it.meta_str("hn_id")
        .map(str::to_string)
        .or_else(|| it.url.as_deref().map(engine::normalize_url))
        .unwrap_or_else(|| it.title.to_lowercase())
}

/// End-to-end trend query over an optional ranked-story source and an optional
/// web-result source.
pub struct TrendPipeline {
    ranked: Option<Arc<dyn SourceProvider>>,
    web: Option<Arc<dyn SourceProvider>>,
    config: PipelineConfig,
    resolver: DateResolver,
    weights: DomainWeights,
}

impl TrendPipeline {
    pub fn new(config: PipelineConfig, resolver: DateResolver) -> Self {
        Self {
            ranked: None,
            web: None,
            config,
            resolver,
            weights: DomainWeights::default_seed(),
        }
    }

    /// HTTP-backed pipeline: Hacker News always, Brave only with an API key.
    pub fn from_settings(config: PipelineConfig, settings: &ProviderSettings) -> Result<Self> {
        let fetcher = HttpPageFetcher::new(config.fetch_timeout(), &config.user_agent)?;
        let resolver =
            DateResolver::new(Arc::new(fetcher), config.fetch_timeout(), config.date_fan_out);
        let weights = DomainWeights::load_from_file(&config.domain_weights_path);

        let hn = HackerNewsProvider::from_urls(
            &settings.hn_search_url,
            &settings.hn_api_base,
            config.provider_timeout(),
        )?;
        let mut pipeline = Self::new(config, resolver)
            .with_ranked(Arc::new(hn))
            .with_domain_weights(weights);

        match &settings.brave_api_key {
            Some(key) => {
                let brave = BraveSearchProvider::from_url(
                    &settings.brave_search_url,
                    Some(key.clone()),
                    pipeline.config.provider_timeout(),
                )?;
                pipeline = pipeline.with_web(Arc::new(brave));
            }
            None => info!(target: "ingest", "BRAVE_API_KEY not set; web results disabled"),
        }
        Ok(pipeline)
    }

    pub fn with_ranked(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.ranked = Some(provider);
        self
    }

    pub fn with_web(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.web = Some(provider);
        self
    }

    pub fn with_domain_weights(mut self, weights: DomainWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ranked list for `query`. Never fails; source errors yield fewer items.
    pub async fn get_trends(
        &self,
        query: &str,
        limit: usize,
        use_ranked: bool,
        use_web: bool,
    ) -> Vec<TrendItem> {
        self.get_trends_with_cancel(query, limit, use_ranked, use_web, CancellationToken::new())
            .await
    }

    /// Like `get_trends`, but stops early when `cancel` fires (or the configured
    /// request deadline passes) and returns whatever had completed.
    pub async fn get_trends_with_cancel(
        &self,
        query: &str,
        limit: usize,
        use_ranked: bool,
        use_web: bool,
        cancel: CancellationToken,
    ) -> Vec<TrendItem> {
        ensure_metrics_described();
        let t0 = Instant::now();

        let cancel = cancel.child_token();
        let deadline = self.config.request_timeout().map(|t| {
            let c = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(t).await;
                c.cancel();
            })
        });

        let query = match &self.config.data_dir {
            Some(dir) => inject_file_references(query, dir),
            None => query.to_string(),
        };
        let tokens = terms::extract(&query);
        let now = Utc::now();

        info!(
            target: "ingest",
            qid = %anon_hash(&query),
            tokens = tokens.split_whitespace().count(),
            limit,
            use_ranked,
            use_web,
            "get_trends"
        );

        let ranked_fut = async {
            match (&self.ranked, use_ranked && limit > 0) {
                (Some(p), true) => self.ranked_items(p.as_ref(), &tokens, limit, now, &cancel).await,
                _ => Vec::new(),
            }
        };
        let web_fut = async {
            match (&self.web, use_web && limit > 0) {
                (Some(p), true) => self.web_items(p.as_ref(), &tokens, limit, now, &cancel).await,
                _ => Vec::new(),
            }
        };
        let (ranked, web) = tokio::join!(ranked_fut, web_fut);

        if let Some(handle) = deadline {
            handle.abort();
        }

        let (n_ranked, n_web) = (ranked.len(), web.len());
        let out = engine::combine(ranked, web);

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("trends_pipeline_ms").record(ms);
        info!(
            target: "ingest",
            ranked = n_ranked,
            web = n_web,
            total = out.len(),
            cancelled = cancel.is_cancelled(),
            ms,
            "trends ready"
        );
        out
    }

    /// Provider call bounded by the provider timeout and `cancel`. Errors are
    /// logged, counted and degraded to an empty batch.
    async fn call_provider<F>(
        &self,
        source: &'static str,
        call: F,
        cancel: &CancellationToken,
    ) -> Vec<RawItem>
    where
        F: Future<Output = Result<Vec<RawItem>>>,
    {
        let res = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(target: "ingest", source, "provider call cancelled");
                return Vec::new();
            }
            res = tokio::time::timeout(self.config.provider_timeout(), call) => res,
        };
        match res {
            Ok(Ok(items)) => {
                counter!("trends_items_fetched_total", "source" => source)
                    .increment(items.len() as u64);
                items
            }
            Ok(Err(e)) => {
                warn!(target: "ingest", error = ?e, source, "provider error");
                counter!("trends_provider_errors_total", "source" => source).increment(1);
                Vec::new()
            }
            Err(_) => {
                warn!(target: "ingest", source, "provider timed out");
                counter!("trends_provider_errors_total", "source" => source).increment(1);
                Vec::new()
            }
        }
    }

    fn count_rejected(reason: &'static str, n: usize) {
        if n > 0 {
            counter!("trends_items_rejected_total", "reason" => reason).increment(n as u64);
        }
    }

    async fn ranked_items(
        &self,
        p: &dyn SourceProvider,
        tokens: &str,
        limit: usize,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<TrendItem> {
        let source = p.name();
        let months = self.config.ranked_max_age_months;
        let mut items = Vec::new();
        let mut taken: HashSet<String> = HashSet::new();

        // No tokens means nothing can pass the filter; go straight to backfill.
        if !tokens.trim().is_empty() {
            let fetch = self.config.ranked_fetch_limit.min(limit.saturating_mul(3).max(limit));
            let raw = self.call_provider(source, p.search(tokens, fetch), cancel).await;

            let total = raw.len();
            let relevant: Vec<RawItem> = raw
                .into_iter()
                .filter(|it| is_relevant(it, tokens, MatchOptions::loose()))
                .collect();
            Self::count_rejected("irrelevant", total - relevant.len());

            let n_relevant = relevant.len();
            let dated = self
                .resolver
                .resolve_all(relevant, SourceKind::RankedStory, months, now, cancel)
                .await;
            Self::count_rejected("undated", n_relevant - dated.len());

            for (raw, d) in dated.into_iter().take(limit) {
                taken.insert(item_key(&raw));
                items.push(self.ranked_trend_item(raw, d, now));
            }
        }

        if items.len() < limit && !cancel.is_cancelled() {
            let top = self
                .call_provider(source, p.top(self.config.ranked_fetch_limit), cancel)
                .await;
            let candidates: Vec<RawItem> = top
                .into_iter()
                .filter(|it| !taken.contains(&item_key(it)) && has_minimal_relevance(&it.title, tokens))
                .collect();
            let dated = self
                .resolver
                .resolve_all(candidates, SourceKind::RankedStory, months, now, cancel)
                .await;

            let before = items.len();
            for (raw, d) in dated {
                if items.len() >= limit {
                    break;
                }
                items.push(self.ranked_trend_item(raw, d, now));
            }
            let added = items.len() - before;
            counter!("trends_backfill_total").increment(added as u64);
            debug!(target: "ingest", added, "ranked backfill");
        }

        counter!("trends_items_kept_total", "source" => source).increment(items.len() as u64);
        items
    }

    async fn web_items(
        &self,
        p: &dyn SourceProvider,
        tokens: &str,
        limit: usize,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<TrendItem> {
        if tokens.trim().is_empty() {
            debug!(target: "ingest", "no search tokens; skipping web results");
            return Vec::new();
        }
        let source = p.name();
        let raw = self
            .call_provider(source, p.search(tokens, self.config.web_fetch_limit), cancel)
            .await;

        let total = raw.len();
        let relevant: Vec<RawItem> = raw
            .into_iter()
            .filter(|it| is_relevant(it, tokens, MatchOptions::loose()))
            .collect();
        Self::count_rejected("irrelevant", total - relevant.len());

        let n_relevant = relevant.len();
        let dated = self
            .resolver
            .resolve_all(
                relevant,
                SourceKind::WebResult,
                self.config.web_max_age_months,
                now,
                cancel,
            )
            .await;
        Self::count_rejected("undated", n_relevant - dated.len());

        let mut items: Vec<TrendItem> = dated
            .into_iter()
            .map(|(raw, d)| self.web_trend_item(raw, d, tokens))
            .collect();
        engine::sort_web(&mut items);
        items.truncate(limit);

        counter!("trends_items_kept_total", "source" => source).increment(items.len() as u64);
        items
    }

    fn ranked_trend_item(&self, raw: RawItem, d: ResolvedDate, now: DateTime<Utc>) -> TrendItem {
        let score = ranked_story_score(raw.popularity, &raw.title, d.at, now);
        let url = raw
            .meta_str("external_url")
            .or(raw.url.as_deref())
            .map(str::to_string);
        let description = raw
            .text
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("HN Story: {}", raw.title));
        let tags = extract_tech_tags(&raw.title, &description);

        let mut metadata = raw.source_metadata;
        metadata.insert("hn_score".into(), Value::from(score));
        metadata.insert("date_source".into(), Value::from(d.stage.as_str()));

        TrendItem {
            title: raw.title,
            url,
            source: SourceKind::RankedStory,
            score,
            published_at: d.at,
            description,
            tags,
            metadata,
        }
    }

    fn web_trend_item(&self, raw: RawItem, d: ResolvedDate, tokens: &str) -> TrendItem {
        let description = raw.text.clone().unwrap_or_default();
        let score = web_result_score(
            &raw.title,
            raw.url.as_deref().unwrap_or_default(),
            &description,
            tokens,
            &self.weights,
        );
        let tags = extract_tech_tags(&raw.title, &description);

        let mut metadata = raw.source_metadata;
        metadata.insert("date_source".into(), Value::from(d.stage.as_str()));

        TrendItem {
            title: raw.title,
            url: raw.url,
            source: SourceKind::WebResult,
            score,
            published_at: d.at,
            description,
            tags,
            metadata,
        }
    }
}
