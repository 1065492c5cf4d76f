// src/dates.rs
//! Publication-date resolution.
//!
//! An item's date is taken from the first stage that yields one inside the
//! age ceiling:
//! 1. native hint from the adapter (timestamp, ISO/RFC text, "3 days ago");
//! 2. a date-shaped path segment in the URL;
//! 3. article/OpenGraph/Dublin-Core meta tags or `<time>` of the fetched page.
//!
//! Ranked-story items only ever use stage 1. Every network fetch is bounded by
//! a timeout, and batch resolution runs behind a semaphore so at most
//! `fan_out` pages are fetched at once.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ingest::types::{PublishedHint, RawItem, SourceKind};

/// Parsed dates outside [now - 5y, now + 1y] are treated as parser garbage.
const PARSED_SANITY_PAST_DAYS: i64 = 365 * 5;
/// URL-derived dates get a tighter past bound.
const URL_SANITY_PAST_DAYS: i64 = 365 * 3;
const SANITY_FUTURE_DAYS: i64 = 365;

/// Metadata keys some adapters use instead of a typed hint.
const HINT_META_KEYS: &[&str] = &["published", "age", "publication_date"];

pub const META_DATE_SELECTORS: &[&str] = &[
    r#"meta[property="article:published_time"]"#,
    r#"meta[property="article:modified_time"]"#,
    r#"meta[name="date"]"#,
    r#"meta[name="publish-date"]"#,
    r#"meta[name="publication-date"]"#,
    r#"meta[name="pubdate"]"#,
    r#"meta[name="DC.date"]"#,
    r#"meta[name="DC.Date"]"#,
    r#"meta[name="dcterms.created"]"#,
    r#"meta[name="dcterms.modified"]"#,
    r#"meta[property="og:updated_time"]"#,
    r#"meta[name="last-modified"]"#,
    "time[datetime]",
    "time[pubdate]",
];

static META_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    META_DATE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

static URL_DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/(\d{4})/(\d{1,2})/(\d{1,2})/",
        r"/(\d{4})-(\d{1,2})-(\d{1,2})/",
        r"/(\d{4})(\d{2})(\d{2})/",
        r"_(\d{4})(\d{2})(\d{2})_",
        r"-(\d{4})(\d{2})(\d{2})-",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("url date regex"))
    .collect()
});

static RE_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(an?|\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago$")
        .expect("relative age regex")
});
static RE_DIGIT_T: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)T(\d)").expect("iso T regex"));
static RE_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso date regex"));
static RE_MONTH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b")
        .expect("month date regex")
});

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%z"];

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
];

/// Which stage produced a resolved date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStage {
    Native,
    Url,
    Meta,
}

impl DateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateStage::Native => "native",
            DateStage::Url => "url",
            DateStage::Meta => "meta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub at: DateTime<Utc>,
    pub stage: DateStage,
}

fn within(d: DateTime<Utc>, now: DateTime<Utc>, past_days: i64, future_days: i64) -> bool {
    d >= now - Duration::days(past_days) && d <= now + Duration::days(future_days)
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n))
}

fn parse_relative(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match s.to_ascii_lowercase().as_str() {
        "just now" | "today" => return Some(now),
        "yesterday" => return Some(now - Duration::days(1)),
        _ => {}
    }
    let caps = RE_RELATIVE.captures(s)?;
    let n: i64 = match caps[1].to_ascii_lowercase().as_str() {
        "a" | "an" => 1,
        digits => digits.parse().ok()?,
    };
    let unit = match caps[2].to_ascii_lowercase().as_str() {
        "second" => Duration::seconds(1),
        "minute" => Duration::minutes(1),
        "hour" => Duration::hours(1),
        "day" => Duration::days(1),
        "week" => Duration::weeks(1),
        "month" => Duration::days(30),
        _ => Duration::days(365),
    };
    let ago = unit.checked_mul(i32::try_from(n).ok()?)?;
    now.checked_sub_signed(ago)
}

fn parse_structured(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = OffsetDateTime::parse(s, &Rfc2822) {
        return DateTime::from_timestamp(d.unix_timestamp(), 0);
    }

    let cleaned = RE_DIGIT_T.replace_all(s, "$1 $2");
    let cleaned = cleaned.trim_end_matches('Z').trim();

    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(d) = DateTime::parse_from_str(cleaned, fmt) {
            return Some(d.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(n) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return Some(Utc.from_utc_datetime(&n));
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(cleaned, fmt) {
            return midnight_utc(d);
        }
    }
    None
}

/// Look for a recognisable date embedded in longer text ("Posted on March 3, 2025 by ...").
fn parse_fuzzy(s: &str) -> Option<DateTime<Utc>> {
    if let Some(c) = RE_ISO_DATE.captures(s) {
        let d = NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?);
        if let Some(d) = d.and_then(midnight_utc) {
            return Some(d);
        }
    }
    let m = RE_MONTH_DATE.find(s)?;
    let cleaned = m.as_str().replace('.', "").replace(',', "");
    ["%B %d %Y", "%b %d %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
        .and_then(midnight_utc)
}

/// Permissive parser without sanity bounds.
fn parse_permissive(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.len() >= 9 && s.len() <= 13 && s.bytes().all(|b| b.is_ascii_digit()) {
        let v: i64 = s.parse().ok()?;
        let secs = if s.len() == 13 { v / 1000 } else { v };
        return DateTime::from_timestamp(secs, 0);
    }

    parse_relative(s, now)
        .or_else(|| parse_structured(s))
        .or_else(|| parse_fuzzy(s))
}

/// Parse a free-form date string; anything outside [now - 5y, now + 1y] is rejected.
pub fn parse_date_str(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    parse_permissive(raw, now)
        .filter(|d| within(*d, now, PARSED_SANITY_PAST_DAYS, SANITY_FUTURE_DAYS))
}

/// First date-shaped path pattern in `url` that forms a real, plausible date.
pub fn date_from_url(url: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if url.is_empty() {
        return None;
    }
    URL_DATE_PATTERNS.iter().find_map(|re| {
        let c = re.captures(url)?;
        let date = NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)?;
        midnight_utc(date).filter(|d| within(*d, now, URL_SANITY_PAST_DAYS, SANITY_FUTURE_DAYS))
    })
}

/// Probe the meta-tag selectors of an HTML document in order.
pub fn extract_meta_date(html: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let doc = Html::parse_document(html);
    for sel in META_SELECTORS.iter() {
        for el in doc.select(sel) {
            let v = el.value();
            let raw = v
                .attr("content")
                .filter(|s| !s.trim().is_empty())
                .or_else(|| v.attr("datetime").filter(|s| !s.trim().is_empty()))
                .map(str::to_string)
                .or_else(|| {
                    let t: String = el.text().collect();
                    let t = t.trim();
                    (!t.is_empty()).then(|| t.to_string())
                });
            if let Some(d) = raw.and_then(|r| parse_date_str(&r, now)) {
                return Some(d);
            }
        }
    }
    None
}

fn native_stage(item: &RawItem, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match &item.published_hint {
        Some(PublishedHint::Timestamp(ts)) => DateTime::from_timestamp(*ts, 0)
            .filter(|d| within(*d, now, PARSED_SANITY_PAST_DAYS, SANITY_FUTURE_DAYS)),
        Some(PublishedHint::Text(s)) => parse_date_str(s, now),
        None => HINT_META_KEYS
            .iter()
            .filter_map(|k| item.meta_str(k))
            .find_map(|s| parse_date_str(s, now)),
    }
}

fn url_stage(item: &RawItem, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    date_from_url(item.url.as_deref()?, now)
}

type SyncStage = fn(&RawItem, DateTime<Utc>) -> Option<DateTime<Utc>>;

/// Offline stages in priority order; the page fetch runs after these.
const SYNC_STAGES: [(DateStage, SyncStage); 2] =
    [(DateStage::Native, native_stage), (DateStage::Url, url_stage)];

/// Fetches raw HTML for the meta-tag stage.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

/// `reqwest`-backed fetcher with a per-request timeout.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: StdDuration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("failed to build page fetch client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching {url}"))?
            .error_for_status()
            .with_context(|| format!("status for {url}"))?;
        resp.text().await.context("reading page body")
    }
}

/// Oldest instant still inside a `max_age_months` ceiling (30-day months).
/// Saturates at the earliest representable instant.
pub fn cutoff(now: DateTime<Utc>, max_age_months: u32) -> DateTime<Utc> {
    Duration::try_days(30 * i64::from(max_age_months))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Runs the stage chain for single items or bounded batches.
#[derive(Clone)]
pub struct DateResolver {
    fetcher: Option<Arc<dyn PageFetcher>>,
    fetch_timeout: StdDuration,
    fan_out: usize,
}

impl DateResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, fetch_timeout: StdDuration, fan_out: usize) -> Self {
        Self {
            fetcher: Some(fetcher),
            fetch_timeout,
            fan_out: fan_out.max(1),
        }
    }

    /// Resolver without the network stage.
    pub fn offline() -> Self {
        Self {
            fetcher: None,
            fetch_timeout: StdDuration::from_secs(5),
            fan_out: 1,
        }
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    fn accept(
        candidate: DateTime<Utc>,
        stage: DateStage,
        now: DateTime<Utc>,
        oldest: DateTime<Utc>,
    ) -> Option<ResolvedDate> {
        if candidate < oldest {
            debug!(target: "dates", stage = stage.as_str(), %candidate, "date older than age ceiling");
            return None;
        }
        counter!("trends_date_resolved_total", "stage" => stage.as_str()).increment(1);
        // Publication cannot postdate the present; skewed zone-less parses are pinned to now.
        Some(ResolvedDate {
            at: candidate.min(now),
            stage,
        })
    }

    async fn meta_stage(&self, url: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let fetcher = self.fetcher.as_ref()?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return None;
        }
        match tokio::time::timeout(self.fetch_timeout, fetcher.fetch_html(url)).await {
            Ok(Ok(html)) => extract_meta_date(&html, now),
            Ok(Err(e)) => {
                debug!(target: "dates", error = %e, "page fetch failed");
                None
            }
            Err(_) => {
                debug!(target: "dates", %url, "page fetch timed out");
                None
            }
        }
    }

    /// Resolve one item's publication date, or `None` if no stage yields a
    /// date inside the `max_age_months` ceiling.
    pub async fn resolve(
        &self,
        item: &RawItem,
        kind: SourceKind,
        max_age_months: u32,
        now: DateTime<Utc>,
    ) -> Option<ResolvedDate> {
        let oldest = cutoff(now, max_age_months);

        for (stage, run) in SYNC_STAGES {
            if kind == SourceKind::RankedStory && stage != DateStage::Native {
                break;
            }
            if let Some(found) = run(item, now).and_then(|d| Self::accept(d, stage, now, oldest)) {
                return Some(found);
            }
        }
        if kind == SourceKind::RankedStory {
            return None;
        }

        let url = item.url.as_deref()?;
        let d = self.meta_stage(url, now).await?;
        Self::accept(d, DateStage::Meta, now, oldest)
    }

    /// Resolve a batch with at most `fan_out` items in flight. Output keeps input
    /// order and drops unresolved items. On cancellation the items already
    /// resolved are returned and the rest are abandoned.
    pub async fn resolve_all(
        &self,
        items: Vec<RawItem>,
        kind: SourceKind,
        max_age_months: u32,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<(RawItem, ResolvedDate)> {
        let permits = Arc::new(Semaphore::new(self.fan_out));
        let mut set = JoinSet::new();

        for (idx, item) in items.into_iter().enumerate() {
            let permits = permits.clone();
            let resolver = self.clone();
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                let resolved = resolver.resolve(&item, kind, max_age_months, now).await;
                resolved.map(|r| (idx, item, r))
            });
        }

        let mut done = Vec::new();
        let mut cancelled = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => {
                    warn!(target: "dates", pending = set.len(), "date resolution cancelled; keeping completed items");
                    set.abort_all();
                    cancelled = true;
                    continue;
                }
                next = set.join_next() => next,
            };
            let Some(joined) = next else { break };
            match joined {
                Ok(Some(hit)) => done.push(hit),
                Ok(None) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!(target: "dates", error = %e, "date worker failed"),
            }
        }

        done.sort_by_key(|(idx, _, _)| *idx);
        done.into_iter().map(|(_, item, r)| (item, r)).collect()
    }
}
