// tests/pipeline_scenarios.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;
use trendscout::{
    DateResolver, PipelineConfig, PublishedHint, RawItem, SourceKind, SourceProvider,
    TrendPipeline,
};

#[derive(Default)]
struct StubSource {
    kind: Option<SourceKind>,
    search: Vec<RawItem>,
    top: Vec<RawItem>,
    fail: bool,
    delay: Option<Duration>,
}

#[async_trait]
impl SourceProvider for StubSource {
    async fn search(&self, _query: &str, count: usize) -> Result<Vec<RawItem>> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(anyhow!("upstream 503"));
        }
        Ok(self.search.iter().take(count).cloned().collect())
    }

    async fn top(&self, count: usize) -> Result<Vec<RawItem>> {
        Ok(self.top.iter().take(count).cloned().collect())
    }

    fn kind(&self) -> SourceKind {
        self.kind.unwrap_or(SourceKind::RankedStory)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

fn story(id: u32, title: &str, points: f64, hours_ago: i64) -> RawItem {
    let ts = (Utc::now() - ChronoDuration::hours(hours_ago)).timestamp();
    RawItem::new(title)
        .with_url(format!("https://news.example/{id}"))
        .with_popularity(points)
        .with_hint(PublishedHint::Timestamp(ts))
        .with_meta("hn_id", id.to_string())
        .with_meta("external_url", format!("https://news.example/{id}"))
}

fn web_hit(title: &str, url: &str, desc: &str) -> RawItem {
    RawItem::new(title).with_url(url).with_text(desc)
}

fn pipeline() -> TrendPipeline {
    TrendPipeline::new(PipelineConfig::default(), DateResolver::offline())
}

#[tokio::test]
async fn only_relevant_ranked_story_survives() {
    let ranked = StubSource {
        search: vec![
            story(1, "New Rust compiler release", 400.0, 2),
            story(2, "Gardening tips", 900.0, 1),
        ],
        ..Default::default()
    };
    let p = pipeline().with_ranked(Arc::new(ranked));

    let out = p.get_trends("rust programming", 5, true, true).await;
    assert_eq!(out.len(), 1);
    let it = &out[0];
    assert_eq!(it.title, "New Rust compiler release");
    assert_eq!(it.source, SourceKind::RankedStory);
    // 0.5*80 + 0.4*30 + 0.1*~99.2
    assert_eq!(it.score, 61);
    assert_eq!(it.description, "HN Story: New Rust compiler release");
    assert_eq!(it.metadata["date_source"], "native");
    assert_eq!(it.metadata["hn_score"], 61);
}

#[tokio::test]
async fn backfill_adds_only_loosely_matching_top_stories() {
    let mut top: Vec<RawItem> = (0..48)
        .map(|i| story(100 + i, &format!("Story number {i} about cooking"), 10.0, 3))
        .collect();
    top.insert(7, story(200, "Docker Desktop 5.0 released", 120.0, 5));
    top.insert(30, story(201, "Why we left docker-compose", 80.0, 8));
    assert_eq!(top.len(), 50);

    let ranked = StubSource {
        search: vec![story(1, "Gardening tips", 900.0, 1)],
        top,
        ..Default::default()
    };
    let p = pipeline().with_ranked(Arc::new(ranked));

    let out = p.get_trends("docker", 5, true, false).await;
    let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Docker Desktop 5.0 released"));
    assert!(titles.contains(&"Why we left docker-compose"));
}

#[tokio::test]
async fn backfill_skips_undated_and_stale_stories() {
    let no_ts = RawItem::new("Docker without a timestamp").with_meta("hn_id", "9");
    let ranked = StubSource {
        top: vec![
            no_ts,
            story(10, "Docker from last year", 50.0, 24 * 400),
            story(11, "Docker today", 50.0, 1),
        ],
        ..Default::default()
    };
    let p = pipeline().with_ranked(Arc::new(ranked));
    let out = p.get_trends("docker", 5, true, false).await;
    let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Docker today"]);
}

#[tokio::test]
async fn stale_url_date_is_rejected_and_recent_one_kept() {
    let recent = (Utc::now() - ChronoDuration::days(7)).format("%Y/%m/%d").to_string();
    let web = StubSource {
        kind: Some(SourceKind::WebResult),
        search: vec![
            web_hit(
                "Docker tips",
                "https://blog.example.com/2020/01/10/docker-tips/",
                "old docker tricks",
            ),
            web_hit(
                "Docker networking deep dive",
                &format!("https://blog.example.com/{recent}/docker-net/"),
                "docker bridge networks",
            ),
        ],
        ..Default::default()
    };
    let p = pipeline().with_web(Arc::new(web));

    let out = p.get_trends("docker", 5, false, true).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].title, "Docker networking deep dive");
    assert_eq!(out[0].metadata["date_source"], "url");
    assert!(out[0].tags.contains("docker"));
}

#[tokio::test]
async fn ranked_items_precede_web_items() {
    let ranked = StubSource {
        search: vec![
            story(1, "Kubernetes operator patterns", 5.0, 30),
            story(2, "Kubernetes 1.34 released", 600.0, 2),
        ],
        ..Default::default()
    };
    let web = StubSource {
        kind: Some(SourceKind::WebResult),
        search: vec![
            web_hit("Kubernetes docs", "https://kubernetes.example/docs", "kubernetes")
                .with_hint(PublishedHint::Text("1 day ago".into())),
            web_hit(
                "Kubernetes on stackoverflow",
                "https://stackoverflow.com/q/1",
                "kubernetes kubernetes",
            )
            .with_hint(PublishedHint::Text("3 days ago".into())),
        ],
        ..Default::default()
    };
    let p = pipeline()
        .with_ranked(Arc::new(ranked))
        .with_web(Arc::new(web));

    let out = p.get_trends("kubernetes", 5, true, true).await;
    assert_eq!(out.len(), 4);
    let last_ranked = out
        .iter()
        .rposition(|i| i.source == SourceKind::RankedStory)
        .unwrap();
    let first_web = out
        .iter()
        .position(|i| i.source == SourceKind::WebResult)
        .unwrap();
    assert!(last_ranked < first_web);
    assert!(out[0].score >= out[1].score);
    assert_eq!(out[2].title, "Kubernetes on stackoverflow");
    assert!(out.iter().all(|i| (1..=100).contains(&i.score)));
}

#[tokio::test]
async fn failing_source_does_not_affect_the_other() {
    let ranked = StubSource {
        fail: true,
        ..Default::default()
    };
    let web = StubSource {
        kind: Some(SourceKind::WebResult),
        search: vec![web_hit("Rust 2024 edition guide", "https://doc.example/rust", "rust")
            .with_hint(PublishedHint::Text("2 days ago".into()))],
        ..Default::default()
    };
    let p = pipeline()
        .with_ranked(Arc::new(ranked))
        .with_web(Arc::new(web));

    let out = p.get_trends("rust", 5, true, true).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].source, SourceKind::WebResult);
}

#[tokio::test]
async fn disabled_or_missing_sources_yield_nothing() {
    let ranked = StubSource {
        search: vec![story(1, "Rust news", 100.0, 1)],
        ..Default::default()
    };
    let p = pipeline().with_ranked(Arc::new(ranked));
    assert!(p.get_trends("rust", 5, false, true).await.is_empty());
    assert!(p.get_trends("rust", 0, true, true).await.is_empty());
}

#[tokio::test]
async fn cancellation_returns_completed_source() {
    let ranked = StubSource {
        search: vec![story(1, "Rust async book", 100.0, 1)],
        delay: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let web = StubSource {
        kind: Some(SourceKind::WebResult),
        search: vec![web_hit("Rust async book", "https://web.example/rust-async", "rust")
            .with_hint(PublishedHint::Text("1 day ago".into()))],
        ..Default::default()
    };
    let p = pipeline()
        .with_ranked(Arc::new(ranked))
        .with_web(Arc::new(web));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let out = tokio::time::timeout(
        Duration::from_secs(5),
        p.get_trends_with_cancel("rust", 5, true, true, cancel),
    )
    .await
    .expect("pipeline should stop on cancellation");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].source, SourceKind::WebResult);
}

#[tokio::test]
async fn request_deadline_behaves_like_cancellation() {
    let ranked = StubSource {
        search: vec![story(1, "Rust async book", 100.0, 1)],
        delay: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let cfg = PipelineConfig {
        request_timeout_secs: Some(1),
        ..PipelineConfig::default()
    };
    let p = TrendPipeline::new(cfg, DateResolver::offline()).with_ranked(Arc::new(ranked));

    let out = tokio::time::timeout(Duration::from_secs(5), p.get_trends("rust", 5, true, true))
        .await
        .expect("deadline should cut the slow source");
    assert!(out.is_empty());
}

#[tokio::test]
async fn file_reference_terms_drive_the_search() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("stack.json"),
        r#"{"Context": "observability", "Tools": [{"Name": "prometheus"}]}"#,
    )
    .unwrap();

    let ranked = StubSource {
        search: vec![
            story(1, "Prometheus 3.0 is out", 200.0, 1),
            story(2, "Gardening tips", 900.0, 1),
        ],
        ..Default::default()
    };
    let cfg = PipelineConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..PipelineConfig::default()
    };
    let p = TrendPipeline::new(cfg, DateResolver::offline()).with_ranked(Arc::new(ranked));

    let out = p.get_trends("what is new for @stack.json", 5, true, false).await;
    let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Prometheus 3.0 is out"]);
}
