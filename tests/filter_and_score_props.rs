// tests/filter_and_score_props.rs
use chrono::{Duration, Utc};
use trendscout::analyze::{ranked_story_score, web_result_score};
use trendscout::engine::combine;
use trendscout::relevance::{is_relevant, MatchOptions};
use trendscout::source_weights::DomainWeights;
use trendscout::{RawItem, SourceKind, TrendItem};

fn corpus() -> Vec<RawItem> {
    vec![
        RawItem::new("Kubernetes operators explained"),
        RawItem::new("Hyperscalers and the datacenter boom"),
        RawItem::new("Building agents with tokio").with_text("an agent framework"),
        RawItem::new("Show HN: wasm").with_url("https://github.com/acme/webassembly-runtime"),
        RawItem::new("Postgres 18 released"),
        RawItem::new(""),
        RawItem::new("C++ modules in practice"),
    ]
}

const QUERIES: &[&str] = &[
    "kubernetes",
    "operator",
    "scalers",
    "agent",
    "webassembly",
    "postgresql",
    "rust programming",
    "",
    "c++",
];

#[test]
fn loosening_never_removes_matches() {
    let loosened = [
        MatchOptions {
            allow_plural: false,
            allow_substring: true,
        },
        MatchOptions {
            allow_plural: true,
            allow_substring: false,
        },
        MatchOptions::loose(),
    ];
    for item in corpus() {
        for q in QUERIES {
            if is_relevant(&item, q, MatchOptions::strict()) {
                for opts in loosened {
                    assert!(
                        is_relevant(&item, q, opts),
                        "{opts:?} lost a strict match for {q:?} on {:?}",
                        item.title
                    );
                }
            }
        }
    }
}

#[test]
fn scores_stay_in_range_for_odd_inputs() {
    let now = Utc::now();
    let weights = DomainWeights::default_seed();
    for pop in [None, Some(-50.0), Some(0.0), Some(f64::NAN), Some(1e12)] {
        for age in [Duration::zero(), Duration::days(400), Duration::hours(-5)] {
            let s = ranked_story_score(pop, "A title with several long words", now - age, now);
            assert!((1..=100).contains(&s), "pop={pop:?} age={age:?} -> {s}");
        }
    }
    for (title, url, desc, tokens) in [
        ("", "", "", ""),
        ("x", "not a url", "", "x"),
        ("rust rust rust rust", "https://stackoverflow.com/", "rust", "rust rust rust rust"),
        ("Docker", "https://docs.docker.com/", "docker", "docker"),
    ] {
        let s = web_result_score(title, url, desc, tokens, &weights);
        assert!((1..=100).contains(&s), "{title:?} -> {s}");
    }
}

fn item(title: &str, source: SourceKind, score: u8, days_ago: i64) -> TrendItem {
    TrendItem {
        title: title.to_string(),
        url: Some(format!("https://example.com/{}", title.replace(' ', "-"))),
        source,
        score,
        published_at: Utc::now() - Duration::days(days_ago),
        description: String::new(),
        tags: Default::default(),
        metadata: Default::default(),
    }
}

#[test]
fn combine_is_grouped_and_idempotent() {
    let ranked = vec![
        item("alpha story", SourceKind::RankedStory, 20, 1),
        item("bravo story", SourceKind::RankedStory, 90, 2),
        item("charlie story", SourceKind::RankedStory, 55, 3),
    ];
    let web = vec![
        item("delta result", SourceKind::WebResult, 99, 5),
        item("echo result", SourceKind::WebResult, 40, 1),
        item("foxtrot result", SourceKind::WebResult, 99, 2),
    ];

    let once = combine(ranked, web);
    let last_ranked = once
        .iter()
        .rposition(|i| i.source == SourceKind::RankedStory)
        .unwrap();
    let first_web = once
        .iter()
        .position(|i| i.source == SourceKind::WebResult)
        .unwrap();
    assert!(last_ranked < first_web);

    let titles: Vec<_> = once.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "bravo story",
            "charlie story",
            "alpha story",
            "foxtrot result",
            "delta result",
            "echo result"
        ]
    );

    let (r, w): (Vec<_>, Vec<_>) = once
        .iter()
        .cloned()
        .partition(|i| i.source == SourceKind::RankedStory);
    assert_eq!(combine(r, w), once);
}
