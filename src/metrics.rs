use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    /// Fails if another recorder is already installed.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    /// Prometheus exposition text of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// One-time description registration for the default path.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_all);
}

fn describe_all() {
    describe_counter!(
        "trends_items_fetched_total",
        "Raw items returned by providers, per source."
    );
    describe_counter!(
        "trends_items_kept_total",
        "Items materialized as trend items, per source."
    );
    describe_counter!(
        "trends_items_rejected_total",
        "Items dropped, by reason (irrelevant, undated, duplicate)."
    );
    describe_counter!(
        "trends_provider_errors_total",
        "Provider fetch/parse errors and timeouts, per source."
    );
    describe_counter!(
        "trends_date_resolved_total",
        "Publication dates accepted, by resolution stage."
    );
    describe_counter!(
        "trends_backfill_total",
        "Items added from the unfiltered top batch."
    );
    describe_histogram!(
        "trends_provider_parse_ms",
        Unit::Milliseconds,
        "Provider response parse time, per source."
    );
    describe_histogram!(
        "trends_pipeline_ms",
        Unit::Milliseconds,
        "Wall time of one get_trends call."
    );
}
