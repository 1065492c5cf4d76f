//! trendscout command-line entrypoint.
//! Loads `.env` and pipeline config, wires the HTTP providers, runs one trend
//! query and prints the ranked list as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trendscout::metrics::Metrics;
use trendscout::{PipelineConfig, ProviderSettings, TrendPipeline};

#[derive(Debug, Parser)]
#[command(name = "trendscout", version, about = "Rank recent tech stories and web results for a query")]
struct Cli {
    /// Free-form query; `@name.json` references are expanded from the data dir.
    query: String,

    /// Max items per source.
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    /// Skip the ranked-story source (Hacker News).
    #[arg(long)]
    no_ranked: bool,

    /// Skip the web-result source (Brave Search).
    #[arg(long)]
    no_web: bool,

    /// Pipeline config (TOML). Defaults to $TRENDS_CONFIG_PATH or config/trends.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr after the run.
    #[arg(long)]
    metrics: bool,
}

/// Compact logs by default, JSON lines with LOG_FORMAT=json.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendscout=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let metrics = if cli.metrics {
        Some(Metrics::install()?)
    } else {
        None
    };

    let config = match &cli.config {
        Some(p) => PipelineConfig::load_from(p)?,
        None => PipelineConfig::load_default()?,
    };
    let settings = ProviderSettings::from_env();
    let pipeline = TrendPipeline::from_settings(config, &settings)?;

    let items = pipeline
        .get_trends(&cli.query, cli.limit, !cli.no_ranked, !cli.no_web)
        .await;

    let out = serde_json::to_string_pretty(&items).context("serializing trend items")?;
    println!("{out}");

    if let Some(m) = metrics {
        eprintln!("{}", m.render());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "trendscout failed");
            ExitCode::FAILURE
        }
    }
}
