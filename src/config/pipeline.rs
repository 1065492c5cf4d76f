// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const ENV_CONFIG_PATH: &str = "TRENDS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/trends.toml";
pub const DEFAULT_DOMAIN_WEIGHTS_PATH: &str = "config/domain_weights.json";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; trendscout/0.1)";

/// Tunables threaded through one pipeline. Every field has a default, so a
/// partial TOML file (or none at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound for ranked-story search and the backfill "top" batch.
    pub ranked_fetch_limit: usize,
    /// Web results requested per query.
    pub web_fetch_limit: usize,
    pub ranked_max_age_months: u32,
    pub web_max_age_months: u32,
    /// Per-page timeout of the meta-tag date stage.
    pub fetch_timeout_secs: u64,
    /// Per-call timeout of a provider `search`/`top`.
    pub provider_timeout_secs: u64,
    /// Max concurrent page fetches during date resolution.
    pub date_fan_out: usize,
    /// Overall deadline for one `get_trends` call; partial results on expiry.
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
    /// Root searched for `@name.json` query references.
    pub data_dir: Option<PathBuf>,
    pub domain_weights_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ranked_fetch_limit: 50,
            web_fetch_limit: 20,
            ranked_max_age_months: 2,
            web_max_age_months: 3,
            fetch_timeout_secs: 5,
            provider_timeout_secs: 15,
            date_fan_out: 8,
            request_timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            data_dir: None,
            domain_weights_path: PathBuf::from(DEFAULT_DOMAIN_WEIGHTS_PATH),
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit TOML path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let mut cfg: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        cfg.apply_env_overrides();
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $TRENDS_CONFIG_PATH
    /// 2) config/trends.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        Ok(cfg.sanitized())
    }

    /// `HN_STORIES_LIMIT`, `WEB_SEARCH_LIMIT`, `TRENDS_DATA_DIR`,
    /// `TRENDS_REQUEST_TIMEOUT_SECS`. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<usize>("HN_STORIES_LIMIT") {
            self.ranked_fetch_limit = v;
        }
        if let Some(v) = env_parse::<usize>("WEB_SEARCH_LIMIT") {
            self.web_fetch_limit = v;
        }
        if let Some(v) = env_parse::<u64>("TRENDS_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(v);
        }
        if let Ok(dir) = std::env::var("TRENDS_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
    }

    fn sanitized(mut self) -> Self {
        self.ranked_fetch_limit = self.ranked_fetch_limit.max(1);
        self.web_fetch_limit = self.web_fetch_limit.max(1);
        self.ranked_max_age_months = self.ranked_max_age_months.max(1);
        self.web_max_age_months = self.web_max_age_months.max(1);
        self.fetch_timeout_secs = self.fetch_timeout_secs.max(1);
        self.provider_timeout_secs = self.provider_timeout_secs.max(1);
        self.date_fan_out = self.date_fan_out.max(1);
        if self.user_agent.trim().is_empty() {
            self.user_agent = DEFAULT_USER_AGENT.to_string();
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(target: "ingest", key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    fn clear_env() {
        for k in [
            ENV_CONFIG_PATH,
            "HN_STORIES_LIMIT",
            "WEB_SEARCH_LIMIT",
            "TRENDS_DATA_DIR",
            "TRENDS_REQUEST_TIMEOUT_SECS",
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn partial_toml_keeps_defaults_and_sanitizes() {
        let cfg: PipelineConfig = toml::from_str("date_fan_out = 0\nweb_max_age_months = 6").unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.date_fan_out, 1);
        assert_eq!(cfg.web_max_age_months, 6);
        assert_eq!(cfg.ranked_fetch_limit, 50);
        assert_eq!(cfg.ranked_max_age_months, 2);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        clear_env();

        // No file in the temp CWD: built-in defaults.
        let cfg = PipelineConfig::load_default().unwrap();
        assert_eq!(cfg, PipelineConfig::default());

        // config/trends.toml is picked up.
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join("config/trends.toml"), "web_fetch_limit = 7").unwrap();
        assert_eq!(PipelineConfig::load_default().unwrap().web_fetch_limit, 7);

        // Env path wins; env overrides win over file values.
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "web_fetch_limit = 9\nranked_fetch_limit = 30").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var("HN_STORIES_LIMIT", "12");
        let cfg = PipelineConfig::load_default().unwrap();
        assert_eq!(cfg.web_fetch_limit, 9);
        assert_eq!(cfg.ranked_fetch_limit, 12);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(PipelineConfig::load_default().is_err());

        clear_env();
        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn bad_env_values_are_ignored() {
        clear_env();
        env::set_var("WEB_SEARCH_LIMIT", "lots");
        let mut cfg = PipelineConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.web_fetch_limit, 20);
        clear_env();
    }
}
