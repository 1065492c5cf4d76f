//! # Domain Weights
//!
//! Ordered table of well-known domains and the additive score bonus a web
//! result hosted on them receives.
//!
//! - Loads from JSON config (`config/domain_weights.json`).
//! - Host matching is case-insensitive and ignores a leading `www.`.
//! - The FIRST entry whose domain the host equals or is a subdomain of wins;
//!   if the URL does not parse, a plain substring check on the raw URL is used.
//! - Includes a built-in `default_seed()` used when no config is found.

use serde::Deserialize;
use std::{fs, path::Path};
use tracing::warn;

/// One row of the domain table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DomainBonus {
    pub domain: String,
    pub bonus: u8,
}

/// Domain bonus table, loaded from JSON or defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainWeights {
    /// Bonus when no entry matches.
    #[serde(default)]
    pub default_bonus: u8,
    /// Entries in priority order.
    #[serde(default)]
    pub domains: Vec<DomainBonus>,
}

impl Default for DomainWeights {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl DomainWeights {
    /// Load the table from a JSON file.
    /// Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!(target: "ingest", error = %e, path = %path.display(), "invalid domain weights; using seed");
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    /// Bonus for the host of `url`.
    ///
    /// Steps:
    /// 1. Parse the URL and normalize the host.
    /// 2. First entry the host equals or ends with `.<domain>`.
    /// 3. Unparseable URL: first entry contained in the lower-cased raw string.
    /// 4. Default bonus.
    pub fn bonus_for(&self, url: &str) -> u8 {
        match host_of(url) {
            Some(host) => self
                .domains
                .iter()
                .find(|d| {
                    let dom = normalize_domain(&d.domain);
                    host == dom || host.ends_with(&format!(".{dom}"))
                })
                .map(|d| d.bonus)
                .unwrap_or(self.default_bonus),
            None => {
                let raw = url.to_ascii_lowercase();
                self.domains
                    .iter()
                    .find(|d| !d.domain.is_empty() && raw.contains(&normalize_domain(&d.domain)))
                    .map(|d| d.bonus)
                    .unwrap_or(self.default_bonus)
            }
        }
    }

    /// Built-in table of developer-facing sites.
    pub fn default_seed() -> Self {
        let domains = [
            ("stackoverflow.com", 25),
            ("github.com", 20),
            ("medium.com", 15),
            ("dev.to", 15),
            ("geeksforgeeks.org", 15),
            ("cppreference.com", 25),
            ("mozilla.org", 20),
            ("w3schools.com", 10),
            ("wikipedia.org", 15),
            ("hackernews.com", 20),
            ("techcrunch.com", 15),
            ("arstechnica.com", 20),
        ]
        .into_iter()
        .map(|(domain, bonus)| DomainBonus {
            domain: domain.to_string(),
            bonus,
        })
        .collect();

        Self {
            default_bonus: 0,
            domains,
        }
    }
}

fn normalize_domain(d: &str) -> String {
    let d = d.trim().to_ascii_lowercase();
    d.strip_prefix("www.").map(str::to_string).unwrap_or(d)
}

fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    parsed.host_str().map(normalize_domain)
}
