// src/config/providers.rs
use std::env;

pub const DEFAULT_BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
pub const DEFAULT_HN_SEARCH_URL: &str = "https://hn.algolia.com/api/v1/search";
pub const DEFAULT_HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

/// Provider endpoints and credentials, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// `None` disables the web-result source.
    pub brave_api_key: Option<String>,
    pub brave_search_url: String,
    pub hn_search_url: String,
    pub hn_api_base: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            brave_search_url: DEFAULT_BRAVE_SEARCH_URL.to_string(),
            hn_search_url: DEFAULT_HN_SEARCH_URL.to_string(),
            hn_api_base: DEFAULT_HN_API_BASE.to_string(),
        }
    }
}

impl ProviderSettings {
    /// `BRAVE_API_KEY`, `BRAVE_SEARCH_URL`, `HN_SEARCH_URL`, `HN_API_BASE`.
    /// Empty values count as unset.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            brave_api_key: non_empty("BRAVE_API_KEY"),
            brave_search_url: non_empty("BRAVE_SEARCH_URL").unwrap_or(d.brave_search_url),
            hn_search_url: non_empty("HN_SEARCH_URL").unwrap_or(d.hn_search_url),
            hn_api_base: non_empty("HN_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(d.hn_api_base),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_values_override_defaults() {
        env::set_var("BRAVE_API_KEY", "  ");
        env::set_var("HN_API_BASE", "http://127.0.0.1:9/v0/");
        env::remove_var("BRAVE_SEARCH_URL");
        env::remove_var("HN_SEARCH_URL");

        let s = ProviderSettings::from_env();
        assert_eq!(s.brave_api_key, None);
        assert_eq!(s.hn_api_base, "http://127.0.0.1:9/v0");
        assert_eq!(s.brave_search_url, DEFAULT_BRAVE_SEARCH_URL);

        env::remove_var("BRAVE_API_KEY");
        env::remove_var("HN_API_BASE");
    }
}
