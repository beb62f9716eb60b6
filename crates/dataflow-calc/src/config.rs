//! Batch configuration.
//!
//! Read from environment variables:
//! - `DATAFLOW_CACHE_DISABLED`: any of `1`, `true`, `yes` turns caching off
//! - `DATAFLOW_CACHE_PATH`: SQLite cache file (default: "dataflow-cache.db")
//! - `DATAFLOW_CACHE_MAX_AGE_DAYS`: eviction horizon in days (default: 90)

use std::time::Duration;

pub const DEFAULT_CACHE_PATH: &str = "dataflow-cache.db";
pub const DEFAULT_MAX_AGE_DAYS: u64 = 90;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcConfig {
    /// Look up and store results in the cache.
    pub cache_enabled: bool,
    pub cache_path: String,
    /// Entries older than this are evicted when the cache is opened.
    pub cache_max_age: Duration,
}

impl Default for CalcConfig {
    fn default() -> Self {
        CalcConfig {
            cache_enabled: true,
            cache_path: DEFAULT_CACHE_PATH.to_string(),
            cache_max_age: Duration::from_secs(DEFAULT_MAX_AGE_DAYS * SECONDS_PER_DAY),
        }
    }
}

impl CalcConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Unparseable
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CalcConfig::default();
        if let Some(disabled) = lookup("DATAFLOW_CACHE_DISABLED") {
            let disabled = matches!(
                disabled.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
            config.cache_enabled = !disabled;
        }
        if let Some(path) = lookup("DATAFLOW_CACHE_PATH").filter(|p| !p.is_empty()) {
            config.cache_path = path;
        }
        match lookup("DATAFLOW_CACHE_MAX_AGE_DAYS").map(|d| d.trim().parse::<u64>()) {
            Some(Ok(days)) => {
                config.cache_max_age = Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY));
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "ignoring invalid DATAFLOW_CACHE_MAX_AGE_DAYS");
            }
            None => {}
        }
        config
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }
}
