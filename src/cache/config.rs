use crate::detector::config::DetectorConfig;
use serde::Deserialize;
use serde::Serialize;
use std::env;
use std::time::Duration;

const ENV_PREFIX: &str = "RUSTY_SHEET_CACHE_";

/// Limits of a [`TableCache`](crate::TableCache) and the header detector it runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memory budget for all cached tables
    pub max_memory_bytes: usize,
    /// Entries not accessed for this long are evicted
    pub idle_timeout_seconds: u64,
    /// Optional bound on the number of cached tables
    pub max_entries: Option<usize>,
    pub detector: DetectorConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_memory_bytes: 500 * 1024 * 1024,
            idle_timeout_seconds: 300,
            max_entries: None,
            detector: DetectorConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Defaults overridden by `RUSTY_SHEET_CACHE_*` environment variables.
    ///
    /// Recognized: `MAX_MEMORY_BYTES`, `IDLE_TIMEOUT_SECONDS`, `MAX_ENTRIES`,
    /// `HEADER_SCAN_DEPTH`, `HEADER_CONFIDENCE_FLOOR`. Unparseable values are
    /// ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| env::var(format!("{ENV_PREFIX}{name}")).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = parse_var(&lookup, "MAX_MEMORY_BYTES") {
            self.max_memory_bytes = value;
        }
        if let Some(value) = parse_var(&lookup, "IDLE_TIMEOUT_SECONDS") {
            self.idle_timeout_seconds = value;
        }
        if let Some(value) = parse_var::<usize>(&lookup, "MAX_ENTRIES") {
            self.max_entries = (value > 0).then_some(value);
        }
        if let Some(value) = parse_var(&lookup, "HEADER_SCAN_DEPTH") {
            self.detector.scan_depth = value;
        }
        if let Some(value) = parse_var(&lookup, "HEADER_CONFIDENCE_FLOOR") {
            self.detector.confidence_floor = value;
        }
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = %format!("{ENV_PREFIX}{name}"), value = %raw, "ignoring unparseable setting");
            None
        }
    }
}
