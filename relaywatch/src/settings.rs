//! Builds the `FeedConfig` the monitor runs with: optional JSON file, then the
//! resolved profile URL, then `RELAYWATCH_*` environment overrides, then flags.

use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use relayfeed::FeedConfig;

const ENV_PREFIX: &str = "RELAYWATCH_";

pub fn load_file(path: &Path) -> Result<FeedConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

/// Point `base` at `url`, keeping every tunable already set on it.
pub fn with_url(mut base: FeedConfig, url: &str) -> Result<FeedConfig> {
    let derived = FeedConfig::from_url(url)?;
    base.mode = derived.mode;
    base.endpoint = derived.endpoint;
    base.probe_endpoint = derived.probe_endpoint;
    Ok(base)
}

pub fn apply_env_overrides(cfg: &mut FeedConfig) {
    apply_overrides(cfg, |key| env::var(format!("{ENV_PREFIX}{key}")).ok());
}

fn apply_overrides<F: Fn(&str) -> Option<String>>(cfg: &mut FeedConfig, var: F) {
    if let Some(val) = var("PASSWORD") {
        cfg.password = Some(val);
    }
    if let Some(val) = var("POLL_INTERVAL_MS") {
        if let Ok(ms) = val.parse() {
            cfg.poll_interval_ms = ms;
        }
    }
    if let Some(val) = var("REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = val.parse() {
            cfg.request_timeout_ms = ms;
        }
    }
    if let Some(val) = var("FAILURE_THRESHOLD") {
        if let Ok(n) = val.parse() {
            cfg.failure_threshold = n;
        }
    }
    if let Some(val) = var("RECONNECT_DELAY_MS") {
        if let Ok(ms) = val.parse() {
            cfg.reconnect_delay_ms = ms;
        }
    }
    if let Some(val) = var("MAX_RECONNECTS") {
        if let Ok(n) = val.parse() {
            cfg.max_reconnect_attempts = n;
        }
    }
}
