//! Feed configuration: endpoints, credentials, timing, and the alias tables the
//! normalizer reads payload fields through. Supplied by the caller; the core
//! never reads files or environment itself.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    #[default]
    Poll,
    Stream,
}

impl FeedMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedMode::Poll => "poll",
            FeedMode::Stream => "stream",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    pub mode: FeedMode,
    /// Stats URL for polling, WebSocket URL for streaming.
    pub endpoint: String,
    /// Liveness probe (`GET <base>/version`) checked before polling starts and
    /// while offline. Polling only.
    pub probe_endpoint: Option<String>,
    /// Sent verbatim as the `Authorization` header.
    pub password: Option<String>,
    /// Extra PEM CA trusted for https/wss.
    pub tls_ca: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub failure_threshold: u32,
    pub probe_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub aliases: FieldAliases,
    pub nominal: NominalTotals,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mode: FeedMode::Poll,
            endpoint: String::new(),
            probe_endpoint: None,
            password: None,
            tls_ca: None,
            poll_interval_ms: 3000,
            request_timeout_ms: 10_000,
            failure_threshold: 5,
            probe_interval_ms: 30_000,
            reconnect_delay_ms: 5000,
            max_reconnect_attempts: 1000,
            aliases: FieldAliases::default(),
            nominal: NominalTotals::default(),
        }
    }
}

impl FeedConfig {
    /// Infer mode and endpoints from one URL. `ws://`/`wss://` streams; an
    /// `http(s)://` URL with an empty path is treated as a relay base and gets
    /// `<base>/stats` plus the `<base>/version` probe, any other path is polled
    /// as-is.
    pub fn from_url(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        let url = parse_url(raw)?;
        let mut cfg = FeedConfig::default();
        match url.scheme() {
            "ws" | "wss" => {
                cfg.mode = FeedMode::Stream;
                cfg.endpoint = raw.to_string();
            }
            "http" | "https" => {
                cfg.mode = FeedMode::Poll;
                if url.path() == "/" || url.path().is_empty() {
                    let base = raw.trim_end_matches('/');
                    cfg.endpoint = format!("{base}/stats");
                    cfg.probe_endpoint = Some(format!("{base}/version"));
                } else {
                    cfg.endpoint = raw.to_string();
                }
            }
            other => {
                return Err(ConfigError::InvalidUrl {
                    url: raw.to_string(),
                    reason: format!("unsupported scheme '{other}'"),
                })
            }
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        let url = parse_url(&self.endpoint)?;
        let scheme_ok = match self.mode {
            FeedMode::Poll => matches!(url.scheme(), "http" | "https"),
            FeedMode::Stream => matches!(url.scheme(), "ws" | "wss"),
        };
        if !scheme_ok {
            return Err(ConfigError::SchemeMismatch {
                scheme: url.scheme().to_string(),
                mode: self.mode.as_str(),
            });
        }
        if let Some(probe) = self.probe_endpoint.as_deref() {
            parse_url(probe)?;
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Zero("request_timeout_ms"));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::Zero("failure_threshold"));
        }
        if self.probe_interval_ms == 0 {
            return Err(ConfigError::Zero("probe_interval_ms"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// How a matched raw number converts to the canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Plain,
    Kilobytes,
    Megabytes,
    Gigabytes,
    /// Seconds to milliseconds (uptime).
    Seconds,
}

impl Unit {
    pub fn factor(self) -> f64 {
        match self {
            Unit::Plain => 1.0,
            Unit::Kilobytes => 1024.0,
            Unit::Megabytes => 1_048_576.0,
            Unit::Gigabytes => GIB as f64,
            Unit::Seconds => 1000.0,
        }
    }
}

/// Dotted path into the payload plus the unit the value is expressed in.
/// Deserializes from either `"memory.used"` or `{ "path": "memory.usedMB", "unit": "megabytes" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "AliasRepr")]
pub struct Alias {
    pub path: String,
    pub unit: Unit,
}

impl Alias {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            unit: Unit::Plain,
        }
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AliasRepr {
    Path(String),
    Full {
        path: String,
        #[serde(default)]
        unit: Unit,
    },
}

impl From<AliasRepr> for Alias {
    fn from(r: AliasRepr) -> Self {
        match r {
            AliasRepr::Path(path) => Alias::new(path),
            AliasRepr::Full { path, unit } => Alias { path, unit },
        }
    }
}

/// Ordered alias lists per canonical field; the first path that yields a
/// usable value wins. New server shapes are added here, not in code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldAliases {
    pub ping: Vec<Alias>,
    pub uptime: Vec<Alias>,
    pub players_total: Vec<Alias>,
    pub players_playing: Vec<Alias>,
    pub players_idle: Vec<Alias>,
    pub memory_used: Vec<Alias>,
    pub memory_total: Vec<Alias>,
    pub memory_free: Vec<Alias>,
    pub memory_cached: Vec<Alias>,
    /// Flat usage percentage, expanded against `NominalTotals::memory_bytes`.
    pub memory_percent: Vec<Alias>,
    pub cpu_system: Vec<Alias>,
    pub cpu_process: Vec<Alias>,
    pub cpu_cores: Vec<Alias>,
    pub disk_used: Vec<Alias>,
    pub disk_total: Vec<Alias>,
    /// Flat usage percentage, expanded against `NominalTotals::disk_bytes`.
    pub disk_percent: Vec<Alias>,
    /// Cumulative bytes sent.
    pub net_up: Vec<Alias>,
    /// Cumulative bytes received.
    pub net_down: Vec<Alias>,
    pub frames_sent: Vec<Alias>,
    pub frames_nulled: Vec<Alias>,
    pub frames_deficit: Vec<Alias>,
    pub frames_expected: Vec<Alias>,
    pub sources: Vec<Alias>,
    pub filters: Vec<Alias>,
}

fn plain(paths: &[&str]) -> Vec<Alias> {
    paths.iter().map(|p| Alias::new(*p)).collect()
}

fn with_unit(mut base: Vec<Alias>, extra: &[(&str, Unit)]) -> Vec<Alias> {
    base.extend(extra.iter().map(|(p, u)| Alias::new(*p).unit(*u)));
    base
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            ping: plain(&["ping", "pingMs", "latency", "latencyMs"]),
            uptime: with_unit(
                plain(&["uptime", "uptimeMs", "statistics.uptime", "stats.uptime"]),
                &[("uptimeSeconds", Unit::Seconds)],
            ),
            players_total: plain(&[
                "players",
                "players.total",
                "playerCount",
                "statistics.players",
                "stats.players",
            ]),
            players_playing: plain(&[
                "playingPlayers",
                "players.playing",
                "playing",
                "statistics.playingPlayers",
                "stats.playingPlayers",
            ]),
            players_idle: plain(&["idlePlayers", "players.idle", "statistics.idlePlayers"]),
            memory_used: with_unit(
                plain(&[
                    "memory.used",
                    "memory.usedBytes",
                    "statistics.memory.used",
                    "stats.memory.used",
                ]),
                &[("memory.usedMB", Unit::Megabytes), ("memoryUsedMB", Unit::Megabytes)],
            ),
            memory_total: with_unit(
                plain(&[
                    "memory.total",
                    "memory.totalBytes",
                    "memory.allocated",
                    "statistics.memory.allocated",
                    "stats.memory.allocated",
                ]),
                &[("memory.totalMB", Unit::Megabytes), ("memoryTotalMB", Unit::Megabytes)],
            ),
            memory_free: with_unit(
                plain(&[
                    "memory.free",
                    "memory.freeBytes",
                    "statistics.memory.free",
                    "stats.memory.free",
                ]),
                &[("memory.freeMB", Unit::Megabytes)],
            ),
            memory_cached: with_unit(
                plain(&[
                    "memory.cached",
                    "memory.reservable",
                    "statistics.memory.reservable",
                    "stats.memory.reservable",
                ]),
                &[("memory.cachedMB", Unit::Megabytes)],
            ),
            memory_percent: plain(&["memory.percent", "memory.usage", "memoryPercent", "memory"]),
            cpu_system: plain(&[
                "cpu.systemLoad",
                "cpu.system",
                "statistics.cpu.systemLoad",
                "stats.cpu.systemLoad",
                "cpu.usage",
                "cpu",
            ]),
            cpu_process: plain(&[
                "cpu.lavalinkLoad",
                "cpu.processLoad",
                "cpu.process",
                "statistics.cpu.lavalinkLoad",
                "stats.cpu.lavalinkLoad",
            ]),
            cpu_cores: plain(&["cpu.cores", "statistics.cpu.cores", "stats.cpu.cores", "cores"]),
            disk_used: with_unit(
                plain(&["disk.used", "disk.usedBytes"]),
                &[("disk.usedGB", Unit::Gigabytes), ("disk.usedMB", Unit::Megabytes)],
            ),
            disk_total: with_unit(
                plain(&["disk.total", "disk.totalBytes"]),
                &[("disk.totalGB", Unit::Gigabytes), ("disk.totalMB", Unit::Megabytes)],
            ),
            disk_percent: plain(&["disk.percent", "disk.usage", "diskPercent", "disk"]),
            net_up: plain(&[
                "network.sent",
                "network.tx",
                "network.bytesSent",
                "network.transmitted",
                "network.upload",
            ]),
            net_down: plain(&[
                "network.received",
                "network.rx",
                "network.bytesReceived",
                "network.download",
            ]),
            frames_sent: plain(&["frameStats.sent", "frames.sent", "statistics.frameStats.sent"]),
            frames_nulled: plain(&[
                "frameStats.nulled",
                "frames.nulled",
                "statistics.frameStats.nulled",
            ]),
            frames_deficit: plain(&[
                "frameStats.deficit",
                "frames.deficit",
                "statistics.frameStats.deficit",
            ]),
            frames_expected: plain(&[
                "frameStats.expected",
                "frames.expected",
                "statistics.frameStats.expected",
            ]),
            sources: plain(&["sources", "sourceManagers", "info.sourceManagers"]),
            filters: plain(&["filters", "info.filters"]),
        }
    }
}

/// Totals assumed when a payload only carries a usage percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NominalTotals {
    pub memory_bytes: u64,
    pub disk_bytes: u64,
}

impl Default for NominalTotals {
    fn default() -> Self {
        Self {
            memory_bytes: 8 * GIB,
            disk_bytes: 100 * GIB,
        }
    }
}
