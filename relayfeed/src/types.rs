//! Canonical metrics model produced by the normalizer, plus connection state.
//! Every leaf is populated; only `disk`, `network` and `frames` are optional.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Online,
    /// Failing, but retries are still scheduled.
    Offline,
    /// Gave up; only a manual refresh restarts the feed.
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Online => "online",
            ConnectionState::Offline => "offline",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Players {
    pub total: u64,
    pub playing: u64,
    pub idle: u64,
}

impl Players {
    pub fn playing_pct(&self) -> f64 {
        ratio_pct(self.playing, self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Memory {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub cached_bytes: u64,
}

impl Memory {
    pub fn usage_pct(&self) -> f64 {
        ratio_pct(self.used_bytes, self.total_bytes)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Cpu {
    /// 0..=100
    pub system_load_pct: f64,
    /// 0..=100
    pub process_load_pct: f64,
    pub cores: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Disk {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl Disk {
    pub fn usage_pct(&self) -> f64 {
        ratio_pct(self.used_bytes, self.total_bytes)
    }
}

/// Bytes per second, derived by differencing cumulative counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NetworkRate {
    pub upload_bps: f64,
    pub download_bps: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Frames {
    pub sent: u64,
    pub nulled: u64,
    pub deficit: u64,
    pub expected: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub ping_ms: Option<u64>,
    pub uptime_ms: u64,
    pub players: Players,
    pub memory: Memory,
    pub cpu: Cpu,
    pub disk: Option<Disk>,
    pub network: Option<NetworkRate>,
    pub frames: Option<Frames>,
    pub sources: Vec<String>,
    pub filters: Vec<String>,
    pub received_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Snapshot with every field at its default, stamped `received_at`.
    pub fn empty(received_at: DateTime<Utc>) -> Self {
        Self {
            ping_ms: None,
            uptime_ms: 0,
            players: Players::default(),
            memory: Memory::default(),
            cpu: Cpu::default(),
            disk: None,
            network: None,
            frames: None,
            sources: Vec::new(),
            filters: Vec::new(),
            received_at,
        }
    }

    /// Server uptime advanced by the local time elapsed since this snapshot
    /// arrived, so a display clock keeps ticking between updates.
    pub fn uptime_at(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.received_at).num_milliseconds().max(0) as u64;
        self.uptime_ms.saturating_add(elapsed)
    }
}

/// Display grade for a round-trip latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PingGrade {
    Excellent,
    Good,
    Fair,
    Slow,
}

impl PingGrade {
    pub fn from_ms(ms: u64) -> Self {
        match ms {
            0..=99 => PingGrade::Excellent,
            100..=299 => PingGrade::Good,
            300..=499 => PingGrade::Fair,
            _ => PingGrade::Slow,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PingGrade::Excellent => "Excellent",
            PingGrade::Good => "Good",
            PingGrade::Fair => "Fair",
            PingGrade::Slow => "Slow",
        }
    }
}

fn ratio_pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn uptime_ticks_from_received_at() {
        let at = Utc::now();
        let mut s = MetricsSnapshot::empty(at);
        s.uptime_ms = 60_000;
        assert_eq!(s.uptime_at(at), 60_000);
        assert_eq!(s.uptime_at(at + Duration::seconds(3)), 63_000);
        // clock skew backwards never rewinds uptime
        assert_eq!(s.uptime_at(at - Duration::seconds(3)), 60_000);
    }

    #[test]
    fn usage_pct_handles_zero_total() {
        let m = Memory::default();
        assert_eq!(m.usage_pct(), 0.0);
        let d = Disk {
            used_bytes: 25,
            total_bytes: 100,
        };
        assert_eq!(d.usage_pct(), 25.0);
    }

    #[test]
    fn ping_grades() {
        assert_eq!(PingGrade::from_ms(42), PingGrade::Excellent);
        assert_eq!(PingGrade::from_ms(100), PingGrade::Good);
        assert_eq!(PingGrade::from_ms(499), PingGrade::Fair);
        assert_eq!(PingGrade::from_ms(1200), PingGrade::Slow);
    }
}
