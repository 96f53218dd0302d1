//! Payload normalizer: maps a loosely shaped stats JSON onto `MetricsSnapshot`.
//!
//! Every field is looked up through the ordered alias lists in `FieldAliases`;
//! the first path that yields a number (or string list) wins. Missing or
//! malformed values fall back to defaults, so this never panics and every
//! numeric output is finite and non-negative.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::{Alias, FieldAliases, NominalTotals};
use crate::types::{Cpu, Disk, Frames, Memory, MetricsSnapshot, NetworkRate, Players};

/// Local observation context for one payload.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// Monotonic instant the payload was received; used for rate derivation.
    pub at: Instant,
    /// Wall-clock stamp stored on the snapshot.
    pub received_at: DateTime<Utc>,
    /// Measured round trip, used for `ping_ms` when the payload has none.
    pub rtt: Option<Duration>,
}

impl Sample {
    pub fn now(rtt: Option<Duration>) -> Self {
        Self {
            at: tokio::time::Instant::now().into_std(),
            received_at: Utc::now(),
            rtt,
        }
    }
}

/// Previous cumulative network counters, for differencing into a rate.
#[derive(Debug, Clone, Default)]
pub struct CounterBaseline {
    prev: Option<(u64, u64, Instant)>,
}

impl CounterBaseline {
    pub fn reset(&mut self) {
        self.prev = None;
    }

    /// Rate since the previous sample; 0 when there is no baseline, no elapsed
    /// time, or a counter went backwards.
    pub fn rate(&mut self, up: u64, down: u64, at: Instant) -> NetworkRate {
        let rate = match self.prev {
            Some((pu, pd, pat)) if at > pat => {
                let dt = at.duration_since(pat).as_secs_f64();
                NetworkRate {
                    upload_bps: up.saturating_sub(pu) as f64 / dt,
                    download_bps: down.saturating_sub(pd) as f64 / dt,
                }
            }
            _ => NetworkRate::default(),
        };
        self.prev = Some((up, down, at));
        NetworkRate {
            upload_bps: non_negative(rate.upload_bps),
            download_bps: non_negative(rate.download_bps),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    aliases: FieldAliases,
    nominal: NominalTotals,
}

impl Normalizer {
    pub fn new(aliases: FieldAliases, nominal: NominalTotals) -> Self {
        Self { aliases, nominal }
    }

    /// Stateless normalization. Network counters, if present, yield a zero
    /// rate since there is no prior baseline.
    pub fn normalize(&self, raw: &Value) -> MetricsSnapshot {
        let mut baseline = CounterBaseline::default();
        self.normalize_sample(raw, &Sample::now(None), &mut baseline)
    }

    /// Normalize one received payload, deriving the network rate against
    /// `baseline` (updated in place) and falling back to the measured RTT for ping.
    pub fn normalize_sample(
        &self,
        raw: &Value,
        sample: &Sample,
        baseline: &mut CounterBaseline,
    ) -> MetricsSnapshot {
        let a = &self.aliases;
        let mut snap = MetricsSnapshot::empty(sample.received_at);

        snap.ping_ms = first_number(raw, &a.ping)
            .filter(|v| *v >= 0.0)
            .map(to_u64)
            .or_else(|| sample.rtt.map(|d| d.as_millis().min(u64::MAX as u128) as u64));
        snap.uptime_ms = first_number(raw, &a.uptime).map(to_u64).unwrap_or(0);

        snap.players = self.players(raw);
        snap.memory = self.memory(raw);
        snap.cpu = Cpu {
            system_load_pct: first_number(raw, &a.cpu_system).map(load_pct).unwrap_or(0.0),
            process_load_pct: first_number(raw, &a.cpu_process).map(load_pct).unwrap_or(0.0),
            cores: first_number(raw, &a.cpu_cores)
                .filter(|v| *v >= 1.0)
                .map(|v| v.round().min(u32::MAX as f64) as u32),
        };
        snap.disk = self.disk(raw);
        snap.frames = self.frames(raw);

        let up = first_number(raw, &a.net_up);
        let down = first_number(raw, &a.net_down);
        if up.is_some() || down.is_some() {
            let up = up.map(to_u64).unwrap_or(0);
            let down = down.map(to_u64).unwrap_or(0);
            snap.network = Some(baseline.rate(up, down, sample.at));
        }

        snap.sources = first_strings(raw, &a.sources);
        snap.filters = first_strings(raw, &a.filters);
        snap
    }

    fn players(&self, raw: &Value) -> Players {
        let a = &self.aliases;
        let total = first_number(raw, &a.players_total).map(to_u64).unwrap_or(0);
        let playing = first_number(raw, &a.players_playing).map(to_u64).unwrap_or(0);
        let idle = first_number(raw, &a.players_idle)
            .map(to_u64)
            .unwrap_or_else(|| total.saturating_sub(playing));
        Players {
            total,
            playing,
            idle,
        }
    }

    fn memory(&self, raw: &Value) -> Memory {
        let a = &self.aliases;
        let mut used = first_number(raw, &a.memory_used).map(to_u64);
        let mut total = first_number(raw, &a.memory_total).map(to_u64);
        let free = first_number(raw, &a.memory_free).map(to_u64);

        if used.is_none() && total.is_none() {
            if let Some(pct) = first_number(raw, &a.memory_percent).map(load_pct) {
                let t = self.nominal.memory_bytes;
                total = Some(t);
                used = Some(of_pct(t, pct));
            }
        }

        let used = used.unwrap_or(0);
        let total = total.unwrap_or_else(|| used.saturating_add(free.unwrap_or(0)));
        Memory {
            used_bytes: used,
            total_bytes: total,
            free_bytes: free.unwrap_or_else(|| total.saturating_sub(used)),
            cached_bytes: first_number(raw, &a.memory_cached).map(to_u64).unwrap_or(0),
        }
    }

    fn disk(&self, raw: &Value) -> Option<Disk> {
        let a = &self.aliases;
        let used = first_number(raw, &a.disk_used).map(to_u64);
        let total = first_number(raw, &a.disk_total).map(to_u64);
        match (used, total) {
            (None, None) => first_number(raw, &a.disk_percent).map(|raw_pct| {
                let t = self.nominal.disk_bytes;
                Disk {
                    used_bytes: of_pct(t, load_pct(raw_pct)),
                    total_bytes: t,
                }
            }),
            (used, total) => {
                let used = used.unwrap_or(0);
                Some(Disk {
                    used_bytes: used,
                    total_bytes: total.unwrap_or(used),
                })
            }
        }
    }

    fn frames(&self, raw: &Value) -> Option<Frames> {
        let a = &self.aliases;
        let sent = first_number(raw, &a.frames_sent);
        let nulled = first_number(raw, &a.frames_nulled);
        let deficit = first_number(raw, &a.frames_deficit);
        let expected = first_number(raw, &a.frames_expected);
        if sent.is_none() && nulled.is_none() && deficit.is_none() && expected.is_none() {
            return None;
        }
        let sent = sent.map(to_u64).unwrap_or(0);
        let nulled = nulled.map(to_u64).unwrap_or(0);
        let deficit = deficit.map(to_u64).unwrap_or(0);
        // deficit = expected - (sent + nulled), so recover expected when absent
        let expected = expected
            .map(to_u64)
            .unwrap_or_else(|| sent.saturating_add(nulled).saturating_add(deficit));
        Some(Frames {
            sent,
            nulled,
            deficit,
            expected,
        })
    }
}

/// Walk a dotted path through nested objects.
fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(root, |node, seg| node.as_object()?.get(seg))
}

fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn first_number(raw: &Value, aliases: &[Alias]) -> Option<f64> {
    aliases.iter().find_map(|alias| {
        let n = as_number(lookup(raw, &alias.path)?)?;
        let scaled = n * alias.unit.factor();
        scaled.is_finite().then_some(scaled)
    })
}

/// First alias that resolves to an array; strings are taken as-is, objects
/// contribute their `name`. Duplicates are dropped, order kept.
fn first_strings(raw: &Value, aliases: &[Alias]) -> Vec<String> {
    let Some(items) = aliases
        .iter()
        .find_map(|alias| lookup(raw, &alias.path)?.as_array())
    else {
        return Vec::new();
    };
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let name = match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("name").and_then(Value::as_str),
            _ => None,
        };
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            if !out.iter().any(|x| x == name) {
                out.push(name.to_string());
            }
        }
    }
    out
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

fn to_u64(v: f64) -> u64 {
    // float-to-int casts saturate at u64::MAX
    non_negative(v).round() as u64
}

/// Fractions (<= 1) are scaled to percent; larger values already are percent.
pub fn load_pct(raw: f64) -> f64 {
    let v = non_negative(raw);
    let pct = if v <= 1.0 { v * 100.0 } else { v };
    pct.clamp(0.0, 100.0)
}

fn of_pct(total: u64, pct: f64) -> u64 {
    to_u64(total as f64 * pct / 100.0)
}
