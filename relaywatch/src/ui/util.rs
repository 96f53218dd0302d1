//! Small UI helpers: human-readable sizes and durations, state colours.

use ratatui::style::Color;
use relayfeed::{ConnectionState, PingGrade};

pub fn human(b: u64) -> String {
    const K: f64 = 1024.0;
    let b = b as f64;
    if b < K { return format!("{b:.0}B"); }
    let kb = b / K;
    if kb < K { return format!("{kb:.1}KB"); }
    let mb = kb / K;
    if mb < K { return format!("{mb:.1}MB"); }
    let gb = mb / K;
    if gb < K { return format!("{gb:.1}GB"); }
    let tb = gb / K;
    format!("{tb:.2}TB")
}

/// `3d 4h 05m 09s`, dropping leading zero units.
pub fn format_uptime(ms: u64) -> String {
    let secs = ms / 1000;
    let (d, h, m, s) = (secs / 86_400, secs / 3600 % 24, secs / 60 % 60, secs % 60);
    if d > 0 {
        format!("{d}d {h}h {m:02}m {s:02}s")
    } else if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}

pub fn state_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Online => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Offline => Color::Red,
        ConnectionState::Error => Color::LightRed,
    }
}

pub fn grade_color(grade: PingGrade) -> Color {
    match grade {
        PingGrade::Excellent => Color::Green,
        PingGrade::Good => Color::LightGreen,
        PingGrade::Fair => Color::Yellow,
        PingGrade::Slow => Color::Red,
    }
}

/// Green / yellow / red by load.
pub fn pct_color(pct: f64) -> Color {
    if pct < 70.0 { Color::Green } else if pct < 90.0 { Color::Yellow } else { Color::Red }
}

pub fn gauge_pct(pct: f64) -> u16 {
    if pct.is_finite() { pct.clamp(0.0, 100.0).round() as u16 } else { 0 }
}
