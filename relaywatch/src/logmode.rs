//! `--log`: headless monitor that writes one tracing line per feed change.

use anyhow::Result;
use relayfeed::{ConnectionState, Feed, FeedConfig, MetricsSnapshot, PingGrade};
use tracing::{info, warn};

use crate::ui::util::human;

pub async fn run(config: FeedConfig) -> Result<()> {
    let mut feed = Feed::new();
    feed.subscribe(log_change);
    feed.start(config)?;
    tokio::signal::ctrl_c().await?;
    feed.stop();
    info!("stopped");
    Ok(())
}

fn log_change(state: ConnectionState, snap: Option<&MetricsSnapshot>) {
    match (state, snap) {
        (ConnectionState::Online, Some(s)) => info!(
            %state,
            ping_ms = s.ping_ms,
            grade = s.ping_ms.map(|ms| PingGrade::from_ms(ms).label()),
            players = s.players.total,
            playing = s.players.playing,
            cpu_pct = format_args!("{:.1}", s.cpu.system_load_pct),
            memory = %format!("{}/{}", human(s.memory.used_bytes), human(s.memory.total_bytes)),
            uptime_ms = s.uptime_ms,
            "snapshot"
        ),
        (ConnectionState::Offline | ConnectionState::Error, _) => warn!(%state, "feed down"),
        _ => info!(%state, "feed state"),
    }
}
