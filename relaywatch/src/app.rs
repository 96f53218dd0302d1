//! App state and main loop: input handling, draining feed updates, updating history, and drawing.

use std::{collections::VecDeque, io, time::Duration};

use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Color,
    Terminal,
};
use relayfeed::{ConnectionState, Feed, FeedConfig, MetricsSnapshot};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    time::sleep,
};

use crate::history::{push_capped, RateHistory};
use crate::ui::{
    cpu::{draw_cpu_gauges, draw_cpu_graph},
    disk::draw_disk,
    header::draw_header,
    mem::draw_mem,
    net::draw_net_spark,
    players::draw_players,
    sources::draw_sources,
};

const HISTORY: usize = 600;

type Update = (ConnectionState, Option<MetricsSnapshot>);

pub struct App {
    endpoint: String,
    state: ConnectionState,
    // Latest snapshot + histories
    last: Option<MetricsSnapshot>,
    cpu_hist: VecDeque<u64>,
    rx_hist: RateHistory,
    tx_hist: RateHistory,

    should_quit: bool,
}

impl App {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            state: ConnectionState::Offline,
            last: None,
            cpu_hist: VecDeque::with_capacity(HISTORY),
            rx_hist: RateHistory::new(HISTORY),
            tx_hist: RateHistory::new(HISTORY),
            should_quit: false,
        }
    }

    pub async fn run(&mut self, config: FeedConfig) -> Result<()> {
        let mut feed = Feed::new();
        let (tx, mut updates) = mpsc::unbounded_channel::<Update>();
        feed.subscribe(move |state, snap| {
            let _ = tx.send((state, snap.cloned()));
        });
        feed.start(config)?;

        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        // Main loop
        let res = self.event_loop(&mut terminal, &feed, &mut updates).await;

        // Teardown
        feed.stop();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        feed: &Feed,
        updates: &mut UnboundedReceiver<Update>,
    ) -> Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(10))? {
                if let Event::Key(k) = event::read()? {
                    match k.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                            self.should_quit = true
                        }
                        KeyCode::Char('r') | KeyCode::Char('R') => feed.refresh_now(),
                        _ => {}
                    }
                }
            }
            if self.should_quit {
                break;
            }

            while let Ok((state, snap)) = updates.try_recv() {
                self.apply(state, snap);
            }

            // Draw
            terminal.draw(|f| self.draw(f))?;

            // Tick rate; uptime is recomputed on every redraw
            sleep(Duration::from_millis(500)).await;
        }

        Ok(())
    }

    fn apply(&mut self, state: ConnectionState, snap: Option<MetricsSnapshot>) {
        self.state = state;
        let fresh = match (&snap, &self.last) {
            (Some(new), Some(old)) => new.received_at != old.received_at,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if let (true, Some(m)) = (fresh, snap.as_ref()) {
            // CPU history (0..100)
            let v = m.cpu.system_load_pct.clamp(0.0, 100.0).round() as u64;
            push_capped(&mut self.cpu_hist, v, HISTORY);

            // NET: bytes/s -> KB/s
            if let Some(net) = m.network {
                self.rx_hist.push((net.download_bps / 1024.0).round() as u64);
                self.tx_hist.push((net.upload_bps / 1024.0).round() as u64);
            }
        }
        self.last = snap;
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let area = f.area();
        let m = self.last.as_ref();

        // Root rows: header, cpu, memory + disk, bottom
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),   // header
                Constraint::Ratio(1, 3), // cpu graph + gauges
                Constraint::Length(3),   // memory (left) + disk (right)
                Constraint::Min(10),     // players + net (left), sources/filters (right)
            ])
            .split(area);

        draw_header(f, rows[0], &self.endpoint, self.state, m, Utc::now());

        let top_lr = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
            .split(rows[1]);
        draw_cpu_graph(f, top_lr[0], &self.cpu_hist, m);
        draw_cpu_gauges(f, top_lr[1], m);

        let mid_lr = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[2]);
        draw_mem(f, mid_lr[0], m);
        draw_disk(f, mid_lr[1], m);

        let bottom_lr = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
            .split(rows[3]);
        let left_stack = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // players + frames
                Constraint::Length(5), // download
                Constraint::Length(5), // upload
            ])
            .split(bottom_lr[0]);

        draw_players(f, left_stack[0], m);
        draw_net_spark(f, left_stack[1], "Download", &self.rx_hist, Color::Green);
        draw_net_spark(f, left_stack[2], "Upload", &self.tx_hist, Color::Blue);
        draw_sources(f, bottom_lr[1], m);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayfeed::types::NetworkRate;

    fn snap(load: f64, at_ms: i64) -> MetricsSnapshot {
        let at = chrono::DateTime::from_timestamp_millis(at_ms).unwrap();
        let mut s = MetricsSnapshot::empty(at);
        s.cpu.system_load_pct = load;
        s.network = Some(NetworkRate {
            upload_bps: 2048.0,
            download_bps: 10_240.0,
        });
        s
    }

    #[test]
    fn histories_grow_once_per_snapshot() {
        let mut app = App::new("http://relay/stats");
        app.apply(ConnectionState::Connecting, None);
        app.apply(ConnectionState::Online, Some(snap(42.4, 1_000)));
        // same snapshot re-delivered with a state change
        app.apply(ConnectionState::Offline, Some(snap(42.4, 1_000)));
        app.apply(ConnectionState::Online, Some(snap(55.0, 4_000)));

        assert_eq!(app.cpu_hist, VecDeque::from(vec![42, 55]));
        assert_eq!(app.rx_hist.tail(10), vec![10, 10]);
        assert_eq!(app.tx_hist.latest(), 2);
        assert_eq!(app.state, ConnectionState::Online);
    }

    #[test]
    fn refresh_clears_snapshot_but_keeps_history() {
        let mut app = App::new("ws://relay/ws");
        app.apply(ConnectionState::Online, Some(snap(10.0, 1_000)));
        app.apply(ConnectionState::Connecting, None);
        assert!(app.last.is_none());
        assert_eq!(app.cpu_hist.len(), 1);
    }

    #[test]
    fn draws_without_data() {
        use ratatui::backend::TestBackend;
        let mut app = App::new("http://relay/stats");
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        app.apply(ConnectionState::Online, Some(snap(30.0, 1_000)));
        terminal.draw(|f| app.draw(f)).unwrap();
    }
}
