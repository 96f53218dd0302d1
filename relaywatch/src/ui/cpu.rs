//! CPU load sparkline + system/process gauges.

use std::collections::VecDeque;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Gauge, Sparkline},
};
use relayfeed::MetricsSnapshot;

use crate::ui::util::{gauge_pct, pct_color};

pub fn draw_cpu_graph(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    hist: &VecDeque<u64>,
    m: Option<&MetricsSnapshot>,
) {
    let title = if let Some(mm) = m { format!("CPU system load (now: {:>5.1}%)", mm.cpu.system_load_pct) } else { "CPU system load".into() };
    let max_points = area.width.saturating_sub(2) as usize;
    let start = hist.len().saturating_sub(max_points);
    let data: Vec<u64> = hist.iter().skip(start).cloned().collect();
    let spark = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(&data)
        .max(100)
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(spark, area);
}

pub fn draw_cpu_gauges(f: &mut ratatui::Frame<'_>, area: Rect, m: Option<&MetricsSnapshot>) {
    let title = match m.and_then(|mm| mm.cpu.cores) {
        Some(n) => format!("CPU ({n} cores)"),
        None => "CPU".into(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    let Some(mm) = m else { return; };
    if inner.height < 2 { return; }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);
    for (slot, (name, pct)) in rows.iter().zip([
        ("system", mm.cpu.system_load_pct),
        ("process", mm.cpu.process_load_pct),
    ]) {
        let g = Gauge::default()
            .gauge_style(Style::default().fg(pct_color(pct)))
            .percent(gauge_pct(pct))
            .label(format!("{name} {pct:.1}%"));
        f.render_widget(g, *slot);
    }
}
