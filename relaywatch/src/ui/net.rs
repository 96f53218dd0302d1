//! Network sparklines (download/upload) fed from `RateHistory`.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph, Sparkline},
};

use crate::history::RateHistory;

pub fn draw_net_spark(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    label: &str,
    hist: &RateHistory,
    color: Color,
) {
    if hist.is_empty() {
        let block = Block::default().borders(Borders::ALL).title(format!("{label} (KB/s)"));
        f.render_widget(Paragraph::new("n/a").block(block), area);
        return;
    }

    let max_points = area.width.saturating_sub(2) as usize;
    let data = hist.tail(max_points);
    let title = format!(
        "{label} (KB/s) | now: {} | peak: {}",
        hist.latest(),
        hist.peak()
    );
    let spark = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(&data)
        .style(Style::default().fg(color));
    f.render_widget(spark, area);
}
