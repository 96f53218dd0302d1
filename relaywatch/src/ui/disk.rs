//! Disk gauge; relays that do not report disk get "n/a".

use ratatui::{
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Gauge, Paragraph},
};
use relayfeed::MetricsSnapshot;

use crate::ui::util::{gauge_pct, human, pct_color};

pub fn draw_disk(f: &mut ratatui::Frame<'_>, area: Rect, m: Option<&MetricsSnapshot>) {
    let block = Block::default().borders(Borders::ALL).title("Disk");
    let Some(disk) = m.and_then(|mm| mm.disk) else {
        f.render_widget(Paragraph::new("n/a").block(block), area);
        return;
    };

    let pct = disk.usage_pct();
    let g = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(pct_color(pct)))
        .percent(gauge_pct(pct))
        .label(format!(
            "{} / {}  ({:.0}%)",
            human(disk.used_bytes),
            human(disk.total_bytes),
            pct
        ));
    f.render_widget(g, area);
}
