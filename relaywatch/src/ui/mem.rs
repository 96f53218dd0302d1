//! Memory gauge.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Gauge},
};
use relayfeed::MetricsSnapshot;

use crate::ui::util::{gauge_pct, human};

pub fn draw_mem(f: &mut ratatui::Frame<'_>, area: Rect, m: Option<&MetricsSnapshot>) {
    let (label, pct) = match m {
        Some(mm) => {
            let mem = &mm.memory;
            let mut label = format!("{} / {}", human(mem.used_bytes), human(mem.total_bytes));
            if mem.cached_bytes > 0 {
                label.push_str(&format!("  (reservable {})", human(mem.cached_bytes)));
            }
            (label, gauge_pct(mem.usage_pct()))
        }
        None => ("n/a".to_string(), 0),
    };

    let g = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Memory"))
        .gauge_style(Style::default().fg(Color::Magenta))
        .percent(pct)
        .label(label);
    f.render_widget(g, area);
}
