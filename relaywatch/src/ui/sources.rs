//! Source managers and filters the relay advertises.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, List, ListItem},
};
use relayfeed::MetricsSnapshot;

pub fn draw_sources(f: &mut ratatui::Frame<'_>, area: Rect, m: Option<&MetricsSnapshot>) {
    let halves = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let (sources, filters) = match m {
        Some(mm) => (mm.sources.as_slice(), mm.filters.as_slice()),
        None => (&[][..], &[][..]),
    };
    draw_list(f, halves[0], "Sources", sources);
    draw_list(f, halves[1], "Filters", filters);
}

fn draw_list(f: &mut ratatui::Frame<'_>, area: Rect, title: &str, names: &[String]) {
    let items: Vec<ListItem> = if names.is_empty() {
        vec![ListItem::new("n/a")]
    } else {
        names.iter().map(|n| ListItem::new(n.as_str())).collect()
    };
    let title = format!("{title} ({})", names.len());
    f.render_widget(List::new(items).block(Block::default().borders(Borders::ALL).title(title)), area);
}
