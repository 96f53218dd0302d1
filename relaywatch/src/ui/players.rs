//! Players and audio frame stats.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use relayfeed::MetricsSnapshot;

pub fn draw_players(f: &mut ratatui::Frame<'_>, area: Rect, m: Option<&MetricsSnapshot>) {
    let block = Block::default().borders(Borders::ALL).title("Players");
    let Some(mm) = m else {
        f.render_widget(Paragraph::new("waiting for data...").block(block), area);
        return;
    };

    let p = &mm.players;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{}", p.total), bold),
        Span::raw(" total  "),
        Span::styled(format!("{}", p.playing), bold.fg(Color::Green)),
        Span::raw(format!(" playing ({:.0}%)  ", p.playing_pct())),
        Span::styled(format!("{}", p.idle), bold.fg(Color::DarkGray)),
        Span::raw(" idle"),
    ])];

    match mm.frames {
        Some(fr) => {
            let lost = fr.nulled + fr.deficit;
            let loss_pct = if fr.expected > 0 { lost as f64 / fr.expected as f64 * 100.0 } else { 0.0 };
            let color = if loss_pct < 1.0 { Color::Green } else if loss_pct < 5.0 { Color::Yellow } else { Color::Red };
            lines.push(Line::from(format!(
                "frames sent {}  nulled {}  deficit {}  expected {}",
                fr.sent, fr.nulled, fr.deficit, fr.expected
            )));
            lines.push(Line::from(Span::styled(
                format!("frame loss {loss_pct:.2}%"),
                Style::default().fg(color),
            )));
        }
        None => lines.push(Line::from("frames n/a")),
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}
