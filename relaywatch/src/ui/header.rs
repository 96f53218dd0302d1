//! Top header: endpoint, connection state, ping grade and a locally ticking uptime.

use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders},
};
use relayfeed::{ConnectionState, MetricsSnapshot, PingGrade};

use crate::ui::util::{format_uptime, grade_color, state_color};

pub fn draw_header(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    endpoint: &str,
    state: ConnectionState,
    m: Option<&MetricsSnapshot>,
    now: DateTime<Utc>,
) {
    let mut spans = vec![
        Span::raw(format!("relaywatch | {endpoint} | ")),
        Span::styled(
            state.as_str().to_ascii_uppercase(),
            Style::default().fg(state_color(state)).add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(mm) = m {
        if let Some(ms) = mm.ping_ms {
            let grade = PingGrade::from_ms(ms);
            spans.push(Span::raw(" | ping "));
            spans.push(Span::styled(
                format!("{ms}ms ({})", grade.label()),
                Style::default().fg(grade_color(grade)),
            ));
        }
        // keep counting between updates while online
        let uptime = if state == ConnectionState::Online { mm.uptime_at(now) } else { mm.uptime_ms };
        spans.push(Span::raw(format!(" | up {}", format_uptime(uptime))));
    }
    spans.push(Span::raw("  (q quit, r refresh)"));
    f.render_widget(Block::default().title(Line::from(spans)).borders(Borders::BOTTOM), area);
}
