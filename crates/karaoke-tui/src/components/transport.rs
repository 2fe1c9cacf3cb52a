//! Transport ring and seek bar, shown while a song is loaded.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use karaoke_proto::protocol::{PlayerState, TransportAction};

use crate::{
    component::Component,
    theme::{style_muted, C_BG, C_FOCUS, C_PRIMARY},
    widgets::progress_bar::draw_progress,
};

pub struct TransportBar;

impl TransportBar {
    pub fn new() -> Self {
        Self
    }
}

impl Component for TransportBar {
    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &PlayerState) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);
        if let Some(line) = ring_line(state) {
            frame.render_widget(Paragraph::new(line).centered(), rows[0]);
        }
        draw_progress(frame, rows[1], state.progress, state.duration_secs);
    }

    fn min_height(&self) -> u16 {
        2
    }
}

/// The four buttons, focused one highlighted.  `None` while the ring is hidden.
pub fn ring_line(state: &PlayerState) -> Option<Line<'static>> {
    if !state.focus.visible {
        return None;
    }
    let queue_pending = !state.queue.is_empty();
    let mut spans = Vec::new();
    for (i, action) in TransportAction::RING.iter().enumerate() {
        let label = format!(" {} ", action.label(queue_pending));
        let style = if state.focus.index == Some(i) {
            Style::default()
                .fg(C_BG)
                .bg(if state.focus.navigation_mode { C_FOCUS } else { C_PRIMARY })
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_PRIMARY)
        };
        if i > 0 {
            spans.push(Span::styled(" │ ", style_muted()));
        }
        spans.push(Span::styled(label, style));
    }
    Some(Line::from(spans))
}
