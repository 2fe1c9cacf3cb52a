//! RES panel: right-hand column.  Shows whatever the notification arbiter
//! decided: a validation message, the digits being typed, the upcoming-song
//! hint, or (by default) the reservation list.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use karaoke_proto::protocol::{Notification, PlaybackStatus, PlayerState, ValidationKind};

use crate::{
    component::Component,
    theme::{
        style_border, style_muted, style_secondary, style_selected, C_ERROR, C_HINT, C_PLAYING,
        C_PRIMARY, C_SUCCESS, C_TYPED,
    },
};

pub struct ReservationPanel;

impl ReservationPanel {
    pub fn new() -> Self {
        Self
    }
}

impl Component for ReservationPanel {
    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &PlayerState) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style_border())
            .title(Span::styled(" RES ", style_secondary()));
        let body = Paragraph::new(panel_lines(state))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(body, area);
    }

    fn min_height(&self) -> u16 {
        4
    }
}

pub fn panel_lines(state: &PlayerState) -> Vec<Line<'static>> {
    match &state.notification {
        Notification::ValidationMessage { text, kind } => {
            let color = match kind {
                ValidationKind::Success => C_SUCCESS,
                ValidationKind::Error => C_ERROR,
            };
            vec![Line::from(Span::styled(
                text.clone(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))]
        }
        Notification::TypedDigits { text } => vec![
            Line::from(Span::styled("Song number", style_secondary())),
            Line::from(Span::styled(
                format!("{}_", text),
                Style::default().fg(C_TYPED).add_modifier(Modifier::BOLD),
            )),
        ],
        Notification::UpcomingSongHint { title } => vec![Line::from(Span::styled(
            title.clone(),
            Style::default().fg(C_HINT),
        ))],
        Notification::Idle => queue_lines(state),
    }
}

fn queue_lines(state: &PlayerState) -> Vec<Line<'static>> {
    let (label, color) = if state.autoplay {
        ("ON", C_PLAYING)
    } else {
        ("OFF", C_ERROR)
    };
    let mut lines = vec![Line::from(vec![
        Span::styled("Autoplay: ", style_secondary()),
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ])];

    if state.queue.is_empty() {
        lines.push(Line::from(Span::styled("No reservations", style_muted())));
        return lines;
    }

    let held = state.status == PlaybackStatus::ReservedHold;
    for (i, song) in state.queue.iter().enumerate() {
        let selected = held && state.queue_cursor == Some(i);
        let style = if selected {
            style_selected()
        } else {
            Style::default().fg(C_PRIMARY)
        };
        let marker = if selected { "›" } else { " " };
        lines.push(Line::from(Span::styled(
            format!("{}{:>2}. {}", marker, i + 1, song),
            style,
        )));
    }
    lines
}
