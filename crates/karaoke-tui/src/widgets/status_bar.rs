//! Bottom rows: separator and key help.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use karaoke_proto::protocol::PlaybackStatus;

use crate::theme::{C_MUTED, C_RESERVED, C_SECONDARY, C_SEPARATOR};

pub fn draw_separator(frame: &mut Frame, area: Rect) {
    let line = Line::from(Span::styled(
        "─".repeat(area.width as usize),
        Style::default().fg(C_SEPARATOR),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

pub fn keys_line(status: PlaybackStatus) -> Line<'static> {
    let (mode, color, keys) = match status {
        PlaybackStatus::ReservedHold => (
            "RESERVED",
            C_RESERVED,
            " ↑↓ select  Enter play selected  R resume  Esc stop  q quit",
        ),
        PlaybackStatus::Idle => (
            "KARAOKE",
            C_SECONDARY,
            " 0-9 song number  Enter play  S play next  A autoplay  q quit",
        ),
        _ => (
            "KARAOKE",
            C_SECONDARY,
            " 0-9 reserve  Space pause  ←→ controls  S next/stop  R reserved list  A autoplay  Esc stop  q quit",
        ),
    };
    Line::from(vec![
        Span::styled(
            format!(" {} ", mode),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys, Style::default().fg(C_MUTED)),
    ])
}

pub fn draw_keys_bar(frame: &mut Frame, area: Rect, status: PlaybackStatus) {
    frame.render_widget(Paragraph::new(keys_line(status)), area);
}
