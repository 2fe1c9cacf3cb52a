//! Header: 2-row top bar.
//!
//! Row 1: status icon and label, now-playing song, mpv health badge.
//! Row 2: separator.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use karaoke_proto::protocol::{MpvHealth, PlaybackStatus, PlayerState};

use crate::{
    component::Component,
    theme::{C_ACCENT, C_BADGE_PENDING, C_LOADING, C_MUTED, C_PLAYING, C_PRIMARY, C_RESERVED, C_SECONDARY},
    widgets::status_bar::draw_separator,
};

pub struct Header;

impl Header {
    pub fn new() -> Self {
        Self
    }
}

impl Component for Header {
    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &PlayerState) {
        if area.height < 2 {
            frame.render_widget(Paragraph::new(build_row1(state)), area);
            return;
        }
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);
        frame.render_widget(Paragraph::new(build_row1(state)), rows[0]);
        draw_separator(frame, rows[1]);
    }

    fn min_height(&self) -> u16 {
        2
    }
}

fn status_icon(status: PlaybackStatus) -> (&'static str, Color) {
    match status {
        PlaybackStatus::Idle => ("■", C_MUTED),
        PlaybackStatus::Loading => ("◔", C_LOADING),
        PlaybackStatus::Playing => ("▶", C_PLAYING),
        PlaybackStatus::Paused => ("⏸", C_LOADING),
        PlaybackStatus::ReservedHold => ("⏸", C_RESERVED),
    }
}

pub fn build_row1(state: &PlayerState) -> Line<'static> {
    let (icon, color) = status_icon(state.status);
    let mut spans = vec![
        Span::raw(" "),
        Span::styled(icon, Style::default().fg(color)),
        Span::raw(" "),
        Span::styled(
            state.status.label(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ];

    if let Some(np) = &state.now_playing {
        spans.push(Span::styled("  Now Playing: ", Style::default().fg(C_SECONDARY)));
        spans.push(Span::styled(
            np.song.clone(),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        ));
        if np.title != format!("Song #{}", np.song) {
            spans.push(Span::styled(format!("  {}", np.title), Style::default().fg(C_SECONDARY)));
        }
    }

    if let Some(label) = state.mpv_health.badge_label() {
        let color = match state.mpv_health {
            MpvHealth::Dead => C_ACCENT,
            _ => C_BADGE_PENDING,
        };
        spans.push(Span::styled(
            format!("  [mpv {}]", label),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use karaoke_proto::protocol::NowPlaying;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_row1_shows_song_and_badge() {
        let state = PlayerState {
            status: PlaybackStatus::Playing,
            now_playing: Some(NowPlaying {
                song: "500".into(),
                title: "My Way".into(),
            }),
            mpv_health: MpvHealth::Dead,
            ..Default::default()
        };
        let t = text(&build_row1(&state));
        assert!(t.contains("PLAYING"));
        assert!(t.contains("Now Playing: 500  My Way"));
        assert!(t.contains("[mpv DEAD]"));
    }

    #[test]
    fn test_row1_idle_and_fallback_title() {
        assert_eq!(text(&build_row1(&PlayerState::default())).trim(), "■ IDLE");

        let state = PlayerState {
            status: PlaybackStatus::Loading,
            now_playing: Some(NowPlaying {
                song: "75".into(),
                title: "Song #75".into(),
            }),
            ..Default::default()
        };
        assert!(text(&build_row1(&state)).ends_with("Now Playing: 75"));
    }
}
