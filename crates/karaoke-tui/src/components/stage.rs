//! Stage: the large left area.  Idle instructions when nothing is loaded,
//! the current song otherwise, and the RESERVED overlay while held.

use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use karaoke_proto::protocol::{PlaybackStatus, PlayerState};

use crate::{
    component::Component,
    theme::{style_default, style_muted, style_secondary, C_LOADING, C_PRIMARY, C_RESERVED},
};

pub struct Stage;

impl Stage {
    pub fn new() -> Self {
        Self
    }
}

impl Component for Stage {
    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &PlayerState) {
        let lines = stage_lines(state);
        let [middle] = Layout::vertical([Constraint::Length(lines.len() as u16)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(Paragraph::new(lines).centered(), middle);

        if state.status == PlaybackStatus::ReservedHold {
            draw_reserved_overlay(frame, area);
        }
    }
}

pub fn stage_lines(state: &PlayerState) -> Vec<Line<'static>> {
    match (&state.now_playing, state.status) {
        (None, PlaybackStatus::Loading) => vec![Line::from(Span::styled(
            "Loading…",
            Style::default().fg(C_LOADING),
        ))],
        (None, _) => vec![
            Line::from(Span::styled(
                "Enter a song number to start",
                style_default().add_modifier(Modifier::BOLD),
            )),
            Line::raw(""),
            Line::from(Span::styled("S - Play next song or Stop if none", style_muted())),
            Line::from(Span::styled("Esc - Stop", style_muted())),
        ],
        (Some(np), status) => {
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("Now Playing: ", style_secondary()),
                    Span::styled(
                        np.song.clone(),
                        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(Span::styled(np.title.clone(), style_default())),
            ];
            if status == PlaybackStatus::Loading {
                lines.push(Line::from(Span::styled(
                    "Loading next song…",
                    Style::default().fg(C_LOADING),
                )));
            }
            lines
        }
    }
}

fn draw_reserved_overlay(frame: &mut Frame, area: Rect) {
    let [row] = Layout::vertical([Constraint::Length(3)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(16)])
        .flex(Flex::Center)
        .areas(row);
    frame.render_widget(Clear, cell);
    frame.render_widget(
        Paragraph::new(Span::styled(
            "RESERVED",
            Style::default().fg(C_RESERVED).add_modifier(Modifier::BOLD),
        ))
        .centered()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(C_RESERVED)),
        ),
        cell,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use karaoke_proto::protocol::NowPlaying;

    fn texts(state: &PlayerState) -> Vec<String> {
        stage_lines(state)
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_idle_instructions() {
        let t = texts(&PlayerState::default());
        assert_eq!(t[0], "Enter a song number to start");
        assert!(t.contains(&"Esc - Stop".to_string()));
    }

    #[test]
    fn test_now_playing() {
        let state = PlayerState {
            status: PlaybackStatus::Playing,
            now_playing: Some(NowPlaying {
                song: "500".into(),
                title: "My Way".into(),
            }),
            ..Default::default()
        };
        assert_eq!(texts(&state), vec!["Now Playing: 500", "My Way"]);
    }
}
