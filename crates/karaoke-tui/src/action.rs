//! Kiosk keys: the keyboard surface the state machine understands.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskKey {
    Digit(char),
    Enter,
    /// Stop playback.
    Escape,
    /// Play/pause.
    Space,
    Left,
    Right,
    Up,
    Down,
    /// Play the next reservation, or stop when there is none.
    Advance,
    ToggleReserve,
    ToggleAutoplay,
}

/// What a terminal key press means to the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIntent {
    Kiosk(KioskKey),
    Quit,
}

pub fn map_key(key: KeyEvent) -> Option<KeyIntent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(KeyIntent::Quit),
            _ => None,
        };
    }
    let k = match key.code {
        KeyCode::Char(c) if c.is_ascii_digit() => KioskKey::Digit(c),
        KeyCode::Enter => KioskKey::Enter,
        KeyCode::Esc => KioskKey::Escape,
        KeyCode::Char(' ') => KioskKey::Space,
        KeyCode::Left => KioskKey::Left,
        KeyCode::Right => KioskKey::Right,
        KeyCode::Up => KioskKey::Up,
        KeyCode::Down => KioskKey::Down,
        KeyCode::Char('s') | KeyCode::Char('S') => KioskKey::Advance,
        KeyCode::Char('r') | KeyCode::Char('R') => KioskKey::ToggleReserve,
        KeyCode::Char('a') | KeyCode::Char('A') => KioskKey::ToggleAutoplay,
        KeyCode::Char('q') => return Some(KeyIntent::Quit),
        _ => return None,
    };
    Some(KeyIntent::Kiosk(k))
}
