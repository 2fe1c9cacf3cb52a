//! Component trait: every panel of the kiosk screen implements it.
//!
//! Panels render straight from the published `PlayerState`; they hold no
//! kiosk state of their own and never send commands.

use karaoke_proto::protocol::PlayerState;
use ratatui::{layout::Rect, Frame};

pub trait Component {
    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &PlayerState);

    /// Rows needed to render meaningfully.
    fn min_height(&self) -> u16 {
        1
    }
}
