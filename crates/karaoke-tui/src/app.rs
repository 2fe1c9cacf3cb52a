//! App: the kiosk's terminal surface.
//!
//! - A blocking task reads terminal events; a second task turns core
//!   broadcasts into fresh state snapshots.  Both feed one `AppMessage` channel.
//! - The loop draws a frame, then awaits the next message.
//! - Keys are mapped to `KioskKey`s and forwarded to the core; the app itself
//!   keeps no kiosk state beyond the last snapshot.

use std::io;
use std::sync::Arc;

use ratatui::crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::Block,
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use karaoke_proto::protocol::PlayerState;
use karaoke_proto::state::StateManager;

use crate::{
    action::{map_key, KeyIntent},
    component::Component,
    components::{
        header::Header, reservation_panel::ReservationPanel, stage::Stage, transport::TransportBar,
    },
    core::CoreEvent,
    theme::C_BG,
    widgets::status_bar,
    BroadcastMessage,
};

const PANEL_WIDTH: u16 = 32;

enum AppMessage {
    Event(Event),
    StateUpdated(PlayerState),
}

pub struct App {
    state: PlayerState,
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<CoreEvent>,
    header: Header,
    stage: Stage,
    panel: ReservationPanel,
    transport: TransportBar,
    should_quit: bool,
}

impl App {
    pub fn new(event_tx: mpsc::Sender<CoreEvent>, state_manager: Arc<StateManager>) -> Self {
        Self {
            state: PlayerState::default(),
            state_manager,
            event_tx,
            header: Header::new(),
            stage: Stage::new(),
            panel: ReservationPanel::new(),
            transport: TransportBar::new(),
            should_quit: false,
        }
    }

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        debug!("app: terminal ready, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);

        let key_tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            while let Ok(ev) = event::read() {
                if key_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                    break;
                }
            }
        });

        let state_tx = tx;
        let state_manager = self.state_manager.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(BroadcastMessage::StateUpdated) => {
                        let state = state_manager.get_state().await;
                        if state_tx.send(AppMessage::StateUpdated(state)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("app: broadcast lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.state = self.state_manager.get_state().await;
        let result = self.event_loop(&mut terminal, &mut rx).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        rx: &mut mpsc::Receiver<AppMessage>,
    ) -> anyhow::Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            let Some(msg) = rx.recv().await else {
                break;
            };
            self.handle_message(msg).await;
            // coalesce bursts of state updates into one frame
            while let Ok(msg) = rx.try_recv() {
                self.handle_message(msg).await;
            }
            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(Event::Key(key)) => match map_key(key) {
                Some(KeyIntent::Kiosk(k)) => {
                    if self.event_tx.send(CoreEvent::Key(k)).await.is_err() {
                        warn!("app: core loop is gone");
                        self.should_quit = true;
                    }
                }
                Some(KeyIntent::Quit) => {
                    info!("app: quit requested");
                    self.should_quit = true;
                }
                None => {}
            },
            AppMessage::Event(_) => {}
            AppMessage::StateUpdated(state) => {
                if state.rev >= self.state.rev {
                    self.state = state;
                }
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let transport_h = if self.state.now_playing.is_some() {
            self.transport.min_height()
        } else {
            0
        };
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(self.header.min_height()),
                Constraint::Min(self.panel.min_height()),
                Constraint::Length(transport_h),
                Constraint::Length(1),
            ])
            .split(area);

        self.header.draw(frame, outer[0], &self.state);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(PANEL_WIDTH)])
            .split(outer[1]);
        self.stage.draw(frame, body[0], &self.state);
        self.panel.draw(frame, body[1], &self.state);

        if transport_h > 0 {
            self.transport.draw(frame, outer[2], &self.state);
        }
        status_bar::draw_keys_bar(frame, outer[3], self.state.status);
    }
}
