//! PlaybackController: the kiosk state machine.
//!
//! Owns the input buffer, the reservation queue, the notification arbiter and
//! the transport focus ring, and is the only thing that decides what the
//! video engine does.  It never performs I/O: every operation takes the
//! current time and returns the `Effect`s the core loop must carry out
//! (catalog lookups, engine commands).  Lookup replies and engine signals
//! come back in as method calls.
//!
//! Status transitions:
//!
//! ```text
//!   Idle ──commit──▶ Loading ──ok──▶ Playing ◀──toggle──▶ Paused
//!                       │                 │                  │
//!                       └─fail─▶ previous └──reserve──▶ ReservedHold ──reserve──▶ Paused
//! ```
//!
//! Commit lookups are tagged with a generation number; a reply is applied
//! only if no newer commit (or stop) happened since it was issued.

use karaoke_proto::catalog::{LookupError, LookupMode, SongId, SongRecord};
use karaoke_proto::protocol::{
    NowPlaying, PlaybackStatus, PlayerState, TransportAction, ValidationKind,
};
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::action::KioskKey;
use crate::focus::ControlFocusNavigator;
use crate::input_buffer::InputBuffer;
use crate::notification::NotificationArbiter;
use crate::reservation::ReservationQueue;
use crate::timer::{earliest, Timer};

/// Delay between end of media and loading the next reservation.
pub const AUTOPLAY_GRACE: Duration = Duration::from_millis(500);
/// Delay before trying the following reservation after a failed autoplay load.
pub const AUTOPLAY_RETRY: Duration = Duration::from_secs(1);
/// Relative seek step, as a fraction of the video.
pub const SEEK_STEP: f64 = 0.05;
pub const MAX_SEEK: f64 = 0.99;

const PLAYING_NOW_DURATION: Duration = Duration::from_secs(3);
const SELECTED_FAILURE_DURATION: Duration = Duration::from_secs(5);

/// Why a song is being loaded.  Decides the failure message and whether a
/// failure chains to the next reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOrigin {
    /// Typed while nothing was loaded.
    Direct,
    /// Queue advance after the previous song ended.
    Autoplay,
    /// "Play next or stop".
    Shortcut,
    /// A reservation picked from the list.
    Selected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPurpose {
    Commit(CommitOrigin),
    ReserveProbe,
    HintProbe,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub id: SongId,
    pub purpose: LookupPurpose,
    pub generation: u64,
}

impl LookupRequest {
    pub fn mode(&self) -> LookupMode {
        match self.purpose {
            LookupPurpose::Commit(_) => LookupMode::Commit,
            LookupPurpose::ReserveProbe | LookupPurpose::HintProbe => LookupMode::Probe,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Load { url: String },
    Play,
    Pause,
    SeekTo(f64),
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Lookup(LookupRequest),
    Engine(EngineCommand),
}

/// What the video engine reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineSignal {
    Ready,
    Play,
    Pause,
    Ended,
    Progress(f64),
    DurationKnown(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SongId,
    pub url: String,
    pub title: String,
}

pub struct PlaybackController {
    status: PlaybackStatus,
    /// Status to fall back to when a non-chained commit fails.  `Idle` means
    /// there is nothing to go back to (no session, or it already ended).
    resume_status: PlaybackStatus,
    session: Option<Session>,
    queue: ReservationQueue,
    input: InputBuffer,
    arbiter: NotificationArbiter,
    focus: ControlFocusNavigator,
    autoplay: bool,
    /// Pending autoplay step (grace delay or retry delay).
    autoplay_step: Timer,
    generation: u64,
    queue_cursor: Option<usize>,
    progress: f64,
    duration: Option<f64>,
    effects: Vec<Effect>,
}

impl PlaybackController {
    pub fn new(autoplay: bool) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            resume_status: PlaybackStatus::Idle,
            session: None,
            queue: ReservationQueue::new(),
            input: InputBuffer::new(),
            arbiter: NotificationArbiter::new(),
            focus: ControlFocusNavigator::new(),
            autoplay,
            autoplay_step: Timer::default(),
            generation: 0,
            queue_cursor: None,
            progress: 0.0,
            duration: None,
            effects: Vec::new(),
        }
    }

    // ── inputs ────────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KioskKey, now: Instant) -> Vec<Effect> {
        match key {
            KioskKey::Digit(c) => {
                if self.input.push_digit(c, now) {
                    self.arbiter.digit_accepted();
                }
            }
            KioskKey::Enter => self.enter(now),
            KioskKey::Escape => {
                self.input.clear();
                self.stop_session();
            }
            KioskKey::Space => self.toggle_pause_inner(),
            KioskKey::Left if self.transport_available() => self.focus.left(now),
            KioskKey::Right if self.transport_available() => self.focus.right(now),
            KioskKey::Up => {
                if self.status == PlaybackStatus::ReservedHold {
                    self.move_cursor(-1);
                } else if self.transport_available() {
                    self.focus.show(now);
                }
            }
            KioskKey::Down => {
                if self.status == PlaybackStatus::ReservedHold {
                    self.move_cursor(1);
                } else {
                    self.focus.hide();
                }
            }
            KioskKey::Advance => self.advance(),
            KioskKey::ToggleReserve => self.toggle_reserve_inner(),
            KioskKey::ToggleAutoplay => self.set_autoplay_inner(!self.autoplay),
            KioskKey::Left | KioskKey::Right => {
                debug!("playback: transport keys suppressed in {:?}", self.status)
            }
        }
        self.finish(now)
    }

    /// Commit `id` as if typed and Entered.
    pub fn submit(&mut self, id: SongId, now: Instant) -> Vec<Effect> {
        self.submit_inner(id);
        self.finish(now)
    }

    pub fn play_reservation(&mut self, index: usize, now: Instant) -> Vec<Effect> {
        self.select_reservation(index, now);
        self.finish(now)
    }

    pub fn play_next_or_stop(&mut self, now: Instant) -> Vec<Effect> {
        self.advance();
        self.finish(now)
    }

    pub fn stop(&mut self, now: Instant) -> Vec<Effect> {
        self.stop_session();
        self.finish(now)
    }

    pub fn toggle_pause(&mut self, now: Instant) -> Vec<Effect> {
        self.toggle_pause_inner();
        self.finish(now)
    }

    pub fn toggle_reserve(&mut self, now: Instant) -> Vec<Effect> {
        self.toggle_reserve_inner();
        self.finish(now)
    }

    pub fn set_autoplay(&mut self, enabled: bool, now: Instant) -> Vec<Effect> {
        self.set_autoplay_inner(enabled);
        self.finish(now)
    }

    pub fn seek_to(&mut self, fraction: f64, now: Instant) -> Vec<Effect> {
        self.seek_to_inner(fraction);
        self.finish(now)
    }

    pub fn on_lookup(
        &mut self,
        request: LookupRequest,
        result: Result<SongRecord, LookupError>,
        now: Instant,
    ) -> Vec<Effect> {
        let LookupRequest {
            id,
            purpose,
            generation,
        } = request;
        match purpose {
            LookupPurpose::Commit(origin) => {
                self.commit_finished(id, origin, generation, result, now)
            }
            LookupPurpose::ReserveProbe => self.reserve_probe_finished(id, result, now),
            LookupPurpose::HintProbe => self.hint_probe_finished(id, result, now),
        }
        self.finish(now)
    }

    pub fn on_engine(&mut self, signal: EngineSignal, now: Instant) -> Vec<Effect> {
        match signal {
            EngineSignal::Ready => debug!("engine: ready in {:?}", self.status),
            EngineSignal::Play => match self.status {
                PlaybackStatus::Paused => self.status = PlaybackStatus::Playing,
                PlaybackStatus::ReservedHold => {
                    debug!("engine: resumed while held, pausing again");
                    self.effects.push(Effect::Engine(EngineCommand::Pause));
                }
                _ => {}
            },
            EngineSignal::Pause => {
                if self.status == PlaybackStatus::Playing {
                    self.status = PlaybackStatus::Paused;
                }
            }
            EngineSignal::Ended => self.media_ended(now),
            EngineSignal::Progress(fraction) => {
                if self.session.is_some() && fraction.is_finite() {
                    self.progress = fraction.clamp(0.0, 1.0);
                }
            }
            EngineSignal::DurationKnown(secs) => {
                if self.session.is_some() && secs.is_finite() && secs > 0.0 {
                    self.duration = Some(secs);
                }
            }
        }
        self.finish(now)
    }

    /// The engine could not load or play the current session.
    pub fn engine_failed(&mut self, now: Instant) -> Vec<Effect> {
        if let Some(session) = &self.session {
            warn!("playback: engine failed for {}", session.id);
            self.arbiter
                .error(format!("Could not play song {}", session.id), now);
        }
        self.stop_session();
        self.finish(now)
    }

    /// Fire every timer that is due.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        if self.input.expire(now) {
            self.arbiter.typing_expired(now);
        }
        let hint_due = self.arbiter.tick(now);
        self.focus.tick(now);
        if self.autoplay_step.fire(now) {
            self.autoplay_step_due();
        }
        if hint_due {
            self.request_upcoming_hint();
        }
        self.finish(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.input.deadline(),
            self.arbiter.deadline(),
            self.focus.deadline(),
            self.autoplay_step.deadline(),
        ])
    }

    // ── read access ───────────────────────────────────────────────────────────

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> PlayerState {
        PlayerState {
            status: self.status,
            now_playing: self.session.as_ref().map(|s| NowPlaying {
                song: s.id.to_string(),
                title: s.title.clone(),
            }),
            queue: self.queue.to_strings(),
            queue_cursor: self.queue_cursor,
            autoplay: self.autoplay,
            notification: self.arbiter.current(self.input.text()),
            focus: self.focus.state(),
            progress: self.progress,
            duration_secs: self.duration,
            ..Default::default()
        }
    }

    // ── transitions ───────────────────────────────────────────────────────────

    fn transport_available(&self) -> bool {
        self.session.is_some()
            && matches!(
                self.status,
                PlaybackStatus::Playing | PlaybackStatus::Paused
            )
    }

    fn enter(&mut self, now: Instant) {
        if let Some(id) = self.input.commit() {
            self.submit_inner(id);
            return;
        }
        if self.focus.is_visible() {
            if let Some(action) = self.focus.activate(now) {
                self.run_transport(action);
            }
            return;
        }
        if self.status == PlaybackStatus::ReservedHold {
            if let Some(index) = self.queue_cursor {
                self.select_reservation(index, now);
            }
        }
    }

    /// Play now when nothing is loaded, otherwise check the song exists and
    /// reserve it.
    fn submit_inner(&mut self, id: SongId) {
        if self.session.is_some() {
            info!("playback: checking {} before reserving", id);
            self.effects.push(Effect::Lookup(LookupRequest {
                id,
                purpose: LookupPurpose::ReserveProbe,
                generation: self.generation,
            }));
        } else {
            self.start_commit(id, CommitOrigin::Direct);
        }
    }

    fn start_commit(&mut self, id: SongId, origin: CommitOrigin) {
        self.autoplay_step.cancel();
        self.generation += 1;
        if self.status != PlaybackStatus::Loading {
            self.resume_status = self.status;
        }
        info!(
            "playback: {:?} → Loading {} ({:?}, gen {})",
            self.status, id, origin, self.generation
        );
        self.status = PlaybackStatus::Loading;
        self.effects.push(Effect::Lookup(LookupRequest {
            id,
            purpose: LookupPurpose::Commit(origin),
            generation: self.generation,
        }));
    }

    fn commit_finished(
        &mut self,
        id: SongId,
        origin: CommitOrigin,
        generation: u64,
        result: Result<SongRecord, LookupError>,
        now: Instant,
    ) {
        if generation != self.generation || self.status != PlaybackStatus::Loading {
            debug!(
                "playback: dropping stale reply for {} (gen {}, current {})",
                id, generation, self.generation
            );
            return;
        }

        match result {
            Ok(record) => {
                let title = record.display_title(&id);
                info!("playback: Loading → Playing {} '{}'", id, title);
                self.effects.push(Effect::Engine(EngineCommand::Load {
                    url: record.url.clone(),
                }));
                self.session = Some(Session {
                    id,
                    url: record.url,
                    title,
                });
                self.status = PlaybackStatus::Playing;
                self.resume_status = PlaybackStatus::Idle;
                self.progress = 0.0;
                self.duration = None;
            }
            Err(err) => {
                warn!("playback: {:?} load of {} failed: {}", origin, id, err);
                let text = failure_text(&id, origin, &err);
                match origin {
                    CommitOrigin::Selected => self.arbiter.show_validation(
                        text,
                        ValidationKind::Error,
                        SELECTED_FAILURE_DURATION,
                        now,
                    ),
                    _ => self.arbiter.error(text, now),
                }

                if origin == CommitOrigin::Autoplay {
                    if self.queue.is_empty() {
                        info!("playback: reservations exhausted");
                        self.stop_session();
                    } else {
                        self.autoplay_step.arm(now, AUTOPLAY_RETRY);
                    }
                } else if self.session.is_some() && self.resume_status != PlaybackStatus::Idle {
                    self.status = self.resume_status;
                } else {
                    self.stop_session();
                }
            }
        }
    }

    fn reserve_probe_finished(
        &mut self,
        id: SongId,
        result: Result<SongRecord, LookupError>,
        now: Instant,
    ) {
        match result {
            Ok(_) => {
                info!("playback: reserved {}", id);
                self.arbiter
                    .success(format!("Song {} added to reserved list", id), now);
                self.queue.enqueue(id);
            }
            Err(LookupError::NotFound) => {
                self.arbiter.error(format!("Song {} not found", id), now);
            }
            Err(err) => {
                warn!("playback: probe for {} failed: {}", id, err);
                self.arbiter
                    .error(format!("Error checking song {}: {}", id, err), now);
            }
        }
    }

    fn hint_probe_finished(
        &mut self,
        id: SongId,
        result: Result<SongRecord, LookupError>,
        now: Instant,
    ) {
        if self.queue.peek_head().ok() != Some(&id) {
            debug!("playback: queue head moved, hint for {} dropped", id);
            return;
        }
        match result {
            Ok(record) => {
                let title = record.display_title(&id);
                self.arbiter.show_hint(&title, !self.input.is_empty(), now);
            }
            Err(err) => debug!("playback: hint probe for {} failed: {}", id, err),
        }
    }

    fn request_upcoming_hint(&mut self) {
        if self.session.is_none() || !self.arbiter.may_request_hint(!self.input.is_empty()) {
            return;
        }
        if let Ok(head) = self.queue.peek_head() {
            self.effects.push(Effect::Lookup(LookupRequest {
                id: head.clone(),
                purpose: LookupPurpose::HintProbe,
                generation: self.generation,
            }));
        }
    }

    fn media_ended(&mut self, now: Instant) {
        if self.session.is_none() {
            return;
        }
        if self.status == PlaybackStatus::Loading {
            // the old video is gone; a failed lookup must not resume it
            debug!("playback: media ended while loading the next song");
            self.resume_status = PlaybackStatus::Idle;
            return;
        }
        if self.autoplay && !self.queue.is_empty() {
            info!("playback: media ended, next reservation in {:?}", AUTOPLAY_GRACE);
            self.status = PlaybackStatus::Loading;
            self.resume_status = PlaybackStatus::Idle;
            self.autoplay_step.arm(now, AUTOPLAY_GRACE);
        } else {
            info!("playback: media ended, nothing to play next");
            self.stop_session();
        }
    }

    fn autoplay_step_due(&mut self) {
        if !self.autoplay || self.queue.is_empty() {
            self.stop_session();
            return;
        }
        match self.queue.dequeue_head() {
            Ok(id) => self.start_commit(id, CommitOrigin::Autoplay),
            Err(e) => error!("playback: autoplay step: {}", e),
        }
    }

    /// Next reservation, or stop when there is none.
    fn advance(&mut self) {
        if self.queue.is_empty() {
            self.stop_session();
            return;
        }
        match self.queue.dequeue_head() {
            Ok(id) => self.start_commit(id, CommitOrigin::Shortcut),
            Err(e) => error!("playback: advance: {}", e),
        }
    }

    fn select_reservation(&mut self, index: usize, now: Instant) {
        let id = match self.queue.dequeue_through(index) {
            Ok(id) => id,
            Err(e) => {
                error!("playback: play reservation: {}", e);
                return;
            }
        };
        self.arbiter.show_validation(
            format!("Playing song {} now", id),
            ValidationKind::Success,
            PLAYING_NOW_DURATION,
            now,
        );
        self.start_commit(id, CommitOrigin::Selected);
    }

    fn stop_session(&mut self) {
        if self.status != PlaybackStatus::Idle || self.session.is_some() {
            info!("playback: {:?} → Idle (stop)", self.status);
        }
        self.generation += 1;
        self.autoplay_step.cancel();
        self.session = None;
        self.status = PlaybackStatus::Idle;
        self.resume_status = PlaybackStatus::Idle;
        self.progress = 0.0;
        self.duration = None;
        self.focus.force_reset();
        self.effects.push(Effect::Engine(EngineCommand::Stop));
    }

    fn toggle_pause_inner(&mut self) {
        match self.status {
            PlaybackStatus::Playing => {
                self.status = PlaybackStatus::Paused;
                self.effects.push(Effect::Engine(EngineCommand::Pause));
            }
            PlaybackStatus::Paused => {
                self.status = PlaybackStatus::Playing;
                self.effects.push(Effect::Engine(EngineCommand::Play));
            }
            other => debug!("playback: play/pause ignored in {:?}", other),
        }
    }

    fn toggle_reserve_inner(&mut self) {
        match self.status {
            PlaybackStatus::Playing | PlaybackStatus::Paused => {
                info!("playback: {:?} → ReservedHold", self.status);
                self.status = PlaybackStatus::ReservedHold;
                self.effects.push(Effect::Engine(EngineCommand::Pause));
                self.focus.force_reset();
            }
            PlaybackStatus::ReservedHold => {
                info!("playback: ReservedHold → Paused");
                self.status = PlaybackStatus::Paused;
            }
            other => debug!("playback: reserve ignored in {:?}", other),
        }
    }

    fn set_autoplay_inner(&mut self, enabled: bool) {
        if self.autoplay != enabled {
            info!("playback: autoplay {}", if enabled { "on" } else { "off" });
        }
        self.autoplay = enabled;
    }

    fn seek_to_inner(&mut self, fraction: f64) {
        if !matches!(
            self.status,
            PlaybackStatus::Playing | PlaybackStatus::Paused
        ) || !fraction.is_finite()
        {
            return;
        }
        let target = fraction.clamp(0.0, MAX_SEEK);
        self.progress = target;
        self.effects.push(Effect::Engine(EngineCommand::SeekTo(target)));
    }

    fn run_transport(&mut self, action: TransportAction) {
        debug!("playback: transport {:?}", action);
        match action {
            TransportAction::SeekBackward => self.seek_to_inner(self.progress - SEEK_STEP),
            TransportAction::PlayPause => self.toggle_pause_inner(),
            TransportAction::Stop => self.advance(),
            TransportAction::SeekForward => self.seek_to_inner(self.progress + SEEK_STEP),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.queue.is_empty() {
            self.queue_cursor = None;
            return;
        }
        let last = self.queue.len() - 1;
        self.queue_cursor = Some(match self.queue_cursor {
            Some(i) => i.saturating_add_signed(delta).min(last),
            None => 0,
        });
    }

    /// Housekeeping after every handled input; hands out the effects.
    fn finish(&mut self, now: Instant) -> Vec<Effect> {
        let hint_condition = self.session.is_some() && !self.queue.is_empty();
        if self.arbiter.set_hint_cadence(hint_condition, now) {
            self.request_upcoming_hint();
        }

        self.queue_cursor = if self.status != PlaybackStatus::ReservedHold || self.queue.is_empty()
        {
            None
        } else {
            Some(self.queue_cursor.unwrap_or(0).min(self.queue.len() - 1))
        };

        std::mem::take(&mut self.effects)
    }
}

fn failure_text(id: &SongId, origin: CommitOrigin, err: &LookupError) -> String {
    match (origin, err) {
        (CommitOrigin::Direct, LookupError::NotFound) => format!("Could not find song {}", id),
        (CommitOrigin::Direct, err) => format!("Could not find song {}: {}", id, err),
        (CommitOrigin::Autoplay | CommitOrigin::Shortcut, _) => {
            format!("Could not play next song ({})", id)
        }
        (CommitOrigin::Selected, _) => format!("Could not play song {}", id),
    }
}
