//! Reservation queue: songs waiting to be played after the current one.

use std::collections::VecDeque;

use karaoke_proto::catalog::SongId;
use thiserror::Error;
use tracing::debug;

/// Only the most recent reservations are kept.
pub const MAX_RESERVATIONS: usize = 30;

/// Callers check the queue before popping; hitting one of these is a bug in
/// the caller, never something the operator sees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("reservation queue is empty")]
    EmptyQueue,
    #[error("reservation {index} out of range (queue has {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Default, Clone)]
pub struct ReservationQueue {
    entries: VecDeque<SongId>,
}

impl ReservationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail.  Past the limit the oldest entries fall off the head.
    pub fn enqueue(&mut self, id: SongId) {
        self.entries.push_back(id);
        while self.entries.len() > MAX_RESERVATIONS {
            if let Some(dropped) = self.entries.pop_front() {
                debug!("queue: full, dropped oldest reservation {}", dropped);
            }
        }
    }

    pub fn dequeue_head(&mut self) -> Result<SongId, QueueError> {
        self.entries.pop_front().ok_or(QueueError::EmptyQueue)
    }

    /// Remove entries `0..=index` and return the one at `index`.
    pub fn dequeue_through(&mut self, index: usize) -> Result<SongId, QueueError> {
        let len = self.entries.len();
        if index >= len {
            return Err(QueueError::IndexOutOfRange { index, len });
        }
        self.entries.drain(..index);
        self.entries.pop_front().ok_or(QueueError::EmptyQueue)
    }

    pub fn peek_head(&self) -> Result<&SongId, QueueError> {
        self.entries.front().ok_or(QueueError::EmptyQueue)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.entries.iter().map(|id| id.to_string()).collect()
    }
}
