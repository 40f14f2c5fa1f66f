//! Fan-out of controller transitions to any number of independent consumers.
//!
//! The UI and the transport notification each attach their own listener; the
//! registry delivers every event to all of them in attach order and never
//! special-cases one. A listener attached late is immediately replayed the
//! current state so it can resync without waiting for the next transition.

use crate::model::Track;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Track started, paused, resumed or changed.
    Transition { track: Track, is_playing: bool },
    /// Every track in the queue failed to load in one pass; the controller is idle.
    AllTracksFailed,
}

impl PlaybackEvent {
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Transition { track, .. } => Some(track.title()),
            Self::AllTracksFailed => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Transition { is_playing: true, .. })
    }
}

pub trait PlaybackListener: Send {
    fn on_playback_event(&mut self, event: &PlaybackEvent);
}

impl<F> PlaybackListener for F
where
    F: FnMut(&PlaybackEvent) + Send,
{
    fn on_playback_event(&mut self, event: &PlaybackEvent) {
        self(event);
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<(ListenerId, Box<dyn PlaybackListener>)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` under `id`, replacing any listener already using it,
    /// and replays `current` to it alone.
    pub fn attach(
        &mut self,
        id: ListenerId,
        mut listener: Box<dyn PlaybackListener>,
        current: Option<&PlaybackEvent>,
    ) {
        if let Some(event) = current {
            listener.on_playback_event(event);
        }
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.push((id, listener));
    }

    pub fn detach(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &PlaybackEvent) {
        for (_, listener) in &mut self.listeners {
            listener.on_playback_event(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
