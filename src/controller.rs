//! Playback state machine.
//!
//! Owns the queue, the position pointer, shuffle/repeat policy and the single
//! decoder handle. Every entry point and every decoder event must run on one
//! control thread; nothing here locks.
//!
//! Per-track lifecycle: `Idle -> Loading -> Playing <-> Paused`, with end of
//! stream immediately re-entering `Loading` for the next track or dropping to
//! `Idle` when the queue is exhausted.

use crate::audio::{DecoderEvent, DecoderHandle, Generation};
use crate::command::Command;
use crate::error::{PlaybackError, Result};
use crate::listener::{ListenerId, ListenerRegistry, PlaybackEvent, PlaybackListener};
use crate::model::{PlaybackPhase, PlaybackSnapshot, RepeatMode, Track};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IteratorRandom;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_EVENTS_PER_PUMP: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerOptions {
    /// Keep a random pick from landing on the index it is leaving.
    pub avoid_immediate_repeat: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

pub struct PlaybackController<D> {
    decoder: D,
    queue: Vec<Track>,
    current_index: Option<usize>,
    loading_index: Option<usize>,
    is_playing: bool,
    shuffle: bool,
    repeat_mode: RepeatMode,
    phase: PlaybackPhase,
    generation: Generation,
    consecutive_failures: usize,
    listeners: ListenerRegistry,
    options: ControllerOptions,
    rng: SmallRng,
}

impl<D: DecoderHandle> PlaybackController<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_rng(decoder, SmallRng::from_os_rng())
    }

    /// Deterministic shuffle picks, for reproducible runs.
    pub fn with_seed(decoder: D, seed: u64) -> Self {
        Self::with_rng(decoder, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(decoder: D, rng: SmallRng) -> Self {
        Self {
            decoder,
            queue: Vec::new(),
            current_index: None,
            loading_index: None,
            is_playing: false,
            shuffle: false,
            repeat_mode: RepeatMode::Off,
            phase: PlaybackPhase::Idle,
            generation: Generation::default(),
            consecutive_failures: 0,
            listeners: ListenerRegistry::new(),
            options: ControllerOptions::default(),
            rng,
        }
    }

    pub fn set_options(&mut self, options: ControllerOptions) {
        self.options = options;
    }

    /// Replaces the queue with `tracks`. Any loaded or pending track is dropped
    /// and nothing starts until a play request arrives.
    pub fn load_queue(&mut self, tracks: Vec<Track>) {
        self.generation = self.generation.next();
        self.decoder.release();
        self.queue = tracks;
        self.current_index = None;
        self.loading_index = None;
        self.is_playing = false;
        self.phase = PlaybackPhase::Idle;
        self.consecutive_failures = 0;
        info!(tracks = self.queue.len(), "queue replaced");
    }

    /// Loads and starts `queue[index]`. An out-of-range index wraps to 0; an
    /// empty queue makes this a no-op.
    pub fn play_at(&mut self, index: usize) {
        match self.resolve_index(index) {
            Ok(index) => {
                self.consecutive_failures = 0;
                self.begin_load(index);
            }
            Err(err) => debug!(%err, "play request ignored"),
        }
    }

    /// Resumes a paused track, or starts the current (or first) track when idle.
    pub fn play(&mut self) {
        match self.phase {
            PlaybackPhase::Paused => self.resume(),
            PlaybackPhase::Playing | PlaybackPhase::Loading => {}
            PlaybackPhase::Idle => self.play_at(self.current_index.unwrap_or(0)),
        }
    }

    pub fn pause(&mut self) {
        if self.phase != PlaybackPhase::Playing {
            return;
        }
        self.decoder.pause();
        self.phase = PlaybackPhase::Paused;
        self.is_playing = self.decoder.is_playing();
        debug!(generation = self.generation.value(), "paused");
        self.emit_current();
    }

    pub fn resume(&mut self) {
        if self.phase != PlaybackPhase::Paused {
            return;
        }
        self.decoder.resume();
        self.phase = PlaybackPhase::Playing;
        self.is_playing = self.decoder.is_playing();
        debug!(generation = self.generation.value(), "resumed");
        self.emit_current();
    }

    pub fn toggle_play_pause(&mut self) {
        if self.phase == PlaybackPhase::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn next(&mut self) {
        self.skip(Direction::Forward);
    }

    pub fn previous(&mut self) {
        self.skip(Direction::Backward);
    }

    pub fn dispatch(&mut self, command: Command) {
        debug!(%command, "command");
        match command {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Next => self.next(),
            Command::Previous => self.previous(),
        }
    }

    pub fn toggle_shuffle(&mut self) {
        self.shuffle = !self.shuffle;
        info!(shuffle = self.shuffle, "shuffle toggled");
    }

    pub fn toggle_repeat(&mut self) {
        self.repeat_mode = self.repeat_mode.next();
        info!(repeat = ?self.repeat_mode, "repeat mode changed");
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.shuffle = enabled;
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    pub fn seek_to(&mut self, position: Duration) -> Result<()> {
        if !matches!(self.phase, PlaybackPhase::Playing | PlaybackPhase::Paused) {
            return Err(PlaybackError::NoTrackLoaded);
        }
        self.decoder.seek_to(position)
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.decoder.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.decoder.volume()
    }

    pub fn position(&self) -> Option<Duration> {
        match self.phase {
            PlaybackPhase::Playing | PlaybackPhase::Paused => self.decoder.position(),
            PlaybackPhase::Idle | PlaybackPhase::Loading => None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self.phase {
            PlaybackPhase::Playing | PlaybackPhase::Paused => self.decoder.duration(),
            PlaybackPhase::Idle | PlaybackPhase::Loading => None,
        }
    }

    /// Drains decoder events and applies them in arrival order.
    pub fn pump(&mut self) {
        for _ in 0..MAX_EVENTS_PER_PUMP {
            let Some(event) = self.decoder.poll_event() else {
                return;
            };
            self.on_decoder_event(event);
        }
    }

    /// Applies one decoder event. Events stamped with a generation other than
    /// the current one come from a superseded load and are dropped.
    pub fn on_decoder_event(&mut self, event: DecoderEvent) {
        if event.generation() != self.generation {
            debug!(
                stale = event.generation().value(),
                current = self.generation.value(),
                "discarding stale decoder event"
            );
            return;
        }

        match event {
            DecoderEvent::Ready { duration, .. } => self.on_ready(duration),
            DecoderEvent::LoadFailed { reason, .. } => self.on_load_failed(reason),
            DecoderEvent::Finished { .. } => {
                if matches!(self.phase, PlaybackPhase::Playing | PlaybackPhase::Paused) {
                    self.on_track_finished();
                }
            }
            DecoderEvent::Paused { .. } => {
                if self.phase == PlaybackPhase::Playing {
                    self.phase = PlaybackPhase::Paused;
                    self.is_playing = false;
                    self.emit_current();
                }
            }
            DecoderEvent::Resumed { .. } => {
                if self.phase == PlaybackPhase::Paused {
                    self.phase = PlaybackPhase::Playing;
                    self.is_playing = self.decoder.is_playing();
                    self.emit_current();
                }
            }
        }
    }

    /// Registers a listener and replays the present state to it.
    pub fn attach_listener(&mut self, id: ListenerId, listener: Box<dyn PlaybackListener>) {
        let current = self.current_event();
        self.listeners.attach(id, listener, current.as_ref());
    }

    pub fn subscribe(&mut self, listener: Box<dyn PlaybackListener>) -> ListenerId {
        let id = ListenerId::next();
        self.attach_listener(id, listener);
        id
    }

    pub fn detach_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.detach(id)
    }

    /// Stops output and invalidates any pending load.
    pub fn shutdown(&mut self) {
        self.generation = self.generation.next();
        self.decoder.release();
        self.loading_index = None;
        self.phase = PlaybackPhase::Idle;
        self.is_playing = false;
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.queue.get(index))
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_index: self.current_index,
            current_title: self.current_track().map(|track| track.title().to_string()),
            is_playing: self.is_playing,
            shuffle: self.shuffle,
            repeat_mode: self.repeat_mode,
            phase: self.phase,
            queue_titles: self
                .queue
                .iter()
                .map(|track| track.title().to_string())
                .collect(),
            position: self.position(),
            duration: self.duration(),
            volume: self.volume(),
            output: self.decoder.output_name(),
        }
    }

    fn resolve_index(&self, index: usize) -> Result<usize> {
        let len = self.queue.len();
        if len == 0 {
            return Err(PlaybackError::EmptyQueue);
        }
        if index >= len {
            debug!(err = %PlaybackError::IndexInvalid { index, len }, "wrapping to start");
            return Ok(0);
        }
        Ok(index)
    }

    fn track_at(&self, index: usize) -> Result<&Track> {
        self.queue.get(index).ok_or(PlaybackError::IndexInvalid {
            index,
            len: self.queue.len(),
        })
    }

    fn begin_load(&mut self, index: usize) {
        self.decoder.release();
        self.generation = self.generation.next();
        let Ok(track) = self.track_at(index) else {
            self.loading_index = None;
            self.phase = PlaybackPhase::Idle;
            self.is_playing = false;
            return;
        };
        let track = track.clone();

        self.loading_index = Some(index);
        self.phase = PlaybackPhase::Loading;
        self.is_playing = false;
        debug!(
            index,
            title = track.title(),
            generation = self.generation.value(),
            "loading track"
        );
        self.decoder.load(&track, self.generation);
    }

    fn on_ready(&mut self, duration: Option<Duration>) {
        if self.phase != PlaybackPhase::Loading {
            return;
        }
        let Some(index) = self.loading_index.take() else {
            return;
        };

        self.decoder.start();
        self.current_index = Some(index);
        self.phase = PlaybackPhase::Playing;
        self.is_playing = self.decoder.is_playing();
        self.consecutive_failures = 0;
        info!(
            index,
            title = self.current_track().map(Track::title).unwrap_or_default(),
            duration_ms = duration.map(|d| d.as_millis() as u64),
            "playing"
        );
        self.emit_current();
    }

    fn on_load_failed(&mut self, reason: String) {
        if self.phase != PlaybackPhase::Loading {
            return;
        }
        let failed = self.loading_index.take();
        let title = failed
            .and_then(|index| self.queue.get(index))
            .map(|track| track.title().to_string())
            .unwrap_or_default();
        warn!(err = %PlaybackError::LoadFailed { title, reason }, "skipping unplayable track");

        self.decoder.release();
        self.phase = PlaybackPhase::Idle;
        self.is_playing = false;
        self.consecutive_failures += 1;

        if self.consecutive_failures >= self.queue.len() {
            warn!(
                failures = self.consecutive_failures,
                "every track in the queue failed to load"
            );
            self.consecutive_failures = 0;
            self.emit_current();
            self.listeners.emit(&PlaybackEvent::AllTracksFailed);
            return;
        }

        match self.advance_target(failed, Direction::Forward) {
            Some(target) => self.begin_load(target),
            None => self.stop_at_end(),
        }
    }

    fn on_track_finished(&mut self) {
        let Some(current) = self.current_index else {
            self.stop_at_end();
            return;
        };

        if self.repeat_mode == RepeatMode::One {
            self.begin_load(current);
            return;
        }

        match self.advance_target(Some(current), Direction::Forward) {
            Some(target) => self.begin_load(target),
            None => self.stop_at_end(),
        }
    }

    fn skip(&mut self, direction: Direction) {
        if self.queue.is_empty() {
            debug!(err = %PlaybackError::EmptyQueue, ?direction, "skip ignored");
            return;
        }
        let base = self.loading_index.or(self.current_index);
        match self.advance_target(base, direction) {
            Some(target) => {
                self.consecutive_failures = 0;
                self.begin_load(target);
            }
            None => debug!(?direction, "at queue boundary, staying on current track"),
        }
    }

    fn advance_target(&mut self, from: Option<usize>, direction: Direction) -> Option<usize> {
        let len = self.queue.len();
        if len == 0 {
            return None;
        }
        if self.shuffle {
            return Some(self.random_index(from));
        }

        let wraps = self.repeat_mode == RepeatMode::All;
        match direction {
            Direction::Forward => {
                let target = from.map_or(0, |index| index + 1);
                if target < len {
                    Some(target)
                } else {
                    wraps.then_some(0)
                }
            }
            Direction::Backward => match from {
                Some(index) if index > 0 => Some(index - 1),
                _ => wraps.then_some(len - 1),
            },
        }
    }

    fn random_index(&mut self, leaving: Option<usize>) -> usize {
        let len = self.queue.len();
        let exclude = leaving.filter(|_| self.options.avoid_immediate_repeat && len > 1);
        (0..len)
            .filter(|idx| Some(*idx) != exclude)
            .choose(&mut self.rng)
            .unwrap_or(0)
    }

    fn stop_at_end(&mut self) {
        self.decoder.release();
        self.loading_index = None;
        self.phase = PlaybackPhase::Idle;
        self.is_playing = false;
        info!("reached end of queue");
        self.emit_current();
    }

    fn current_event(&self) -> Option<PlaybackEvent> {
        self.current_track().map(|track| PlaybackEvent::Transition {
            track: track.clone(),
            is_playing: self.is_playing,
        })
    }

    fn emit_current(&mut self) {
        if let Some(event) = self.current_event() {
            self.listeners.emit(&event);
        }
    }
}
