use super::engine::open_source;
use super::{DecoderEvent, DecoderHandle, Generation, MAX_VOLUME};
use crate::error::{PlaybackError, Result};
use crate::model::Track;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Silent stand-in used when no output device can be opened.
///
/// Keeps a logical clock so position, duration and end-of-stream behave like a
/// real device. Loads still open and decode the file, so unreadable tracks fail
/// the same way they would with audio. Tracks whose length cannot be probed
/// never finish on their own.
pub struct NullDecoder {
    generation: Option<Generation>,
    started: bool,
    paused: bool,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    finish_reported: bool,
    events: VecDeque<DecoderEvent>,
    volume: f32,
}

impl NullDecoder {
    pub fn new() -> Self {
        Self {
            generation: None,
            started: false,
            paused: false,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            finish_reported: false,
            events: VecDeque::new(),
            volume: 1.0,
        }
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if self.started
            && !self.paused
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }

    fn check_finished(&mut self) {
        let Some(generation) = self.generation else {
            return;
        };
        let Some(duration) = self.track_duration else {
            return;
        };
        if self.started && !self.paused && !self.finish_reported && self.current_position() >= duration
        {
            self.finish_reported = true;
            self.events.push_back(DecoderEvent::Finished { generation });
        }
    }
}

impl Default for NullDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderHandle for NullDecoder {
    fn load(&mut self, track: &Track, generation: Generation) {
        self.release();
        match open_source(track.source()) {
            Ok((_, duration)) => {
                self.generation = Some(generation);
                self.track_duration = duration;
                self.events.push_back(DecoderEvent::Ready { generation, duration });
            }
            Err(reason) => self.events.push_back(DecoderEvent::LoadFailed { generation, reason }),
        }
    }

    fn start(&mut self) {
        if self.generation.is_none() {
            return;
        }
        self.started = true;
        self.paused = false;
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
    }

    fn pause(&mut self) {
        if !self.started || self.paused {
            return;
        }
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        if !self.started || !self.paused {
            return;
        }
        self.started_at = Some(Instant::now());
        self.paused = false;
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.generation.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused { None } else { Some(Instant::now()) };
        self.finish_reported = false;
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        self.generation?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn is_playing(&self) -> bool {
        self.started && !self.paused && !self.finish_reported
    }

    fn release(&mut self) {
        self.generation = None;
        self.started = false;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
        self.finish_reported = false;
        self.events.clear();
    }

    fn poll_event(&mut self) -> Option<DecoderEvent> {
        self.check_finished();
        self.events.pop_front()
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("Null audio output"))
    }
}
