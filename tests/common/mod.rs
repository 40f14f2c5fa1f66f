#![allow(dead_code)]

use lilt::audio::{DecoderEvent, DecoderHandle, Generation};
use lilt::controller::PlaybackController;
use lilt::error::{PlaybackError, Result};
use lilt::listener::{PlaybackEvent, PlaybackListener};
use lilt::model::Track;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted decoder: answers every load with `Ready` (or `LoadFailed` for
/// titles listed in `failing`) on the next poll.
#[derive(Default)]
pub struct ScriptedDecoder {
    pub loads: Vec<String>,
    pub failing: HashSet<String>,
    live: Option<Generation>,
    started: bool,
    paused: bool,
    events: VecDeque<DecoderEvent>,
    volume: f32,
}

impl ScriptedDecoder {
    pub fn failing(titles: &[&str]) -> Self {
        Self {
            failing: titles.iter().map(|title| title.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl DecoderHandle for ScriptedDecoder {
    fn load(&mut self, track: &Track, generation: Generation) {
        self.release();
        self.loads.push(track.title().to_string());
        if self.failing.contains(track.title()) {
            self.events.push_back(DecoderEvent::LoadFailed {
                generation,
                reason: String::from("unsupported container"),
            });
            return;
        }
        self.live = Some(generation);
        self.events.push_back(DecoderEvent::Ready {
            generation,
            duration: Some(Duration::from_secs(180)),
        });
    }

    fn start(&mut self) {
        self.started = self.live.is_some();
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn seek_to(&mut self, _position: Duration) -> Result<()> {
        self.live.map(|_| ()).ok_or(PlaybackError::NoTrackLoaded)
    }

    fn position(&self) -> Option<Duration> {
        self.live.map(|_| Duration::ZERO)
    }

    fn duration(&self) -> Option<Duration> {
        self.live.map(|_| Duration::from_secs(180))
    }

    fn is_playing(&self) -> bool {
        self.live.is_some() && self.started && !self.paused
    }

    fn release(&mut self) {
        self.live = None;
        self.started = false;
        self.paused = false;
        self.events.clear();
    }

    fn poll_event(&mut self) -> Option<DecoderEvent> {
        self.events.pop_front()
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("scripted"))
    }
}

pub fn tracks(titles: &[&str]) -> Vec<Track> {
    titles
        .iter()
        .map(|title| Track::new(*title, format!("/music/{title}.mp3")))
        .collect()
}

pub fn controller_with(titles: &[&str]) -> PlaybackController<ScriptedDecoder> {
    let mut controller = PlaybackController::with_seed(ScriptedDecoder::default(), 42);
    controller.load_queue(tracks(titles));
    controller
}

/// Plays `index` and lets the decoder report ready.
pub fn start_at(controller: &mut PlaybackController<ScriptedDecoder>, index: usize) {
    controller.play_at(index);
    controller.pump();
}

pub fn finish(controller: &mut PlaybackController<ScriptedDecoder>) {
    let generation = controller.generation();
    controller.on_decoder_event(DecoderEvent::Finished { generation });
    controller.pump();
}

pub type Recorded = Arc<Mutex<Vec<PlaybackEvent>>>;

pub fn recorder() -> (Recorded, Box<dyn PlaybackListener>) {
    let seen: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener = move |event: &PlaybackEvent| {
        sink.lock().expect("lock").push(event.clone());
    };
    (seen, Box::new(listener))
}

pub fn write_test_wav(path: &Path, duration_ms: u32) {
    let sample_rate: u32 = 44_100;
    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let bytes_per_sample = u32::from(bits_per_sample / 8);
    let total_samples = (u64::from(sample_rate) * u64::from(duration_ms) / 1_000) as u32;
    let data_size = total_samples * u32::from(channels) * bytes_per_sample;
    let byte_rate = sample_rate * u32::from(channels) * bytes_per_sample;
    let block_align = channels * (bits_per_sample / 8);

    let mut bytes = Vec::with_capacity((44_u32 + data_size) as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36_u32 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    bytes.resize((44_u32 + data_size) as usize, 0_u8);

    fs::write(path, bytes).expect("wav fixture should be written");
}
