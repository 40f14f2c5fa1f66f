use super::{DecoderEvent, DecoderHandle, Generation, MAX_VOLUME, with_silenced_stderr};
use crate::error::{PlaybackError, Result};
use crate::model::Track;
use anyhow::Context;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

type PreparedSource = Box<dyn Source + Send>;
type LoadOutcome = std::result::Result<(PreparedSource, Option<Duration>), String>;

struct PendingLoad {
    generation: Generation,
    receiver: Receiver<LoadOutcome>,
}

struct LoadedTrack {
    generation: Generation,
    path: PathBuf,
    duration: Option<Duration>,
    started: bool,
    finish_reported: bool,
}

/// Plays through the default (or first working) output device.
///
/// Files are opened and probed on a short-lived loader thread; the prepared
/// source is picked up by `poll_event` on the control thread, attached to a
/// paused sink and announced as `Ready`.
pub struct RodioDecoder {
    stream: OutputStream,
    sink: Option<Sink>,
    pending: Option<PendingLoad>,
    loaded: Option<LoadedTrack>,
    events: VecDeque<DecoderEvent>,
    volume: f32,
}

impl RodioDecoder {
    pub fn new() -> anyhow::Result<Self> {
        let stream = Self::open_output_stream()?;
        Ok(Self {
            stream,
            sink: None,
            pending: None,
            loaded: None,
            events: VecDeque::new(),
            volume: 1.0,
        })
    }

    fn open_output_stream() -> anyhow::Result<OutputStream> {
        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => Self::open_fallback_stream().with_context(|| {
                    format!(
                        "unable to start any audio output stream after default failed: {default_err:#}"
                    )
                }),
            }
        })?;
        stream.log_on_drop(false);
        Ok(stream)
    }

    fn open_fallback_stream() -> Option<OutputStream> {
        let host = rodio::cpal::default_host();
        let mut candidates: Vec<String> = host
            .output_devices()
            .ok()
            .into_iter()
            .flatten()
            .filter_map(|device| device.name().ok())
            .collect();
        candidates.sort_by_cached_key(|name| {
            let lower = name.to_ascii_lowercase();
            let rank = if lower.contains("pulse") {
                0_u8
            } else if lower.contains("pipewire") {
                1_u8
            } else if lower.contains("default") {
                2_u8
            } else {
                3_u8
            };
            (rank, lower)
        });
        candidates.dedup();

        for candidate in candidates {
            let Some(device) = host
                .output_devices()
                .ok()
                .into_iter()
                .flatten()
                .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
            else {
                continue;
            };
            let opened = OutputStreamBuilder::from_device(device)
                .ok()
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .ok()
                });
            if opened.is_some() {
                debug!(device = %candidate, "opened fallback output device");
                return opened;
            }
        }
        None
    }

    fn collect_pending(&mut self) {
        let Some(pending) = self.pending.as_ref() else {
            return;
        };

        let outcome = match pending.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(String::from("loader thread exited")),
        };
        let generation = pending.generation;
        self.pending = None;

        match outcome {
            Ok((source, duration)) => {
                let sink = Sink::connect_new(self.stream.mixer());
                sink.pause();
                sink.set_volume(self.volume);
                sink.append(source);
                self.sink = Some(sink);
                if let Some(loaded) = self.loaded.as_mut() {
                    loaded.duration = duration;
                }
                self.events.push_back(DecoderEvent::Ready {
                    generation,
                    duration,
                });
            }
            Err(reason) => {
                self.loaded = None;
                self.events
                    .push_back(DecoderEvent::LoadFailed { generation, reason });
            }
        }
    }

    fn check_finished(&mut self) {
        let (Some(sink), Some(loaded)) = (self.sink.as_ref(), self.loaded.as_mut()) else {
            return;
        };
        if loaded.started && !loaded.finish_reported && !sink.is_paused() && sink.empty() {
            loaded.finish_reported = true;
            debug!(path = %loaded.path.display(), "end of stream");
            self.events.push_back(DecoderEvent::Finished {
                generation: loaded.generation,
            });
        }
    }
}

pub(super) fn open_source(path: &Path) -> LoadOutcome {
    let file =
        File::open(path).map_err(|err| format!("failed to open track {}: {err}", path.display()))?;
    let source = Decoder::try_from(file)
        .map_err(|err| format!("failed to decode {}: {err}", path.display()))?;
    let duration = source
        .total_duration()
        .filter(|duration| !duration.is_zero());
    Ok((Box::new(source), duration))
}

impl DecoderHandle for RodioDecoder {
    fn load(&mut self, track: &Track, generation: Generation) {
        self.release();

        let path = track.source().to_path_buf();
        let (tx, rx) = mpsc::channel();
        let loader_path = path.clone();
        let spawned = thread::Builder::new()
            .name(String::from("lilt-loader"))
            .spawn(move || {
                let _ = tx.send(open_source(&loader_path));
            });

        if let Err(err) = spawned {
            warn!(%err, "could not spawn loader thread");
            self.events.push_back(DecoderEvent::LoadFailed {
                generation,
                reason: format!("could not spawn loader thread: {err}"),
            });
            return;
        }

        self.pending = Some(PendingLoad {
            generation,
            receiver: rx,
        });
        self.loaded = Some(LoadedTrack {
            generation,
            path,
            duration: None,
            started: false,
            finish_reported: false,
        });
    }

    fn start(&mut self) {
        let (Some(sink), Some(loaded)) = (self.sink.as_ref(), self.loaded.as_mut()) else {
            return;
        };
        sink.play();
        loaded.started = true;
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        let Some(sink) = self.sink.as_ref() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        sink.try_seek(position)
            .map_err(|err| PlaybackError::Seek(format!("{err:?}")))?;
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.finish_reported = false;
        }
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        self.sink.as_ref().map(Sink::get_pos)
    }

    fn duration(&self) -> Option<Duration> {
        self.loaded.as_ref().and_then(|loaded| loaded.duration)
    }

    fn is_playing(&self) -> bool {
        let started = self.loaded.as_ref().is_some_and(|loaded| loaded.started);
        started
            && self
                .sink
                .as_ref()
                .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.pending = None;
        self.loaded = None;
        self.events.clear();
    }

    fn poll_event(&mut self) -> Option<DecoderEvent> {
        self.collect_pending();
        self.check_finished();
        self.events.pop_front()
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("System default output (CPAL)"))
    }
}

impl Drop for RodioDecoder {
    fn drop(&mut self) {
        self.release();
    }
}
