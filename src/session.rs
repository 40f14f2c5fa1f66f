//! Control thread hosting the playback controller.
//!
//! The controller is not shared: it lives on one thread that applies requests
//! in arrival order and polls decoder events between them. Any number of
//! actors talk to it through cloned [`SessionHandle`]s, and it keeps running
//! with no UI attached.

use crate::audio::DecoderHandle;
use crate::command::Command;
use crate::controller::{ControllerOptions, PlaybackController};
use crate::error::{PlaybackError, Result};
use crate::listener::{ListenerId, PlaybackListener};
use crate::model::{PlaybackSnapshot, RepeatMode, Track};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_TICK: Duration = Duration::from_millis(25);

pub enum SessionRequest {
    Command(Command),
    LoadQueue(Vec<Track>),
    PlayAt(usize),
    TogglePlayPause,
    ToggleShuffle,
    ToggleRepeat,
    SetShuffle(bool),
    SetRepeat(RepeatMode),
    Seek(Duration),
    SetVolume(f32),
    Attach(ListenerId, Box<dyn PlaybackListener>),
    Detach(ListenerId),
    Snapshot(Sender<PlaybackSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Upper bound on how long a decoder event can wait before it is applied.
    pub tick: Duration,
    pub options: ControllerOptions,
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            options: ControllerOptions::default(),
            seed: None,
        }
    }
}

#[derive(Clone)]
pub struct SessionHandle {
    requests: Sender<SessionRequest>,
}

impl SessionHandle {
    pub fn send(&self, request: SessionRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| PlaybackError::SessionClosed)
    }

    pub fn submit(&self, command: Command) -> Result<()> {
        self.send(SessionRequest::Command(command))
    }

    pub fn load_queue(&self, tracks: Vec<Track>) -> Result<()> {
        self.send(SessionRequest::LoadQueue(tracks))
    }

    pub fn play_at(&self, index: usize) -> Result<()> {
        self.send(SessionRequest::PlayAt(index))
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        self.send(SessionRequest::TogglePlayPause)
    }

    pub fn toggle_shuffle(&self) -> Result<()> {
        self.send(SessionRequest::ToggleShuffle)
    }

    pub fn toggle_repeat(&self) -> Result<()> {
        self.send(SessionRequest::ToggleRepeat)
    }

    pub fn seek_to(&self, position: Duration) -> Result<()> {
        self.send(SessionRequest::Seek(position))
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(SessionRequest::SetVolume(volume))
    }

    /// Attaches a new listener; it is replayed the current state right away.
    pub fn attach(&self, listener: Box<dyn PlaybackListener>) -> Result<ListenerId> {
        let id = ListenerId::next();
        self.attach_as(id, listener)?;
        Ok(id)
    }

    /// Attaches under an existing id, replacing whatever was registered there.
    pub fn attach_as(&self, id: ListenerId, listener: Box<dyn PlaybackListener>) -> Result<()> {
        self.send(SessionRequest::Attach(id, listener))
    }

    pub fn detach(&self, id: ListenerId) -> Result<()> {
        self.send(SessionRequest::Detach(id))
    }

    pub fn snapshot(&self) -> Result<PlaybackSnapshot> {
        let (reply, response) = mpsc::channel();
        self.send(SessionRequest::Snapshot(reply))?;
        response.recv().map_err(|_| PlaybackError::SessionClosed)
    }
}

pub struct PlaybackSession {
    handle: SessionHandle,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    /// Starts the control thread. `make_decoder` runs on that thread, so the
    /// decoder itself never has to cross threads.
    pub fn spawn<F, D>(make_decoder: F, config: SessionConfig) -> anyhow::Result<Self>
    where
        F: FnOnce() -> D + Send + 'static,
        D: DecoderHandle + 'static,
    {
        let (requests, inbox) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(String::from("lilt-control"))
            .spawn(move || {
                let decoder = make_decoder();
                let mut controller = match config.seed {
                    Some(seed) => PlaybackController::with_seed(decoder, seed),
                    None => PlaybackController::new(decoder),
                };
                controller.set_options(config.options);
                control_loop(controller, inbox, config.tick);
            })?;

        Ok(Self {
            handle: SessionHandle { requests },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stops the control thread and waits for it to release the decoder.
    pub fn shutdown(&mut self) {
        let _ = self.handle.send(SessionRequest::Shutdown);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("control thread panicked");
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn control_loop<D: DecoderHandle>(
    mut controller: PlaybackController<D>,
    inbox: Receiver<SessionRequest>,
    tick: Duration,
) {
    info!(output = ?controller.decoder().output_name(), "control thread started");
    loop {
        match inbox.recv_timeout(tick) {
            Ok(SessionRequest::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(request) => apply(&mut controller, request),
            Err(RecvTimeoutError::Timeout) => {}
        }
        controller.pump();
    }
    controller.shutdown();
    info!("control thread stopped");
}

fn apply<D: DecoderHandle>(controller: &mut PlaybackController<D>, request: SessionRequest) {
    match request {
        SessionRequest::Command(command) => controller.dispatch(command),
        SessionRequest::LoadQueue(tracks) => controller.load_queue(tracks),
        SessionRequest::PlayAt(index) => controller.play_at(index),
        SessionRequest::TogglePlayPause => controller.toggle_play_pause(),
        SessionRequest::ToggleShuffle => controller.toggle_shuffle(),
        SessionRequest::ToggleRepeat => controller.toggle_repeat(),
        SessionRequest::SetShuffle(enabled) => controller.set_shuffle(enabled),
        SessionRequest::SetRepeat(mode) => controller.set_repeat_mode(mode),
        SessionRequest::Seek(position) => {
            if let Err(err) = controller.seek_to(position) {
                debug!(%err, "seek rejected");
            }
        }
        SessionRequest::SetVolume(volume) => controller.set_volume(volume),
        SessionRequest::Attach(id, listener) => controller.attach_listener(id, listener),
        SessionRequest::Detach(id) => {
            controller.detach_listener(id);
        }
        SessionRequest::Snapshot(reply) => {
            let _ = reply.send(controller.snapshot());
        }
        SessionRequest::Shutdown => {}
    }
}
