mod engine;
mod null;

pub use engine::RodioDecoder;
pub use null::NullDecoder;

use crate::error::Result;
use crate::model::Track;
#[cfg(unix)]
use std::ffi::CString;
use std::time::Duration;

pub const MAX_VOLUME: f32 = 2.5;

/// Load epoch. Every load request gets a fresh value; events stamped with an
/// older one belong to a superseded load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEvent {
    Ready {
        generation: Generation,
        duration: Option<Duration>,
    },
    LoadFailed {
        generation: Generation,
        reason: String,
    },
    /// End of stream. Emitted at most once per load.
    Finished { generation: Generation },
    /// The output stopped without a controller command.
    Paused { generation: Generation },
    /// The output restarted without a controller command.
    Resumed { generation: Generation },
}

impl DecoderEvent {
    pub fn generation(&self) -> Generation {
        match self {
            Self::Ready { generation, .. }
            | Self::LoadFailed { generation, .. }
            | Self::Finished { generation }
            | Self::Paused { generation }
            | Self::Resumed { generation } => *generation,
        }
    }
}

/// Owns the single native decode/playback resource.
///
/// `load` is the only asynchronous operation: its outcome is reported later
/// through [`DecoderHandle::poll_event`] as `Ready` or `LoadFailed`, stamped with
/// the generation passed in. Events are polled from the control thread, so
/// implementations that decode elsewhere must queue results until polled.
pub trait DecoderHandle {
    fn load(&mut self, track: &Track, generation: Generation);
    fn start(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn is_playing(&self) -> bool;
    /// Drops the loaded or pending resource. Safe to call repeatedly.
    fn release(&mut self);
    fn poll_event(&mut self) -> Option<DecoderEvent>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn output_name(&self) -> Option<String>;
}

impl<D: DecoderHandle + ?Sized> DecoderHandle for Box<D> {
    fn load(&mut self, track: &Track, generation: Generation) {
        (**self).load(track, generation);
    }

    fn start(&mut self) {
        (**self).start();
    }

    fn pause(&mut self) {
        (**self).pause();
    }

    fn resume(&mut self) {
        (**self).resume();
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        (**self).seek_to(position)
    }

    fn position(&self) -> Option<Duration> {
        (**self).position()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }

    fn release(&mut self) {
        (**self).release();
    }

    fn poll_event(&mut self) -> Option<DecoderEvent> {
        (**self).poll_event()
    }

    fn volume(&self) -> f32 {
        (**self).volume()
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume);
    }

    fn output_name(&self) -> Option<String> {
        (**self).output_name()
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_increments_and_compares() {
        let first = Generation::default();
        let second = first.next();
        assert_ne!(first, second);
        assert!(second > first);
        assert_eq!(second.value(), 1);
    }

    #[test]
    fn event_reports_its_generation() {
        let generation = Generation::default().next().next();
        let event = DecoderEvent::LoadFailed {
            generation,
            reason: String::from("bad header"),
        };
        assert_eq!(event.generation(), generation);
    }
}
