use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::One,
            Self::One => Self::All,
            Self::All => Self::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "Repeat off",
            Self::One => "Repeat one",
            Self::All => "Repeat all",
        }
    }
}

/// A playable entry: display title plus the locator the decoder opens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    title: String,
    source: PathBuf,
}

impl Track {
    pub fn new(title: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Where the controller sits in the per-track lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Point-in-time view of the controller, used to resync a UI that attaches late.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub current_index: Option<usize>,
    pub current_title: Option<String>,
    pub is_playing: bool,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub phase: PlaybackPhase,
    pub queue_titles: Vec<String>,
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
    pub volume: f32,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub folder: Option<PathBuf>,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub avoid_shuffle_repeat: bool,
}

fn default_volume() -> f32 {
    1.0
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            folder: None,
            shuffle: false,
            repeat_mode: RepeatMode::Off,
            volume: default_volume(),
            avoid_shuffle_repeat: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_mode_cycles_through_all_three() {
        assert_eq!(RepeatMode::Off.next(), RepeatMode::One);
        assert_eq!(RepeatMode::One.next(), RepeatMode::All);
        assert_eq!(RepeatMode::All.next(), RepeatMode::Off);
        for mode in [RepeatMode::Off, RepeatMode::One, RepeatMode::All] {
            assert_eq!(mode.next().next().next(), mode);
        }
    }

    #[test]
    fn persisted_state_fills_missing_fields() {
        let state: PersistedState = serde_json::from_str(r#"{"shuffle":true}"#).expect("parse");
        assert!(state.shuffle);
        assert_eq!(state.repeat_mode, RepeatMode::Off);
        assert_eq!(state.volume, 1.0);
        assert_eq!(state.folder, None);
    }
}
