use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The decoder could not open or prepare the source.
    #[error("failed to load {title}: {reason}")]
    LoadFailed { title: String, reason: String },

    #[error("queue is empty")]
    EmptyQueue,

    #[error("index {index} is outside a queue of {len} tracks")]
    IndexInvalid { index: usize, len: usize },

    #[error("no track loaded")]
    NoTrackLoaded,

    #[error("seek failed: {0}")]
    Seek(String),

    #[error("playback session has shut down")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
