use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Transport commands accepted from any actor (keyboard, tray menu, scripts).
///
/// Every source submits the same four names; none is privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Play,
    Pause,
    Next,
    Previous,
}

impl Command {
    pub const ALL: [Command; 4] = [Self::Play, Self::Pause, Self::Next, Self::Previous];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }

    /// The play/pause button shows whichever command would change the state.
    pub fn play_or_pause(is_playing: bool) -> Self {
        if is_playing { Self::Pause } else { Self::Play }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "next" => Ok(Self::Next),
            "previous" | "prev" => Ok(Self::Previous),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back_to_the_same_command() {
        for command in Command::ALL {
            assert_eq!(command.as_str().parse::<Command>(), Ok(command));
        }
    }

    #[test]
    fn parsing_is_case_insensitive_and_accepts_prev() {
        assert_eq!(" NEXT ".parse::<Command>(), Ok(Command::Next));
        assert_eq!("prev".parse::<Command>(), Ok(Command::Previous));
        assert!("stop".parse::<Command>().is_err());
    }

    #[test]
    fn play_or_pause_follows_state() {
        assert_eq!(Command::play_or_pause(true), Command::Pause);
        assert_eq!(Command::play_or_pause(false), Command::Play);
    }
}
