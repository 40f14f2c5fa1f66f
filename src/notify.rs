//! Persistent transport notification.
//!
//! The presenter is an ordinary playback listener: it turns each transition
//! into a notification model and hands it to a surface. Button presses on the
//! surface go back through the session as plain commands, exactly like the
//! keyboard does.

use crate::command::Command;
use crate::listener::{PlaybackEvent, PlaybackListener};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportNotification {
    pub title: String,
    pub is_playing: bool,
    /// Previous, play or pause, next.
    pub actions: [Command; 3],
}

impl TransportNotification {
    pub fn new(title: impl Into<String>, is_playing: bool) -> Self {
        Self {
            title: title.into(),
            is_playing,
            actions: [
                Command::Previous,
                Command::play_or_pause(is_playing),
                Command::Next,
            ],
        }
    }

    pub fn from_event(event: &PlaybackEvent) -> Option<Self> {
        match event {
            PlaybackEvent::Transition { track, is_playing } => {
                Some(Self::new(track.title(), *is_playing))
            }
            PlaybackEvent::AllTracksFailed => None,
        }
    }

    pub fn status_line(&self) -> String {
        let state = if self.is_playing { "Playing" } else { "Paused" };
        format!("{state}: {}", self.title)
    }
}

pub trait NotificationSurface: Send {
    fn show(&mut self, notification: &TransportNotification);

    fn alert(&mut self, message: &str) {
        warn!(message, "notification alert");
    }
}

pub struct NotificationPresenter<S> {
    surface: S,
    last: Option<TransportNotification>,
}

impl<S: NotificationSurface> NotificationPresenter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            last: None,
        }
    }

    pub fn last(&self) -> Option<&TransportNotification> {
        self.last.as_ref()
    }
}

impl<S: NotificationSurface> PlaybackListener for NotificationPresenter<S> {
    fn on_playback_event(&mut self, event: &PlaybackEvent) {
        let Some(notification) = TransportNotification::from_event(event) else {
            self.surface.alert("No playable tracks in this folder");
            return;
        };
        if self.last.as_ref() == Some(&notification) {
            return;
        }
        self.surface.show(&notification);
        self.last = Some(notification);
    }
}

/// Writes transitions to the log; used when no desktop tray is available.
#[derive(Debug, Default)]
pub struct LogSurface;

impl NotificationSurface for LogSurface {
    fn show(&mut self, notification: &TransportNotification) {
        info!(status = %notification.status_line(), "now playing");
    }
}

#[cfg(target_os = "linux")]
pub use tray::TraySurface;

#[cfg(target_os = "linux")]
mod tray {
    use super::{NotificationSurface, TransportNotification};
    use crate::command::Command;
    use crate::session::SessionHandle;
    use ksni::blocking::TrayMethods;
    use ksni::menu::StandardItem;
    use tracing::debug;

    pub struct TrayModel {
        session: SessionHandle,
        title: String,
        is_playing: bool,
    }

    impl TrayModel {
        fn send(&self, command: Command) {
            if let Err(err) = self.session.submit(command) {
                debug!(%err, %command, "tray command dropped");
            }
        }

        fn item(
            label: &str,
            command: impl Fn(&TrayModel) -> Command + Send + 'static,
        ) -> ksni::MenuItem<Self> {
            StandardItem {
                label: label.to_string(),
                activate: Box::new(move |tray: &mut TrayModel| {
                    let command = command(tray);
                    tray.send(command);
                }),
                ..Default::default()
            }
            .into()
        }
    }

    impl ksni::Tray for TrayModel {
        fn id(&self) -> String {
            String::from("lilt")
        }

        fn title(&self) -> String {
            if self.title.is_empty() {
                String::from("lilt")
            } else {
                self.title.clone()
            }
        }

        fn icon_name(&self) -> String {
            let icon = if self.is_playing {
                "media-playback-start"
            } else {
                "media-playback-pause"
            };
            icon.to_string()
        }

        fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
            let play_pause = if self.is_playing { "Pause" } else { "Play" };
            vec![
                Self::item("Previous", |_| Command::Previous),
                Self::item(play_pause, |tray| Command::play_or_pause(tray.is_playing)),
                Self::item("Next", |_| Command::Next),
            ]
        }
    }

    /// StatusNotifierItem tray icon whose menu mirrors the notification actions.
    pub struct TraySurface {
        handle: ksni::blocking::Handle<TrayModel>,
    }

    impl TraySurface {
        pub fn spawn(session: SessionHandle) -> anyhow::Result<Self> {
            let model = TrayModel {
                session,
                title: String::new(),
                is_playing: false,
            };
            let handle = model
                .spawn()
                .map_err(|err| anyhow::anyhow!("failed to register tray icon: {err}"))?;
            Ok(Self { handle })
        }
    }

    impl NotificationSurface for TraySurface {
        fn show(&mut self, notification: &TransportNotification) {
            let title = notification.title.clone();
            let is_playing = notification.is_playing;
            let _ = self.handle.update(move |tray: &mut TrayModel| {
                tray.title = title;
                tray.is_playing = is_playing;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Track;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recording {
        shown: Arc<Mutex<Vec<TransportNotification>>>,
        alerts: Arc<Mutex<Vec<String>>>,
    }

    impl NotificationSurface for Recording {
        fn show(&mut self, notification: &TransportNotification) {
            self.shown.lock().expect("lock").push(notification.clone());
        }

        fn alert(&mut self, message: &str) {
            self.alerts.lock().expect("lock").push(message.to_string());
        }
    }

    fn transition(title: &str, is_playing: bool) -> PlaybackEvent {
        PlaybackEvent::Transition {
            track: Track::new(title, format!("/music/{title}.flac")),
            is_playing,
        }
    }

    #[test]
    fn middle_action_reflects_playing_state() {
        assert_eq!(
            TransportNotification::new("a", true).actions,
            [Command::Previous, Command::Pause, Command::Next]
        );
        assert_eq!(
            TransportNotification::new("a", false).actions,
            [Command::Previous, Command::Play, Command::Next]
        );
    }

    #[test]
    fn presenter_shows_each_distinct_transition_once() {
        let surface = Recording::default();
        let mut presenter = NotificationPresenter::new(surface.clone());

        presenter.on_playback_event(&transition("a", true));
        presenter.on_playback_event(&transition("a", true));
        presenter.on_playback_event(&transition("a", false));
        presenter.on_playback_event(&transition("b", true));

        let shown = surface.shown.lock().expect("lock");
        let titles: Vec<(&str, bool)> = shown
            .iter()
            .map(|n| (n.title.as_str(), n.is_playing))
            .collect();
        assert_eq!(titles, vec![("a", true), ("a", false), ("b", true)]);
        assert_eq!(presenter.last().map(|n| n.title.as_str()), Some("b"));
    }

    #[test]
    fn all_failed_raises_alert_and_keeps_last_notification() {
        let surface = Recording::default();
        let mut presenter = NotificationPresenter::new(surface.clone());
        presenter.on_playback_event(&transition("a", false));
        presenter.on_playback_event(&PlaybackEvent::AllTracksFailed);

        assert_eq!(surface.alerts.lock().expect("lock").len(), 1);
        assert_eq!(surface.shown.lock().expect("lock").len(), 1);
        assert!(presenter.last().is_some());
    }

    #[test]
    fn status_line_names_state_and_title() {
        assert_eq!(
            TransportNotification::new("Song", false).status_line(),
            "Paused: Song"
        );
    }
}
