use crate::audio::{DecoderHandle, MAX_VOLUME, NullDecoder, RodioDecoder};
use crate::command::Command;
use crate::config;
use crate::controller::ControllerOptions;
use crate::library;
use crate::listener::{ListenerId, PlaybackEvent};
use crate::model::{PersistedState, PlaybackSnapshot};
use crate::notify::{LogSurface, NotificationPresenter};
use crate::session::{PlaybackSession, SessionConfig, SessionHandle, SessionRequest};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const REFRESH_INTERVAL: Duration = Duration::from_millis(250);
const SEEK_STEP: Duration = Duration::from_secs(5);
const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct AppStartupOptions {
    pub folder: Option<PathBuf>,
    pub no_audio: bool,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Default)]
pub struct AppView {
    pub snapshot: PlaybackSnapshot,
    pub selected: usize,
    pub folder: Option<PathBuf>,
    pub status: String,
    pub command_mode: bool,
    pub command_buffer: String,
}

impl AppView {
    fn select_next(&mut self) {
        let len = self.snapshot.queue_titles.len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn apply_event(&mut self, event: &PlaybackEvent) {
        self.status = match event {
            PlaybackEvent::Transition { track, is_playing } => {
                let state = if *is_playing { "Playing" } else { "Paused" };
                format!("{state}: {}", track.title())
            }
            PlaybackEvent::AllTracksFailed => String::from("No playable tracks in this folder"),
        };
    }
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let state = match config::load_state() {
        Ok(state) => state,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "ignoring unreadable state file");
            PersistedState::default()
        }
    };

    let no_audio = options.no_audio;
    let session = PlaybackSession::spawn(
        move || open_decoder(no_audio),
        SessionConfig {
            options: ControllerOptions {
                avoid_immediate_repeat: state.avoid_shuffle_repeat,
            },
            ..SessionConfig::default()
        },
    )?;
    let handle = session.handle();
    handle.send(SessionRequest::SetShuffle(state.shuffle))?;
    handle.send(SessionRequest::SetRepeat(state.repeat_mode))?;
    handle.set_volume(state.volume)?;

    let mut view = AppView::default();
    if let Some(folder) = options.folder.or_else(|| state.folder.clone()) {
        open_folder(&handle, &mut view, &folder);
    }

    attach_notification(&handle)?;
    let (ui_events, ui_inbox) = mpsc::channel();
    let ui_listener = handle.attach(Box::new(move |event: &PlaybackEvent| {
        let _ = ui_events.send(event.clone());
    }))?;

    let result = run_terminal(&handle, &mut view, &ui_inbox);

    let _ = handle.detach(ui_listener);
    let save_result = persist(&handle, &view, &state);
    drop(session);
    result?;
    save_result?;
    Ok(())
}

fn open_decoder(no_audio: bool) -> Box<dyn DecoderHandle> {
    if no_audio {
        return Box::new(NullDecoder::new());
    }
    match RodioDecoder::new() {
        Ok(decoder) => Box::new(decoder),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "no audio output, continuing silently");
            Box::new(NullDecoder::new())
        }
    }
}

#[cfg(target_os = "linux")]
fn attach_notification(handle: &SessionHandle) -> Result<ListenerId> {
    use crate::notify::TraySurface;
    let id = match TraySurface::spawn(handle.clone()) {
        Ok(surface) => handle.attach(Box::new(NotificationPresenter::new(surface)))?,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "tray unavailable, logging transitions instead");
            handle.attach(Box::new(NotificationPresenter::new(LogSurface)))?
        }
    };
    Ok(id)
}

#[cfg(not(target_os = "linux"))]
fn attach_notification(handle: &SessionHandle) -> Result<ListenerId> {
    Ok(handle.attach(Box::new(NotificationPresenter::new(LogSurface)))?)
}

fn open_folder(handle: &SessionHandle, view: &mut AppView, folder: &Path) {
    let folder = config::normalize_path(folder);
    match library::scan_folder(&folder) {
        Ok(tracks) => {
            view.status = format!("Loaded {} tracks", tracks.len());
            view.selected = 0;
            view.folder = Some(folder);
            if let Err(err) = handle.load_queue(tracks) {
                view.status = format!("playback error: {err}");
            }
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "folder scan failed");
            view.status = format!("scan error: {err:#}");
        }
    }
}

fn persist(handle: &SessionHandle, view: &AppView, previous: &PersistedState) -> Result<()> {
    let snapshot = handle.snapshot().unwrap_or_else(|_| view.snapshot.clone());
    let state = PersistedState {
        folder: view.folder.clone().or_else(|| previous.folder.clone()),
        shuffle: snapshot.shuffle,
        repeat_mode: snapshot.repeat_mode,
        volume: snapshot.volume,
        avoid_shuffle_repeat: previous.avoid_shuffle_repeat,
    };
    config::save_state(&state)?;
    info!("state saved");
    Ok(())
}

fn run_terminal(
    handle: &SessionHandle,
    view: &mut AppView,
    ui_inbox: &Receiver<PlaybackEvent>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, handle, view, ui_inbox);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    handle: &SessionHandle,
    view: &mut AppView,
    ui_inbox: &Receiver<PlaybackEvent>,
) -> Result<()> {
    let mut dirty = true;
    let mut last_refresh = Instant::now();

    loop {
        while let Ok(event) = ui_inbox.try_recv() {
            view.apply_event(&event);
            dirty = true;
        }

        if dirty || last_refresh.elapsed() > REFRESH_INTERVAL {
            view.snapshot = handle.snapshot()?;
            let len = view.snapshot.queue_titles.len();
            view.selected = view.selected.min(len.saturating_sub(1));
            terminal.draw(|frame| crate::ui::draw(frame, view))?;
            dirty = false;
            last_refresh = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        dirty = true;

        if view.command_mode {
            match key.code {
                KeyCode::Esc => {
                    view.command_mode = false;
                    view.command_buffer.clear();
                }
                KeyCode::Enter => {
                    let raw = std::mem::take(&mut view.command_buffer);
                    view.command_mode = false;
                    run_command(handle, view, &raw)?;
                }
                KeyCode::Backspace => {
                    view.command_buffer.pop();
                }
                KeyCode::Char(ch) => view.command_buffer.push(ch),
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Down => view.select_next(),
            KeyCode::Up => view.select_prev(),
            KeyCode::Enter => handle.play_at(view.selected)?,
            KeyCode::Char(' ') => handle.toggle_play_pause()?,
            KeyCode::Char('n') => handle.submit(Command::Next)?,
            KeyCode::Char('p') => handle.submit(Command::Previous)?,
            KeyCode::Char('s') => handle.toggle_shuffle()?,
            KeyCode::Char('r') => handle.toggle_repeat()?,
            KeyCode::Right => seek_by(handle, view, SEEK_STEP, true)?,
            KeyCode::Left => seek_by(handle, view, SEEK_STEP, false)?,
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let next = (view.snapshot.volume + VOLUME_STEP).clamp(0.0, MAX_VOLUME);
                handle.set_volume(next)?;
                view.status = format!("Volume: {}%", (next * 100.0).round() as u16);
            }
            KeyCode::Char('-') => {
                let next = (view.snapshot.volume - VOLUME_STEP).clamp(0.0, MAX_VOLUME);
                handle.set_volume(next)?;
                view.status = format!("Volume: {}%", (next * 100.0).round() as u16);
            }
            KeyCode::Char(':') => view.command_mode = true,
            _ => {}
        }
    }
}

fn seek_by(handle: &SessionHandle, view: &AppView, step: Duration, forward: bool) -> Result<()> {
    let Some(position) = view.snapshot.position else {
        return Ok(());
    };
    let target = if forward {
        position.saturating_add(step)
    } else {
        position.saturating_sub(step)
    };
    let target = view
        .snapshot
        .duration
        .map_or(target, |duration| target.min(duration));
    handle.seek_to(target)?;
    Ok(())
}

fn run_command(handle: &SessionHandle, view: &mut AppView, raw: &str) -> Result<()> {
    let input = raw.trim();
    if input.is_empty() {
        view.status = String::from("No command");
        return Ok(());
    }

    let mut split = input.splitn(2, char::is_whitespace);
    let name = split.next().unwrap_or_default();
    let rest = split.next().unwrap_or("").trim();

    match name {
        "help" => {
            view.status = String::from(
                "Commands: play | pause | next | previous | open <folder> | seek <seconds> | volume <percent>",
            );
        }
        "open" => {
            if rest.is_empty() {
                view.status = String::from("Usage: open <folder>");
            } else {
                open_folder(handle, view, Path::new(rest));
            }
        }
        "seek" => match rest.parse::<u64>() {
            Ok(seconds) => handle.seek_to(Duration::from_secs(seconds))?,
            Err(_) => view.status = String::from("Usage: seek <seconds>"),
        },
        "volume" => match rest.trim_end_matches('%').parse::<f32>() {
            Ok(percent) => {
                let volume = (percent / 100.0).clamp(0.0, MAX_VOLUME);
                handle.set_volume(volume)?;
                view.status = format!("Volume: {}%", (volume * 100.0).round() as u16);
            }
            Err(_) => view.status = String::from("Usage: volume <percent>"),
        },
        other => match other.parse::<Command>() {
            Ok(command) => handle.submit(command)?,
            Err(err) => view.status = format!("{err} (try :help)"),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Track;

    fn view_with(titles: &[&str]) -> AppView {
        AppView {
            snapshot: PlaybackSnapshot {
                queue_titles: titles.iter().map(|title| title.to_string()).collect(),
                ..PlaybackSnapshot::default()
            },
            ..AppView::default()
        }
    }

    #[test]
    fn selection_stays_within_queue() {
        let mut view = view_with(&["a", "b"]);
        view.select_prev();
        assert_eq!(view.selected, 0);
        view.select_next();
        view.select_next();
        assert_eq!(view.selected, 1);
    }

    #[test]
    fn events_update_status_line() {
        let mut view = AppView::default();
        view.apply_event(&PlaybackEvent::Transition {
            track: Track::new("Song", "song.mp3"),
            is_playing: false,
        });
        assert_eq!(view.status, "Paused: Song");
        view.apply_event(&PlaybackEvent::AllTracksFailed);
        assert!(view.status.contains("No playable tracks"));
    }

    #[test]
    fn unknown_command_is_reported() {
        let session =
            PlaybackSession::spawn(NullDecoder::new, SessionConfig::default()).expect("session");
        let handle = session.handle();
        let mut view = AppView::default();
        run_command(&handle, &mut view, "rewind").expect("command");
        assert!(view.status.contains("unknown command rewind"));

        run_command(&handle, &mut view, "next").expect("command");
        run_command(&handle, &mut view, "open").expect("command");
        assert_eq!(view.status, "Usage: open <folder>");
    }
}
