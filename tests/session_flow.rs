mod common;

use common::{recorder, write_test_wav};
use lilt::audio::NullDecoder;
use lilt::command::Command;
use lilt::library::scan_folder;
use lilt::model::{PlaybackPhase, PlaybackSnapshot};
use lilt::notify::{NotificationPresenter, NotificationSurface, TransportNotification};
use lilt::session::{PlaybackSession, SessionConfig, SessionHandle};
use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{TempDir, tempdir};

fn fixture_folder(lengths_ms: &[u32]) -> TempDir {
    let dir = tempdir().expect("tempdir");
    for (index, length) in lengths_ms.iter().enumerate() {
        write_test_wav(&dir.path().join(format!("{index:02}.wav")), *length);
    }
    dir
}

fn session() -> PlaybackSession {
    PlaybackSession::spawn(NullDecoder::new, SessionConfig::default()).expect("spawn session")
}

fn wait_for(
    handle: &SessionHandle,
    what: impl Fn(&PlaybackSnapshot) -> bool,
) -> PlaybackSnapshot {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = handle.snapshot().expect("snapshot");
        if what(&snapshot) || Instant::now() > deadline {
            return snapshot;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn queue_plays_through_with_no_listener_attached() {
    let folder = fixture_folder(&[400, 60, 60]);
    let session = session();
    let handle = session.handle();
    handle
        .load_queue(scan_folder(folder.path()).expect("scan"))
        .expect("load");

    let (seen, listener) = recorder();
    let id = handle.attach(listener).expect("attach");
    handle.play_at(0).expect("play");
    let first = wait_for(&handle, |s| s.current_index == Some(0) && s.is_playing);
    assert_eq!(first.current_title.as_deref(), Some("00"));
    handle.detach(id).expect("detach");

    let done = wait_for(&handle, |s| {
        s.current_index == Some(2) && s.phase == PlaybackPhase::Idle
    });
    assert_eq!(done.current_index, Some(2));
    assert_eq!(done.phase, PlaybackPhase::Idle);
    assert!(!done.is_playing);

    let seen_while_attached = seen.lock().expect("lock").len();
    assert!(seen_while_attached >= 1);

    let (replayed, listener) = recorder();
    handle.attach(listener).expect("reattach");
    let _ = handle.snapshot().expect("sync");
    let replayed = replayed.lock().expect("lock").clone();
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].title(), Some("02"));
    assert!(!replayed[0].is_playing());
    assert_eq!(seen.lock().expect("lock").len(), seen_while_attached);
}

#[test]
fn unreadable_file_is_skipped_without_audio() {
    let folder = fixture_folder(&[5_000]);
    fs::write(folder.path().join("01.wav"), b"not a wave file").expect("write");
    write_test_wav(&folder.path().join("02.wav"), 5_000);

    let session = session();
    let handle = session.handle();
    handle
        .load_queue(scan_folder(folder.path()).expect("scan"))
        .expect("load");
    handle.play_at(1).expect("play");

    let skipped = wait_for(&handle, |s| s.current_index == Some(2) && s.is_playing);
    assert_eq!(skipped.current_title.as_deref(), Some("02"));
    assert_eq!(skipped.phase, PlaybackPhase::Playing);
}

#[derive(Clone, Default)]
struct SharedSurface {
    shown: Arc<Mutex<Vec<TransportNotification>>>,
}

impl NotificationSurface for SharedSurface {
    fn show(&mut self, notification: &TransportNotification) {
        self.shown.lock().expect("lock").push(notification.clone());
    }
}

#[test]
fn notification_actions_drive_the_same_controller() {
    let folder = fixture_folder(&[5_000, 5_000]);
    let session = session();
    let handle = session.handle();
    handle
        .load_queue(scan_folder(folder.path()).expect("scan"))
        .expect("load");

    let surface = SharedSurface::default();
    handle
        .attach(Box::new(NotificationPresenter::new(surface.clone())))
        .expect("attach");

    handle.submit(Command::Play).expect("play");
    wait_for(&handle, |s| s.is_playing);

    let pause = surface.shown.lock().expect("lock").last().map(|n| n.actions[1]);
    assert_eq!(pause, Some(Command::Pause));
    handle.submit(Command::Pause).expect("pause");
    let paused = wait_for(&handle, |s| s.phase == PlaybackPhase::Paused);
    assert!(!paused.is_playing);

    let next = surface.shown.lock().expect("lock").last().map(|n| n.actions[2]);
    handle.submit(next.expect("notification shown")).expect("next");
    let moved = wait_for(&handle, |s| s.current_index == Some(1) && s.is_playing);
    assert_eq!(moved.current_title.as_deref(), Some("01"));

    let shown = surface.shown.lock().expect("lock").clone();
    let states: Vec<(String, bool)> = shown
        .into_iter()
        .map(|n| (n.title, n.is_playing))
        .collect();
    assert_eq!(
        states,
        vec![
            (String::from("00"), true),
            (String::from("00"), false),
            (String::from("01"), true),
        ]
    );
}

#[test]
fn dropping_the_session_closes_every_handle() {
    let session = session();
    let handle = session.handle();
    let tray_handle = handle.clone();
    drop(session);

    assert!(handle.submit(Command::Next).is_err());
    assert!(tray_handle.snapshot().is_err());
}
