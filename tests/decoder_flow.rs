mod common;

use common::write_test_wav;
use lilt::audio::{DecoderEvent, DecoderHandle, Generation, NullDecoder};
use lilt::model::Track;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn loaded(decoder: &mut NullDecoder, path: &Path) -> Generation {
    let generation = Generation::default().next();
    decoder.load(&Track::new("fixture", path), generation);
    match decoder.poll_event() {
        Some(DecoderEvent::Ready { generation: got, .. }) => assert_eq!(got, generation),
        other => panic!("expected ready, got {other:?}"),
    }
    generation
}

#[test]
fn load_reports_ready_with_its_generation() {
    let dir = tempdir().expect("tempdir");
    let track = dir.path().join("fixture.wav");
    write_test_wav(&track, 500);

    let mut decoder = NullDecoder::new();
    loaded(&mut decoder, &track);
    assert!(!decoder.is_playing(), "ready is not playing until started");
    decoder.start();
    assert!(decoder.is_playing());
}

#[test]
fn pause_and_resume_control_position_progression() {
    let dir = tempdir().expect("tempdir");
    let track = dir.path().join("fixture.wav");
    write_test_wav(&track, 2_000);

    let mut decoder = NullDecoder::new();
    loaded(&mut decoder, &track);
    decoder.start();
    thread::sleep(Duration::from_millis(20));

    decoder.pause();
    let paused = decoder.position().expect("position");
    thread::sleep(Duration::from_millis(20));
    assert_eq!(decoder.position().expect("position"), paused);
    assert!(!decoder.is_playing());

    decoder.resume();
    thread::sleep(Duration::from_millis(20));
    assert!(decoder.position().expect("position") > paused);
}

#[test]
fn finishes_once_when_known_duration_elapses() {
    let dir = tempdir().expect("tempdir");
    let track = dir.path().join("fixture.wav");
    write_test_wav(&track, 80);

    let mut decoder = NullDecoder::new();
    let generation = loaded(&mut decoder, &track);
    assert!(decoder.duration().expect("duration") >= Duration::from_millis(70));
    decoder.start();

    thread::sleep(Duration::from_millis(150));
    assert_eq!(
        decoder.poll_event(),
        Some(DecoderEvent::Finished { generation })
    );
    assert_eq!(decoder.poll_event(), None, "finished is reported once");
    assert!(!decoder.is_playing());
}
