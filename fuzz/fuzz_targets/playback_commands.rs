#![no_main]

use libfuzzer_sys::fuzz_target;
use lilt::audio::{DecoderEvent, NullDecoder};
use lilt::command::Command;
use lilt::controller::PlaybackController;
use lilt::model::Track;

fuzz_target!(|data: &[u8]| {
    let mut controller = PlaybackController::with_seed(NullDecoder::new(), 0);
    let len = data.first().map_or(0, |byte| usize::from(*byte % 16));
    controller.load_queue(
        (0..len)
            .map(|idx| Track::new(format!("track {idx}"), format!("track_{idx}.mp3")))
            .collect(),
    );

    for byte in data.iter().skip(1) {
        let generation = controller.generation();
        match byte % 10 {
            0..=3 => controller.dispatch(Command::ALL[usize::from(byte % 4)]),
            4 => controller.play_at(usize::from(byte / 10)),
            5 => controller.toggle_shuffle(),
            6 => controller.toggle_repeat(),
            7 => controller.on_decoder_event(DecoderEvent::Finished { generation }),
            8 => controller.on_decoder_event(DecoderEvent::LoadFailed {
                generation,
                reason: String::from("fuzz"),
            }),
            _ => controller.pump(),
        }

        if let Some(index) = controller.current_index() {
            assert!(index < controller.queue().len());
        }
    }
});
