#![no_main]

use libfuzzer_sys::fuzz_target;
use pocketune::model::PlaybackMode;
use pocketune::queue::PlaybackQueue;

fuzz_target!(|data: &[u8]| {
    let mut queue = PlaybackQueue::new("/music");
    let len = data.first().map_or(0, |byte| usize::from(*byte % 32));
    queue.fill_with_library(len, "/music");
    let mut mode = PlaybackMode::Normal;

    for byte in data {
        match byte % 6 {
            0 => mode = mode.next(),
            1 => queue.select_next(),
            2 => queue.select_prev(),
            3 => {
                let _ = queue.set_playing(usize::from(*byte));
            }
            4 => {
                if let Some(pos) = queue.next_position(mode) {
                    assert!(pos < queue.len());
                    let _ = queue.set_playing(pos);
                }
            }
            _ => queue.reset_cursors(),
        }
        if !queue.is_empty() {
            assert!(queue.selected() < queue.len());
            assert!(queue.playing() < queue.len());
        }
    }
});
