#![no_main]

use libfuzzer_sys::fuzz_target;
use pocketune::cache::PathCache;

fuzz_target!(|data: &[u8]| {
    let capacity = data.first().map_or(1, |byte| usize::from(*byte % 8));
    let mut cache = PathCache::new(capacity);

    for pair in data.chunks(2) {
        let song = usize::from(pair.get(1).copied().unwrap_or_default() % 16);
        match pair[0] % 3 {
            0 => cache.insert(song, format!("/music/{song}.mp3")),
            1 => {
                if let Some(path) = cache.get(song) {
                    assert_eq!(path, format!("/music/{song}.mp3"));
                }
            }
            _ => cache.clear(),
        }
        assert!(cache.len() <= cache.capacity());
    }
});
