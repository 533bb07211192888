#![no_main]

use libfuzzer_sys::fuzz_target;
use mediashelf::history::{History, decode_entries};
use mediashelf::kv::{KeyValueStore, MemoryStore};
use std::collections::HashSet;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data)
        && let Ok(entries) = decode_entries(text)
    {
        let mut seen = HashSet::new();
        assert!(entries.iter().all(|entry| seen.insert(entry.key.as_str())));
        assert!(entries.windows(2).all(|pair| pair[0].timestamp >= pair[1].timestamp));
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cap = (data.first().copied().unwrap_or(1) % 8) as usize + 1;
    let history = History::open(store.clone(), "video_history", cap);

    for byte in data {
        let key = format!("content://media/external/video/media/{}", byte % 12);
        match byte % 4 {
            0 | 1 => history.record(&key, None).expect("record"),
            2 => {
                history.remove(&key).expect("remove");
            }
            _ => history.clear().expect("clear"),
        }
        assert!(history.len() <= cap);
    }

    let reopened = History::open(store, "video_history", cap);
    assert_eq!(reopened.list(), history.list());
});
