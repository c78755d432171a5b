#![no_main]
use libfuzzer_sys::fuzz_target;
use slogrun_core::{ClassifierConfig, MemorySink, RunTracker};

// Arbitrary input may fail to track, but must never panic.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut tracker = RunTracker::new(ClassifierConfig::default(), ["timer"], MemorySink::default());
    for line in text.lines() {
        if tracker.ingest(line).is_err() {
            break;
        }
    }
});
