#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing the positions document must never panic: malformed input is
    // rejected as StoreUnavailable, and accepted stores must uphold the
    // resolve contract.
    if let Ok(store) = barbot_core::PositionStore::from_json(data) {
        let _ = store.resolve("left");
        let _ = store.resolve("0");
        for p in store.positions() {
            assert!(p.offset >= 0);
        }
    }
});
