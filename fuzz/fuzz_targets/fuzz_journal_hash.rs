#![no_main]

use libfuzzer_sys::fuzz_target;
use zkbridge_core::{calculate_journal_hash, HashResult};

fuzz_target!(|data: &[u8]| {
    let embedded = serde_json::json!({
        "receipt": serde_json::json!({ "journal": { "bytes": data } }).to_string()
    });
    let result: HashResult = calculate_journal_hash(&embedded.to_string());
    assert!(result.is_success());
    assert_eq!(result.hash.len(), 66);

    if let Ok(raw) = std::str::from_utf8(data) {
        let result = calculate_journal_hash(raw);
        assert_ne!(result.error.is_empty(), result.hash.is_empty());
    }
});
