#![no_main]

use libfuzzer_sys::fuzz_target;
use zkbridge_core::{normalize, normalize_value};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(receipt) = normalize(raw) else {
        return;
    };
    // Re-wrapping the receipt inline must normalize to the same value.
    let inline = serde_json::json!({ "receipt": receipt.fields() });
    assert_eq!(normalize_value(inline).ok(), Some(receipt));
});
