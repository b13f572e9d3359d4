use proptest::prelude::*;
use serde_json::json;
use sha3::{Digest, Keccak256};
use zkbridge_core::{
    calculate_journal_hash, compute_journal_hash, normalize, normalize_value, HashResult,
};

fn keccak_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(bytes)))
}

fn embedded_input(bytes: &[u8]) -> String {
    let receipt = json!({"journal": {"bytes": bytes}}).to_string();
    json!({ "receipt": receipt }).to_string()
}

fn inline_input(bytes: &[u8]) -> String {
    json!({"receipt": {"journal": {"bytes": bytes}}}).to_string()
}

#[test]
fn embedded_receipt_scenario() {
    let result = calculate_journal_hash(r#"{"receipt": "{\"journal\":{\"bytes\":[1,2,3]}}"}"#);
    assert_eq!(
        result,
        HashResult {
            error: String::new(),
            hash: keccak_hex(&[1, 2, 3]),
        }
    );
}

#[test]
fn inline_empty_journal_scenario() {
    let result = calculate_journal_hash(r#"{"receipt": {"journal": {"bytes": []}}}"#);
    assert!(result.error.is_empty());
    assert_eq!(result.hash, keccak_hex(&[]));
}

#[test]
fn missing_journal_scenario() {
    let result = calculate_journal_hash(r#"{"receipt": {"seal": [0, 1]}}"#);
    assert!(result.error.starts_with("Error: "), "{result:?}");
    assert!(result.hash.is_empty());
    let printed: serde_json::Value =
        serde_json::from_str(&result.to_json_pretty()).expect("valid json");
    assert_eq!(printed["hash"], "");
}

#[test]
fn realistic_receipt_with_extra_fields() {
    let input = json!({
        "receipt": {
            "inner": {"Succinct": {"seal": [1, 2, 3, 4]}},
            "journal": {"bytes": [32, 0, 0, 0, 104, 101, 108, 108, 111]},
            "metadata": {"verifier_parameters": [0, 0, 0, 0]}
        },
        "image_id": "0x1234"
    });
    let receipt = normalize_value(input).expect("normalize");
    let result = compute_journal_hash(&receipt);
    assert_eq!(
        result.hash,
        keccak_hex(&[32, 0, 0, 0, 104, 101, 108, 108, 111])
    );
}

#[test]
fn trailing_zero_byte_changes_digest() {
    let a = calculate_journal_hash(&inline_input(&[7, 7, 7]));
    let b = calculate_journal_hash(&inline_input(&[7, 7, 7, 0]));
    assert!(a.is_success() && b.is_success());
    assert_ne!(a.hash, b.hash);
}

proptest! {
    #[test]
    fn encoding_does_not_affect_hash(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let embedded = calculate_journal_hash(&embedded_input(&bytes));
        let inline = calculate_journal_hash(&inline_input(&bytes));
        prop_assert!(embedded.is_success());
        prop_assert_eq!(&embedded, &inline);
        prop_assert_eq!(embedded.hash, keccak_hex(&bytes));
    }

    #[test]
    fn normalization_round_trips_across_encodings(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let embedded = normalize(&embedded_input(&bytes)).expect("embedded");
        let inline = normalize(&inline_input(&bytes)).expect("inline");
        prop_assert_eq!(&embedded, &inline);
        prop_assert_eq!(embedded.journal_bytes().expect("bytes"), bytes);
    }

    #[test]
    fn distinct_journals_hash_differently(
        a in proptest::collection::vec(any::<u8>(), 0..32),
        b in proptest::collection::vec(any::<u8>(), 0..32),
    ) {
        prop_assume!(a != b);
        let ha = calculate_journal_hash(&inline_input(&a));
        let hb = calculate_journal_hash(&inline_input(&b));
        prop_assert_ne!(ha.hash, hb.hash);
    }

    #[test]
    fn out_of_range_byte_is_reported(pos in 0usize..8, bad in 256u32..100_000) {
        let mut values: Vec<u32> = vec![1; 8];
        values[pos] = bad;
        let input = json!({"receipt": {"journal": {"bytes": values}}}).to_string();
        let result = calculate_journal_hash(&input);
        prop_assert!(result.hash.is_empty());
        let needle = format!("[{pos}]");
        prop_assert!(result.error.contains(&needle));
    }
}
