//! Receipt normalization.
//!
//! Upstream producers disagree on how the `receipt` field is shipped: some
//! serialize the receipt a second time and embed it as a JSON string, others
//! inline the object. Both shapes resolve to the same [`Receipt`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

pub const RECEIPT_FIELD: &str = "receipt";
pub const JOURNAL_FIELD: &str = "journal";
pub const BYTES_FIELD: &str = "bytes";

/// A resolved receipt record. Sibling fields are retained but never read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Receipt {
    fields: Map<String, Value>,
}

/// Runtime shape of the `receipt` field before resolution.
#[derive(Debug)]
enum ReceiptEncoding {
    Embedded(String),
    Inline(Map<String, Value>),
}

impl ReceiptEncoding {
    fn classify(value: Value) -> CoreResult<Self> {
        match value {
            Value::String(text) => Ok(Self::Embedded(text)),
            Value::Object(fields) => Ok(Self::Inline(fields)),
            other => Err(CoreError::Parse(format!(
                "`{RECEIPT_FIELD}` must be a JSON string or object, found {}",
                json_kind(&other)
            ))),
        }
    }

    fn resolve(self) -> CoreResult<Receipt> {
        match self {
            Self::Inline(fields) => Ok(Receipt { fields }),
            Self::Embedded(text) => {
                let inner: Value = serde_json::from_str(&text).map_err(|err| {
                    CoreError::Parse(format!("embedded receipt is not valid JSON: {err}"))
                })?;
                match inner {
                    Value::Object(fields) => Ok(Receipt { fields }),
                    other => Err(CoreError::Parse(format!(
                        "embedded receipt must decode to a JSON object, found {}",
                        json_kind(&other)
                    ))),
                }
            }
        }
    }
}

/// Parses raw input text and resolves its `receipt` field.
pub fn normalize(raw: &str) -> CoreResult<Receipt> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| CoreError::Parse(format!("input is not valid JSON: {err}")))?;
    normalize_value(value)
}

/// Same as [`normalize`] for input that is already parsed.
pub fn normalize_value(value: Value) -> CoreResult<Receipt> {
    let mut envelope = match value {
        Value::Object(map) => map,
        other => {
            return Err(CoreError::Parse(format!(
                "input must be a JSON object, found {}",
                json_kind(&other)
            )))
        }
    };
    let receipt = envelope.remove(RECEIPT_FIELD).ok_or_else(|| {
        CoreError::Parse(format!("input is missing the `{RECEIPT_FIELD}` field"))
    })?;
    ReceiptEncoding::classify(receipt)?.resolve()
}

impl Receipt {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Extracts `journal.bytes` as an ordered byte buffer.
    ///
    /// Elements must be integers in `[0, 255]`. Integral floats such as `7.0`
    /// are accepted since some serializers emit them; anything else is rejected
    /// with the offending index.
    pub fn journal_bytes(&self) -> CoreResult<Vec<u8>> {
        let journal = self.fields.get(JOURNAL_FIELD).ok_or_else(|| {
            CoreError::MalformedReceipt(format!("receipt is missing `{JOURNAL_FIELD}`"))
        })?;
        let journal = journal.as_object().ok_or_else(|| {
            CoreError::MalformedReceipt(format!(
                "`{JOURNAL_FIELD}` must be an object, found {}",
                json_kind(journal)
            ))
        })?;
        let bytes = journal.get(BYTES_FIELD).ok_or_else(|| {
            CoreError::MalformedReceipt(format!(
                "`{JOURNAL_FIELD}` is missing `{BYTES_FIELD}`"
            ))
        })?;
        let items = bytes.as_array().ok_or_else(|| {
            CoreError::MalformedReceipt(format!(
                "`{JOURNAL_FIELD}.{BYTES_FIELD}` must be an array, found {}",
                json_kind(bytes)
            ))
        })?;

        items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                byte_value(item).ok_or_else(|| {
                    CoreError::MalformedReceipt(format!(
                        "`{JOURNAL_FIELD}.{BYTES_FIELD}[{idx}]` is not an integer in [0, 255]: {item}"
                    ))
                })
            })
            .collect()
    }
}

impl TryFrom<Value> for Receipt {
    type Error = CoreError;

    /// Treats `value` as the receipt record itself, not the enclosing input.
    fn try_from(value: Value) -> CoreResult<Self> {
        ReceiptEncoding::classify(value)?.resolve()
    }
}

fn byte_value(item: &Value) -> Option<u8> {
    if let Some(v) = item.as_u64() {
        return u8::try_from(v).ok();
    }
    let f = item.as_f64()?;
    if f.fract() == 0.0 && (0.0..=255.0).contains(&f) {
        Some(f as u8)
    } else {
        None
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_and_inline_receipts_normalize_identically() {
        let embedded = normalize(r#"{"receipt": "{\"journal\":{\"bytes\":[1,2,3]}}"}"#).unwrap();
        let inline = normalize(r#"{"receipt": {"journal": {"bytes": [1, 2, 3]}}}"#).unwrap();
        assert_eq!(embedded, inline);
        assert_eq!(inline.journal_bytes().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn sibling_fields_are_passed_through() {
        let receipt = normalize_value(json!({
            "receipt": {"journal": {"bytes": []}, "seal": "abc"},
            "image_id": "deadbeef"
        }))
        .unwrap();
        assert_eq!(receipt.get("seal"), Some(&json!("abc")));
        assert!(receipt.get("image_id").is_none());
    }

    #[test]
    fn missing_receipt_is_a_parse_error() {
        let err = normalize(r#"{"proof": {}}"#).unwrap_err();
        assert!(matches!(err, CoreError::Parse(ref m) if m.contains("`receipt`")));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(normalize("{not json"), Err(CoreError::Parse(_))));
        assert!(matches!(normalize("[1, 2]"), Err(CoreError::Parse(_))));
    }

    #[test]
    fn receipt_of_wrong_shape_is_rejected() {
        let err = normalize(r#"{"receipt": 42}"#).unwrap_err();
        assert_eq!(
            err,
            CoreError::Parse("`receipt` must be a JSON string or object, found number".into())
        );
        let err = normalize(r#"{"receipt": "[1,2,3]"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Parse(ref m) if m.contains("found array")));
        let err = normalize(r#"{"receipt": "{broken"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Parse(ref m) if m.starts_with("embedded receipt")));
    }

    #[test]
    fn journal_bytes_rejects_out_of_range_values() {
        let receipt = Receipt::try_from(json!({"journal": {"bytes": [0, 255, 256]}})).unwrap();
        let err = receipt.journal_bytes().unwrap_err();
        assert!(matches!(err, CoreError::MalformedReceipt(ref m) if m.contains("[2]")));

        let receipt = Receipt::try_from(json!({"journal": {"bytes": [-1]}})).unwrap();
        assert!(receipt.journal_bytes().is_err());

        let receipt = Receipt::try_from(json!({"journal": {"bytes": [1.5]}})).unwrap();
        assert!(receipt.journal_bytes().is_err());

        let receipt = Receipt::try_from(json!({"journal": {"bytes": ["1"]}})).unwrap();
        assert!(receipt.journal_bytes().is_err());
    }

    #[test]
    fn journal_bytes_accepts_integral_floats() {
        let receipt = Receipt::try_from(json!({"journal": {"bytes": [7.0, 0.0, 255.0]}})).unwrap();
        assert_eq!(receipt.journal_bytes().unwrap(), vec![7, 0, 255]);
    }

    #[test]
    fn journal_bytes_reports_missing_layers() {
        let no_journal = Receipt::try_from(json!({"seal": []})).unwrap();
        assert_eq!(
            no_journal.journal_bytes().unwrap_err(),
            CoreError::MalformedReceipt("receipt is missing `journal`".into())
        );

        let string_journal = Receipt::try_from(json!({"journal": "0102"})).unwrap();
        assert!(matches!(
            string_journal.journal_bytes(),
            Err(CoreError::MalformedReceipt(ref m)) if m.contains("must be an object")
        ));

        let no_bytes = Receipt::try_from(json!({"journal": {}})).unwrap();
        assert!(no_bytes.journal_bytes().is_err());

        let string_bytes = Receipt::try_from(json!({"journal": {"bytes": "AQID"}})).unwrap();
        assert!(matches!(
            string_bytes.journal_bytes(),
            Err(CoreError::MalformedReceipt(ref m)) if m.contains("must be an array, found string")
        ));
    }
}
