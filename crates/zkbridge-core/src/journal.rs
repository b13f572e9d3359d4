//! Journal hash calculation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::{Digest32, JournalDigest, Keccak256Digest};
use crate::error::{CoreError, CoreResult};
use crate::receipt::{normalize, Receipt};

pub const HASH_PREFIX: &str = "0x";
pub const ERROR_PREFIX: &str = "Error: ";

/// Outcome of a journal hash calculation. Exactly one field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResult {
    pub error: String,
    pub hash: String,
}

impl HashResult {
    pub fn success(digest: &[u8]) -> Self {
        Self {
            error: String::new(),
            hash: format!("{HASH_PREFIX}{}", hex::encode(digest)),
        }
    }

    pub fn failure(err: &CoreError) -> Self {
        Self::failure_message(err)
    }

    /// Failure record for errors raised outside the hashing pipeline, such as
    /// reading the input.
    pub fn failure_message(message: impl fmt::Display) -> Self {
        Self {
            error: format!("{ERROR_PREFIX}{message}"),
            hash: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty() && !self.hash.is_empty()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": {:?}, \"hash\": {:?}}}",
                self.error, self.hash
            )
        })
    }
}

/// Hashes `receipt.journal.bytes` with keccak256.
pub fn compute_journal_hash(receipt: &Receipt) -> HashResult {
    compute_journal_hash_with(receipt, &Keccak256Digest)
}

pub fn compute_journal_hash_with(receipt: &Receipt, digest: &dyn JournalDigest) -> HashResult {
    match journal_digest(receipt, digest) {
        Ok(out) => HashResult::success(&out),
        Err(err) => {
            tracing::debug!(target: "zkbridge.hash", algorithm = digest.algorithm(), error = %err, "journal hash failed");
            HashResult::failure(&err)
        }
    }
}

/// Normalizes raw input text and hashes its journal with keccak256.
pub fn calculate_journal_hash(raw: &str) -> HashResult {
    calculate_journal_hash_with(raw, &Keccak256Digest)
}

pub fn calculate_journal_hash_with(raw: &str, digest: &dyn JournalDigest) -> HashResult {
    match normalize(raw) {
        Ok(receipt) => compute_journal_hash_with(&receipt, digest),
        Err(err) => {
            tracing::debug!(target: "zkbridge.hash", error = %err, "receipt normalization failed");
            HashResult::failure(&err)
        }
    }
}

fn journal_digest(receipt: &Receipt, digest: &dyn JournalDigest) -> CoreResult<Digest32> {
    let bytes = receipt.journal_bytes()?;
    digest.digest(&bytes)
}
