use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;

use crate::error::{CoreError, CoreResult};

pub const DIGEST_LEN: usize = 32;

pub type Digest32 = [u8; DIGEST_LEN];

/// Fixed-length digest over an exact byte buffer.
///
/// Implementations must be pure: identical input yields identical output.
pub trait JournalDigest: Send + Sync {
    fn algorithm(&self) -> &'static str;

    fn digest(&self, bytes: &[u8]) -> CoreResult<Digest32>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keccak256Digest;

impl JournalDigest for Keccak256Digest {
    fn algorithm(&self) -> &'static str {
        "keccak256"
    }

    fn digest(&self, bytes: &[u8]) -> CoreResult<Digest32> {
        let mut h = Keccak256::new();
        h.update(bytes);
        Ok(h.finalize().into())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256Digest;

impl JournalDigest for Sha256Digest {
    fn algorithm(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, bytes: &[u8]) -> CoreResult<Digest32> {
        let mut h = Sha256::new();
        h.update(bytes);
        Ok(h.finalize().into())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Keccak256,
    Sha256,
}

impl DigestAlgorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keccak256 => "keccak256",
            Self::Sha256 => "sha256",
        }
    }

    pub fn digest_impl(self) -> &'static dyn JournalDigest {
        match self {
            Self::Keccak256 => &Keccak256Digest,
            Self::Sha256 => &Sha256Digest,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keccak256" | "keccak" => Ok(Self::Keccak256),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(CoreError::Parse(format!(
                "unknown digest algorithm: {other} (expected keccak256 or sha256)"
            ))),
        }
    }
}
