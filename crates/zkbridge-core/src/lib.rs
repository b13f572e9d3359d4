// Copyright [2026] [zkbridge Contributors]
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// Copyright (c) 2026 zkbridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! zkbridge-core
//!
//! Canonical journal hashing for proof receipts:
//! - receipt normalization for string-embedded and inline `receipt` fields
//! - journal byte extraction with strict `[0, 255]` validation
//! - keccak256 (default) or SHA-256 digests rendered as `0x`-prefixed hex
//!
//! Hashing never returns an error to the caller. Every failure is folded into a
//! [`HashResult`] whose `error` field carries the diagnostic.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod digest;
pub mod error;
pub mod journal;
pub mod receipt;

pub use crate::digest::{DigestAlgorithm, JournalDigest, Keccak256Digest, Sha256Digest};
pub use crate::error::{CoreError, CoreResult};
pub use crate::journal::{
    calculate_journal_hash, calculate_journal_hash_with, compute_journal_hash,
    compute_journal_hash_with, HashResult,
};
pub use crate::receipt::{normalize, normalize_value, Receipt};
