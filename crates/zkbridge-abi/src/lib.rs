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

//! Numeric ABI between the zkbridge host and the wasm modules it loads.
//!
//! Exports and host imports are restricted to the four wasm number types.
//! 64-bit integers cross the boundary as `i64` end to end; the largest
//! magnitude that survives a round trip through the bridge is
//! [`MAX_SAFE_WIDE_INTEGER`].

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest integer magnitude the bridge carries without loss (`i64::MAX`).
pub const MAX_SAFE_WIDE_INTEGER: i64 = i64::MAX;

pub const MODULE_WASI_PREVIEW1: &str = "wasi_snapshot_preview1";
pub const MODULE_ENV: &str = "env";

pub const IMPORT_PROC_EXIT: &str = "proc_exit";
pub const IMPORT_FD_WRITE: &str = "fd_write";
pub const IMPORT_ENVIRON_GET: &str = "environ_get";
pub const IMPORT_ENVIRON_SIZES_GET: &str = "environ_sizes_get";
pub const IMPORT_RANDOM_GET: &str = "random_get";
pub const IMPORT_CLOCK_TIME_GET: &str = "clock_time_get";

/// WASI errno returned by stubbed preview1 functions.
pub const WASI_ERRNO_NOSYS: i32 = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value on the host side of a native call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl NativeValue {
    pub const fn ty(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
        }
    }

    /// Widens integer values to `i64`. Floats are not integers and yield `None`.
    pub const fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I32(v) => Some(v as i64),
            Self::I64(v) => Some(v),
            Self::F32(_) | Self::F64(_) => None,
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}:i32"),
            Self::I64(v) => write!(f, "{v}:i64"),
            Self::F32(v) => write!(f, "{v}:f32"),
            Self::F64(v) => write!(f, "{v}:f64"),
        }
    }
}

/// Parameter and result types of a native function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl Signature {
    pub fn new(params: impl Into<Vec<ValueType>>, results: impl Into<Vec<ValueType>>) -> Self {
        Self {
            params: params.into(),
            results: results.into(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, p) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p.as_str())?;
        }
        f.write_str(") -> (")?;
        for (idx, r) in self.results.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(r.as_str())?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSpec {
    pub module: &'static str,
    pub name: &'static str,
    pub params: &'static [ValueType],
    pub results: &'static [ValueType],
}

impl ImportSpec {
    pub fn signature(&self) -> Signature {
        Signature::new(self.params, self.results)
    }
}

const PROC_EXIT_PARAMS: &[ValueType] = &[ValueType::I32];
const FD_WRITE_PARAMS: &[ValueType] = &[
    ValueType::I32,
    ValueType::I32,
    ValueType::I32,
    ValueType::I32,
];
const PTR_PAIR_PARAMS: &[ValueType] = &[ValueType::I32, ValueType::I32];
const CLOCK_TIME_GET_PARAMS: &[ValueType] = &[ValueType::I32, ValueType::I64, ValueType::I32];
const ERRNO_RESULTS: &[ValueType] = &[ValueType::I32];

/// Preview1 functions the host can stub without touching guest memory.
pub const WASI_STUB_IMPORTS: &[ImportSpec] = &[
    ImportSpec {
        module: MODULE_WASI_PREVIEW1,
        name: IMPORT_PROC_EXIT,
        params: PROC_EXIT_PARAMS,
        results: &[],
    },
    ImportSpec {
        module: MODULE_WASI_PREVIEW1,
        name: IMPORT_FD_WRITE,
        params: FD_WRITE_PARAMS,
        results: ERRNO_RESULTS,
    },
    ImportSpec {
        module: MODULE_WASI_PREVIEW1,
        name: IMPORT_ENVIRON_GET,
        params: PTR_PAIR_PARAMS,
        results: ERRNO_RESULTS,
    },
    ImportSpec {
        module: MODULE_WASI_PREVIEW1,
        name: IMPORT_ENVIRON_SIZES_GET,
        params: PTR_PAIR_PARAMS,
        results: ERRNO_RESULTS,
    },
    ImportSpec {
        module: MODULE_WASI_PREVIEW1,
        name: IMPORT_RANDOM_GET,
        params: PTR_PAIR_PARAMS,
        results: ERRNO_RESULTS,
    },
    ImportSpec {
        module: MODULE_WASI_PREVIEW1,
        name: IMPORT_CLOCK_TIME_GET,
        params: CLOCK_TIME_GET_PARAMS,
        results: ERRNO_RESULTS,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_display_is_readable() {
        let sig = Signature::new([ValueType::I64, ValueType::I64], [ValueType::I64]);
        assert_eq!(sig.to_string(), "(i64, i64) -> (i64)");
        assert_eq!(Signature::new(Vec::new(), Vec::new()).to_string(), "() -> ()");
    }

    #[test]
    fn value_type_serializes_lowercase() {
        let json = serde_json::to_string(&ValueType::F32).unwrap();
        assert_eq!(json, "\"f32\"");
    }

    #[test]
    fn wasi_stub_names_are_unique() {
        for (i, a) in WASI_STUB_IMPORTS.iter().enumerate() {
            for b in &WASI_STUB_IMPORTS[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn integer_widening() {
        assert_eq!(NativeValue::I32(-3).as_i64(), Some(-3));
        assert_eq!(NativeValue::I64(i64::MAX).as_i64(), Some(MAX_SAFE_WIDE_INTEGER));
        assert_eq!(NativeValue::F64(1.0).as_i64(), None);
    }
}
