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

//! zkbridge-host
//!
//! Hosts a compiled wasm verification module and bridges its numeric exports
//! into an embedded Lua 5.4 interpreter.
//!
//! - [`NativeModule`]: compiled and instantiated once, every declared import
//!   resolved against an [`ImportTable`] up front, exports exposed as a
//!   validated name → signature table
//! - [`Interpreter`]: an owned Lua state; bindings are checked against the
//!   export signature at registration, arguments are marshalled losslessly
//!   per call, and [`Interpreter::run`] consumes the state
//!
//! Integers cross the boundary as `i64` and never pass through a float, so the
//! full `i64` range is preserved in both directions.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod bridge;
pub mod config;
pub mod imports;
pub mod marshal;
pub mod module;
mod values;

pub use crate::bridge::{
    BridgeError, Interpreter, InterpreterState, ScriptError, ScriptOutcome, ScriptValue,
};
pub use crate::config::{ConfigError, HostConfig};
pub use crate::imports::{HostCallError, HostImport, ImportTable};
pub use crate::marshal::MarshalRule;
pub use crate::module::{CallError, LoadError, NativeExport, NativeModule};
pub use zkbridge_abi::{NativeValue, Signature, ValueType};
