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

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use zkbridge_core::{calculate_journal_hash_with, DigestAlgorithm, HashResult};
use zkbridge_host::{HostConfig, ImportTable, Interpreter, NativeModule};

#[derive(Debug, Parser)]
#[command(name = "zkbridgectl")]
#[command(about = "Journal hashing and scripted calls into wasm verification modules")]
struct Cli {
    #[arg(long, default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hash `receipt.journal.bytes` from a JSON input file.
    Hash {
        #[arg(default_value = "input.json")]
        input: PathBuf,
        #[arg(long, default_value = "keccak256")]
        digest: DigestAlgorithm,
    },
    /// List the numeric exports of a wasm module.
    Exports {
        #[arg(long)]
        module: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run a Lua script against a wasm module's exports.
    Run {
        #[arg(long)]
        module: PathBuf,
        #[arg(long)]
        script: PathBuf,
        /// `lua_name=export`, or a bare export name bound under itself.
        #[arg(long = "bind", value_parser = parse_binding)]
        bindings: Vec<(String, String)>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    let out = match cli.cmd {
        Command::Hash { input, digest } => {
            let result = run_hash(&input, digest);
            if result.is_success() {
                tracing::info!(target: "zkbridge.hash", "Hash calculation successful!");
                println!("{}", result.to_json_pretty());
                return;
            }
            eprintln!("{}", result.to_json_pretty());
            std::process::exit(1);
        }
        Command::Exports { module, config } => run_exports(&module, config.as_deref()),
        Command::Run {
            module,
            script,
            bindings,
            config,
        } => run_script(&module, &script, &bindings, config.as_deref()),
    };
    match out {
        Ok(v) => println!("{v:#}"),
        Err(msg) => {
            eprintln!("{}", json!({ "error": msg }));
            std::process::exit(1);
        }
    }
}

fn run_hash(input: &Path, digest: DigestAlgorithm) -> HashResult {
    match fs::read_to_string(input) {
        Ok(raw) => calculate_journal_hash_with(&raw, digest.digest_impl()),
        Err(err) => HashResult::failure_message(format_args!(
            "failed to read {}: {err}",
            input.display()
        )),
    }
}

fn run_exports(module: &Path, config: Option<&Path>) -> Result<serde_json::Value, String> {
    let config = load_config(config)?;
    let module = load_module(module, &config)?;
    let exports: Vec<_> = module
        .exports()
        .map(|export| {
            json!({
                "name": export.name(),
                "signature": export.signature().to_string(),
                "params": export.signature().params,
                "results": export.signature().results,
            })
        })
        .collect();
    let imports: Vec<String> = module
        .resolved_imports()
        .iter()
        .map(|(m, n)| format!("{m}::{n}"))
        .collect();
    Ok(json!({
        "wasm_sha256": module.wasm_sha256_hex(),
        "imports": imports,
        "exports": exports,
    }))
}

fn run_script(
    module: &Path,
    script: &Path,
    bindings: &[(String, String)],
    config: Option<&Path>,
) -> Result<serde_json::Value, String> {
    let config = load_config(config)?;
    let module = Arc::new(load_module(module, &config)?);
    let source = fs::read_to_string(script)
        .map_err(|e| format!("failed to read {}: {e}", script.display()))?;

    let mut interp = Interpreter::new(&config).map_err(|e| e.to_string())?;
    if bindings.is_empty() {
        let bound = interp.bind_all(&module).map_err(|e| e.to_string())?;
        tracing::debug!(target: "zkbridge.bridge", bound, "bound every numeric export");
    } else {
        for (name, export) in bindings {
            interp
                .bind_export(name, &module, export)
                .map_err(|e| e.to_string())?;
        }
    }
    let outcome = interp.run(&source).map_err(|e| e.to_string())?;
    serde_json::to_value(&outcome).map_err(|e| e.to_string())
}

fn load_config(path: Option<&Path>) -> Result<HostConfig, String> {
    match path {
        Some(path) => HostConfig::load(path),
        None => HostConfig::from_env(),
    }
    .map_err(|e| e.to_string())
}

fn load_module(path: &Path, config: &HostConfig) -> Result<NativeModule, String> {
    let wasm = fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    NativeModule::load(&wasm, &ImportTable::wasi_stubs(), config).map_err(|e| e.to_string())
}

fn parse_binding(raw: &str) -> Result<(String, String), String> {
    let (name, export) = raw.split_once('=').unwrap_or((raw, raw));
    if name.is_empty() || export.is_empty() {
        return Err(format!("binding must be `lua_name=export`, got {raw:?}"));
    }
    Ok((name.to_string(), export.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bindings_parse_with_and_without_alias() {
        assert_eq!(
            parse_binding("add_numbers=add").unwrap(),
            ("add_numbers".to_string(), "add".to_string())
        );
        assert_eq!(
            parse_binding("add").unwrap(),
            ("add".to_string(), "add".to_string())
        );
        assert!(parse_binding("=add").is_err());
        assert!(parse_binding("x=").is_err());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["zkbridgectl", "hash"]).unwrap();
        assert!(matches!(
            cli.cmd,
            Command::Hash { ref input, digest: DigestAlgorithm::Keccak256 }
                if input == Path::new("input.json")
        ));
        assert_eq!(cli.log, "info");
        assert!(Cli::try_parse_from(["zkbridgectl", "hash", "--digest", "md5"]).is_err());
    }

    #[test]
    fn missing_input_is_a_hash_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_hash(&dir.path().join("absent.json"), DigestAlgorithm::Keccak256);
        assert!(result.error.starts_with("Error: failed to read"));
        assert!(result.hash.is_empty());
    }

    #[test]
    fn run_script_binds_every_export_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("m.wasm");
        fs::write(
            &module,
            wat::parse_str(
                r#"(module (func (export "add") (param i64 i64) (result i64)
                    local.get 0 local.get 1 i64.add))"#,
            )
            .unwrap(),
        )
        .unwrap();
        let script = dir.path().join("s.lua");
        let mut f = fs::File::create(&script).unwrap();
        writeln!(f, "result = add(5, 7)").unwrap();

        let out = run_script(&module, &script, &[], None).unwrap();
        assert_eq!(out["globals"]["result"], json!(12));
        assert_eq!(out["state"], json!("completed"));

        let err = run_script(
            &module,
            &script,
            &[("add_numbers".into(), "mul".into())],
            None,
        )
        .unwrap_err();
        assert!(err.contains("mul"), "{err}");
    }
}
