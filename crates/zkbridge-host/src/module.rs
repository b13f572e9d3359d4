//! Native module loading.
//!
//! Loading is all-or-nothing: a [`NativeModule`] only exists once the blob has
//! compiled, every declared import has been matched against the
//! [`ImportTable`], and instantiation (including any start function) has
//! finished without trapping.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use wasmtime::{
    Config, Engine, ExternType, Func, Linker, Module, Store, StoreLimits, StoreLimitsBuilder,
    Trap, Val,
};
use zkbridge_abi::{NativeValue, Signature, ValueType};

use crate::config::HostConfig;
use crate::imports::ImportTable;
use crate::values::{native_to_val, signature_of, val_to_native, zero_val};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("invalid wasm module: {0}")]
    InvalidModule(String),
    #[error("unresolved {kind} import {module}::{name}")]
    UnresolvedImport {
        module: String,
        name: String,
        kind: &'static str,
    },
    #[error("import {module}::{name} signature mismatch: host provides {expected}, module declares {actual}")]
    ImportSignatureMismatch {
        module: String,
        name: String,
        expected: String,
        actual: String,
    },
    #[error("instantiation failed: {0}")]
    InstantiationFailure(String),
    #[error("engine error: {0}")]
    Engine(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("unknown export: {0}")]
    UnknownExport(String),
    #[error("export `{export}` expects {expected} arguments, got {actual}")]
    Arity {
        export: String,
        expected: usize,
        actual: usize,
    },
    #[error("export `{export}` argument {position} expects {expected}, got {actual}")]
    TypeMismatch {
        export: String,
        position: usize,
        expected: ValueType,
        actual: ValueType,
    },
    #[error("export `{export}` trapped: {message}")]
    Trap { export: String, message: String },
}

#[derive(Debug)]
pub(crate) struct HostState {
    limits: StoreLimits,
}

/// A numeric export with its declared signature.
#[derive(Debug, Clone)]
pub struct NativeExport {
    name: String,
    signature: Signature,
    func: Func,
}

impl NativeExport {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    fn check_args(&self, args: &[NativeValue]) -> Result<(), CallError> {
        if args.len() != self.signature.params.len() {
            return Err(CallError::Arity {
                export: self.name.clone(),
                expected: self.signature.params.len(),
                actual: args.len(),
            });
        }
        for (idx, (arg, expected)) in args.iter().zip(&self.signature.params).enumerate() {
            if arg.ty() != *expected {
                return Err(CallError::TypeMismatch {
                    export: self.name.clone(),
                    position: idx + 1,
                    expected: *expected,
                    actual: arg.ty(),
                });
            }
        }
        Ok(())
    }
}

pub struct NativeModule {
    store: Mutex<Store<HostState>>,
    exports: BTreeMap<String, NativeExport>,
    imports: Vec<(String, String)>,
    wasm_sha256: [u8; 32],
}

impl NativeModule {
    pub fn load(
        wasm: &[u8],
        imports: &ImportTable,
        config: &HostConfig,
    ) -> Result<Self, LoadError> {
        if wasm.is_empty() {
            return Err(LoadError::InvalidModule("wasm module is empty".to_string()));
        }
        config
            .validate()
            .map_err(|err| LoadError::Engine(err.to_string()))?;

        let engine = Engine::new(&host_engine_config())
            .map_err(|err| LoadError::Engine(format!("engine init failed: {err}")))?;
        let module = Module::from_binary(&engine, wasm)
            .map_err(|err| LoadError::InvalidModule(format!("{err:#}")))?;
        let resolved = resolve_imports(&module, imports)?;

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes)
            .build();
        let mut store = Store::new(&engine, HostState { limits });
        store.limiter(|state| &mut state.limits);

        let mut linker = Linker::<HostState>::new(&engine);
        imports.define(&engine, &mut linker)?;
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|err| LoadError::InstantiationFailure(describe_error(&err)))?;

        let mut exports = BTreeMap::new();
        for export in module.exports() {
            let name = export.name();
            match export.ty() {
                ExternType::Func(ty) => match signature_of(&ty) {
                    Ok(signature) => {
                        let Some(func) = instance.get_func(&mut store, name) else {
                            continue;
                        };
                        exports.insert(
                            name.to_string(),
                            NativeExport {
                                name: name.to_string(),
                                signature,
                                func,
                            },
                        );
                    }
                    Err(wasm_type) => {
                        tracing::debug!(target: "zkbridge.loader", export = name, wasm_type, "skipping export with non-numeric signature");
                    }
                },
                other => {
                    tracing::debug!(target: "zkbridge.loader", export = name, kind = extern_kind(&other), "skipping non-function export");
                }
            }
        }

        let mut wasm_sha256 = [0_u8; 32];
        wasm_sha256.copy_from_slice(&Sha256::digest(wasm));
        tracing::info!(
            target: "zkbridge.loader",
            wasm_sha256 = %hex::encode(wasm_sha256),
            imports = resolved.len(),
            exports = exports.len(),
            "native module loaded"
        );

        Ok(Self {
            store: Mutex::new(store),
            exports,
            imports: resolved,
            wasm_sha256,
        })
    }

    pub fn export(&self, name: &str) -> Option<&NativeExport> {
        self.exports.get(name)
    }

    pub fn exports(&self) -> impl Iterator<Item = &NativeExport> {
        self.exports.values()
    }

    /// Imports the module declared, all of which were satisfied at load time.
    pub fn resolved_imports(&self) -> &[(String, String)] {
        &self.imports
    }

    pub fn wasm_sha256_hex(&self) -> String {
        hex::encode(self.wasm_sha256)
    }

    /// Calls an export after checking arity and argument types against its
    /// declared signature.
    pub fn call(&self, name: &str, args: &[NativeValue]) -> Result<Vec<NativeValue>, CallError> {
        let export = self
            .exports
            .get(name)
            .ok_or_else(|| CallError::UnknownExport(name.to_string()))?;
        export.check_args(args)?;

        let params: Vec<Val> = args.iter().copied().map(native_to_val).collect();
        let mut results: Vec<Val> = export
            .signature
            .results
            .iter()
            .map(|ty| zero_val(*ty))
            .collect();
        {
            let mut store = self.store.lock();
            export
                .func
                .call(&mut *store, &params, &mut results)
                .map_err(|err| CallError::Trap {
                    export: name.to_string(),
                    message: describe_error(&err),
                })?;
        }

        results
            .iter()
            .map(|val| {
                val_to_native(val).ok_or_else(|| CallError::Trap {
                    export: name.to_string(),
                    message: "export returned a non-numeric value".to_string(),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeModule")
            .field("wasm_sha256", &self.wasm_sha256_hex())
            .field("imports", &self.imports)
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn host_engine_config() -> Config {
    let mut cfg = Config::new();
    cfg.cranelift_nan_canonicalization(true);
    cfg.wasm_memory64(false);
    cfg
}

fn resolve_imports(
    module: &Module,
    table: &ImportTable,
) -> Result<Vec<(String, String)>, LoadError> {
    let mut resolved = Vec::new();
    for import in module.imports() {
        let (module_name, name) = (import.module(), import.name());
        let ty = match import.ty() {
            ExternType::Func(ty) => ty,
            other => {
                return Err(LoadError::UnresolvedImport {
                    module: module_name.to_string(),
                    name: name.to_string(),
                    kind: extern_kind(&other),
                })
            }
        };
        let host = table
            .get(module_name, name)
            .ok_or_else(|| LoadError::UnresolvedImport {
                module: module_name.to_string(),
                name: name.to_string(),
                kind: "function",
            })?;
        let declared = signature_of(&ty).map_err(|wasm_type| {
            LoadError::ImportSignatureMismatch {
                module: module_name.to_string(),
                name: name.to_string(),
                expected: host.signature().to_string(),
                actual: format!("non-numeric ({wasm_type})"),
            }
        })?;
        if host.signature() != &declared {
            return Err(LoadError::ImportSignatureMismatch {
                module: module_name.to_string(),
                name: name.to_string(),
                expected: host.signature().to_string(),
                actual: declared.to_string(),
            });
        }
        resolved.push((module_name.to_string(), name.to_string()));
    }
    Ok(resolved)
}

fn extern_kind(ty: &ExternType) -> &'static str {
    match ty {
        ExternType::Func(_) => "function",
        ExternType::Global(_) => "global",
        ExternType::Table(_) => "table",
        ExternType::Memory(_) => "memory",
        _ => "other",
    }
}

fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<Trap>() {
        Some(trap) => trap.to_string(),
        None => err.root_cause().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wasm(wat: &str) -> Vec<u8> {
        wat::parse_str(wat).unwrap()
    }

    #[test]
    fn empty_blob_is_invalid() {
        let err = NativeModule::load(&[], &ImportTable::new(), &HostConfig::default()).unwrap_err();
        assert_eq!(err, LoadError::InvalidModule("wasm module is empty".into()));
    }

    #[test]
    fn wasm_hash_identifies_blob() {
        let blob = wasm(r#"(module (func (export "one") (result i32) i32.const 1))"#);
        let module = NativeModule::load(&blob, &ImportTable::new(), &HostConfig::default()).unwrap();
        assert_eq!(module.wasm_sha256_hex(), hex::encode(Sha256::digest(&blob)));
        assert!(format!("{module:?}").contains("one"));
    }

    #[test]
    fn call_checks_arity_and_types_before_entering_wasm() {
        let blob = wasm(
            r#"(module (func (export "inc") (param i64) (result i64) local.get 0 i64.const 1 i64.add))"#,
        );
        let module = NativeModule::load(&blob, &ImportTable::new(), &HostConfig::default()).unwrap();
        assert_eq!(
            module.call("inc", &[]).unwrap_err(),
            CallError::Arity {
                export: "inc".into(),
                expected: 1,
                actual: 0
            }
        );
        assert_eq!(
            module.call("inc", &[NativeValue::I32(1)]).unwrap_err(),
            CallError::TypeMismatch {
                export: "inc".into(),
                position: 1,
                expected: ValueType::I64,
                actual: ValueType::I32
            }
        );
        assert_eq!(
            module.call("inc", &[NativeValue::I64(41)]).unwrap(),
            vec![NativeValue::I64(42)]
        );
        assert_eq!(
            module.call("dec", &[]).unwrap_err(),
            CallError::UnknownExport("dec".into())
        );
    }
}
