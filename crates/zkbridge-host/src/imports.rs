//! Host functions offered to a module at instantiation time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use wasmtime::{Caller, Engine, FuncType, Linker, Val};
use zkbridge_abi::{
    NativeValue, Signature, IMPORT_PROC_EXIT, WASI_ERRNO_NOSYS, WASI_STUB_IMPORTS,
};

use crate::module::{HostState, LoadError};
use crate::values::{native_to_val, val_to_native, val_type};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HostCallError(pub String);

pub type HostFn =
    Arc<dyn Fn(&[NativeValue]) -> Result<Vec<NativeValue>, HostCallError> + Send + Sync>;

#[derive(Clone)]
pub struct HostImport {
    signature: Signature,
    func: HostFn,
}

impl HostImport {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Debug for HostImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostImport")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Named, typed host functions keyed by `(module, name)`.
///
/// The table is consumed read-only by the loader; a module is only
/// instantiated when every import it declares is present here with a matching
/// signature.
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    entries: BTreeMap<(String, String), HostImport>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric-only stubs for common `wasi_snapshot_preview1` functions.
    ///
    /// `proc_exit` traps with the exit code; everything else reports `ENOSYS`.
    pub fn wasi_stubs() -> Self {
        let mut table = Self::new();
        for spec in WASI_STUB_IMPORTS {
            if spec.name == IMPORT_PROC_EXIT {
                table.insert(spec.module, spec.name, spec.signature(), |args| {
                    let code = args.first().and_then(NativeValue::as_i64).unwrap_or_default();
                    Err(HostCallError(format!("guest called proc_exit({code})")))
                });
            } else {
                table.insert(spec.module, spec.name, spec.signature(), |_| {
                    Ok(vec![NativeValue::I32(WASI_ERRNO_NOSYS)])
                });
            }
        }
        table
    }

    pub fn with_func<F>(mut self, module: &str, name: &str, signature: Signature, func: F) -> Self
    where
        F: Fn(&[NativeValue]) -> Result<Vec<NativeValue>, HostCallError> + Send + Sync + 'static,
    {
        self.insert(module, name, signature, func);
        self
    }

    /// Adds or replaces a host function.
    pub fn insert<F>(&mut self, module: &str, name: &str, signature: Signature, func: F)
    where
        F: Fn(&[NativeValue]) -> Result<Vec<NativeValue>, HostCallError> + Send + Sync + 'static,
    {
        self.entries.insert(
            (module.to_string(), name.to_string()),
            HostImport {
                signature,
                func: Arc::new(func),
            },
        );
    }

    pub fn merge(mut self, other: ImportTable) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn get(&self, module: &str, name: &str) -> Option<&HostImport> {
        self.entries.get(&(module.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .keys()
            .map(|(module, name)| (module.as_str(), name.as_str()))
    }

    pub(crate) fn define(
        &self,
        engine: &Engine,
        linker: &mut Linker<HostState>,
    ) -> Result<(), LoadError> {
        for ((module, name), import) in &self.entries {
            let ty = FuncType::new(
                engine,
                import.signature.params.iter().map(|t| val_type(*t)),
                import.signature.results.iter().map(|t| val_type(*t)),
            );
            let host = import.clone();
            let label = format!("{module}::{name}");
            linker
                .func_new(
                    module,
                    name,
                    ty,
                    move |_caller: Caller<'_, HostState>,
                          params: &[Val],
                          results: &mut [Val]|
                          -> anyhow::Result<()> {
                        let args = params
                            .iter()
                            .map(val_to_native)
                            .collect::<Option<Vec<_>>>()
                            .ok_or_else(|| anyhow::anyhow!("{label}: non-numeric argument"))?;
                        let out = (host.func)(&args)
                            .map_err(|err| anyhow::anyhow!("{label}: {err}"))?;
                        let shape_ok = out.len() == results.len()
                            && out
                                .iter()
                                .zip(&host.signature.results)
                                .all(|(value, ty)| value.ty() == *ty);
                        if !shape_ok {
                            return Err(anyhow::anyhow!(
                                "{label}: host function returned {out:?}, declared {}",
                                host.signature
                            ));
                        }
                        for (slot, value) in results.iter_mut().zip(out) {
                            *slot = native_to_val(value);
                        }
                        Ok(())
                    },
                )
                .map_err(|err| {
                    LoadError::Engine(format!("failed to define host import {module}::{name}: {err}"))
                })?;
        }
        Ok(())
    }
}
