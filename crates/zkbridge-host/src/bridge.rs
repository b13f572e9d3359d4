//! Lua scripting bridge over a [`NativeModule`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use mlua::{Function, Lua, MultiValue, Table, Value};
use serde::Serialize;
use thiserror::Error;

use crate::config::{is_lua_identifier, HostConfig};
use crate::marshal::{native_to_lua, MarshalRule};
use crate::module::{CallError, NativeModule};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("module has no numeric export named `{export}`")]
    UnknownExport { export: String },
    #[error("binding `{binding}` expects {expected} but export `{export}` declares {actual}")]
    SignatureMismatch {
        binding: String,
        export: String,
        expected: String,
        actual: String,
    },
    #[error("type mismatch calling `{binding}`: {detail}")]
    TypeMismatch { binding: String, detail: String },
    #[error("native call from `{binding}` failed: {source}")]
    Native {
        binding: String,
        #[source]
        source: CallError,
    },
    #[error("binding registration failed: {0}")]
    Registration(String),
}

/// Uncaught script-level failure, carrying the interpreter's message text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("script error: {message}")]
pub struct ScriptError {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpreterState {
    Created,
    BindingsRegistered,
    Executing,
    Completed,
    Failed,
}

/// Scalar view of a Lua value handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// Non-scalar value, reported by Lua type name.
    Other(String),
}

impl ScriptValue {
    fn from_lua(value: &Value) -> Self {
        match value {
            Value::Nil => Self::Nil,
            Value::Boolean(b) => Self::Boolean(*b),
            Value::Integer(i) => Self::Integer(*i),
            Value::Number(n) => Self::Number(*n),
            Value::String(s) => Self::String(String::from(s.to_string_lossy())),
            other => Self::Other(other.type_name().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptOutcome {
    pub state: InterpreterState,
    /// Values returned by the chunk's top-level `return`.
    pub returned: Vec<ScriptValue>,
    /// Captured `print` lines, when print capture is enabled.
    pub printed: Vec<String>,
    /// Scalar globals the script created or changed.
    pub globals: BTreeMap<String, ScriptValue>,
}

impl ScriptOutcome {
    pub fn global(&self, name: &str) -> Option<&ScriptValue> {
        self.globals.get(name)
    }
}

#[derive(Debug, Default)]
struct PrintBuffer(Vec<String>);

#[derive(Debug, Clone)]
struct BindingInfo {
    export: String,
    rule: MarshalRule,
}

/// An owned Lua state with native bindings.
///
/// The state never outlives [`Interpreter::run`], which consumes it.
pub struct Interpreter {
    lua: Lua,
    module_table: Table,
    state: InterpreterState,
    bindings: BTreeMap<String, BindingInfo>,
    chunk_name: String,
}

impl Interpreter {
    pub fn new(config: &HostConfig) -> Result<Self, BridgeError> {
        config
            .validate()
            .map_err(|err| BridgeError::Registration(err.to_string()))?;
        let lua = Lua::new();
        let module_table = install_module_table(&lua, &config.module_name)
            .map_err(|err| BridgeError::Registration(err.to_string()))?;
        install_print(&lua, config.capture_print)
            .map_err(|err| BridgeError::Registration(err.to_string()))?;
        tracing::debug!(target: "zkbridge.bridge", module_name = %config.module_name, "interpreter created");
        Ok(Self {
            lua,
            module_table,
            state: InterpreterState::Created,
            bindings: BTreeMap::new(),
            chunk_name: config.chunk_name.clone(),
        })
    }

    pub fn state(&self) -> InterpreterState {
        self.state
    }

    pub fn binding_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Registers `name` as a global and in the `require`-able module table.
    ///
    /// `rule` must equal the export's declared signature, and `name` must not
    /// replace an existing global such as `print` or `require`. Both are
    /// rejected here rather than at call time. Re-registering a binding
    /// replaces it.
    pub fn register_binding(
        &mut self,
        name: &str,
        module: &Arc<NativeModule>,
        export: &str,
        rule: MarshalRule,
    ) -> Result<(), BridgeError> {
        if !is_lua_identifier(name) {
            return Err(BridgeError::Registration(format!(
                "binding name {name:?} is not a Lua identifier"
            )));
        }
        if self.shadows_global(name) {
            return Err(BridgeError::Registration(format!(
                "binding name `{name}` would replace an existing Lua global"
            )));
        }
        let native = module.export(export).ok_or_else(|| BridgeError::UnknownExport {
            export: export.to_string(),
        })?;
        if !rule.matches(native.signature()) {
            return Err(BridgeError::SignatureMismatch {
                binding: name.to_string(),
                export: export.to_string(),
                expected: rule.signature().to_string(),
                actual: native.signature().to_string(),
            });
        }

        let func = self
            .create_binding(name, Arc::clone(module), export, rule.clone())
            .map_err(|err| BridgeError::Registration(err.to_string()))?;
        self.lua
            .globals()
            .set(name, func.clone())
            .map_err(|err| BridgeError::Registration(err.to_string()))?;
        self.module_table
            .set(name, func)
            .map_err(|err| BridgeError::Registration(err.to_string()))?;

        tracing::debug!(target: "zkbridge.bridge", binding = name, export, signature = %rule.signature(), "binding registered");
        self.bindings.insert(
            name.to_string(),
            BindingInfo {
                export: export.to_string(),
                rule,
            },
        );
        self.state = InterpreterState::BindingsRegistered;
        Ok(())
    }

    /// Binds `export` under `name` with the rule implied by its signature.
    pub fn bind_export(
        &mut self,
        name: &str,
        module: &Arc<NativeModule>,
        export: &str,
    ) -> Result<(), BridgeError> {
        let rule = module
            .export(export)
            .map(|native| MarshalRule::from_signature(native.signature()))
            .ok_or_else(|| BridgeError::UnknownExport {
                export: export.to_string(),
            })?;
        self.register_binding(name, module, export, rule)
    }

    /// Binds every export whose name is a valid Lua identifier and not an
    /// existing global under its own name. Returns the number of bindings added.
    pub fn bind_all(&mut self, module: &Arc<NativeModule>) -> Result<usize, BridgeError> {
        let names: Vec<String> = module.exports().map(|e| e.name().to_string()).collect();
        let mut bound = 0;
        for name in names {
            if !is_lua_identifier(&name) {
                tracing::debug!(target: "zkbridge.bridge", export = %name, "export name is not a Lua identifier; not bound");
                continue;
            }
            if self.shadows_global(&name) {
                tracing::debug!(target: "zkbridge.bridge", export = %name, "export name is an existing Lua global; not bound");
                continue;
            }
            self.bind_export(&name, module, &name)?;
            bound += 1;
        }
        Ok(bound)
    }

    /// Executes `script` on the calling thread and releases the Lua state.
    ///
    /// An interpreter with no bindings passes through `BindingsRegistered`
    /// with an empty binding set.
    pub fn run(mut self, script: &str) -> Result<ScriptOutcome, ScriptError> {
        if self.state == InterpreterState::Created {
            self.state = InterpreterState::BindingsRegistered;
        }
        self.state = InterpreterState::Executing;
        tracing::debug!(target: "zkbridge.bridge", bindings = self.bindings.len(), "executing script");

        let before = global_snapshot(&self.lua);
        let result = self
            .lua
            .load(script)
            .set_name(self.chunk_name.as_str())
            .eval::<MultiValue>();

        match result {
            Ok(values) => {
                self.state = InterpreterState::Completed;
                let returned = values.iter().map(ScriptValue::from_lua).collect();
                let globals = changed_scalar_globals(&self.lua, &before);
                let printed = self
                    .lua
                    .remove_app_data::<PrintBuffer>()
                    .map(|buf| buf.0)
                    .unwrap_or_default();
                Ok(ScriptOutcome {
                    state: self.state,
                    returned,
                    printed,
                    globals,
                })
            }
            Err(err) => {
                self.state = InterpreterState::Failed;
                let message = err.to_string();
                tracing::warn!(target: "zkbridge.bridge", error = %message, "script failed");
                Err(ScriptError { message })
            }
        }
    }

    fn shadows_global(&self, name: &str) -> bool {
        if self.bindings.contains_key(name) {
            return false;
        }
        !matches!(
            self.lua.globals().raw_get::<Value>(name),
            Ok(Value::Nil)
        )
    }

    fn create_binding(
        &self,
        name: &str,
        module: Arc<NativeModule>,
        export: &str,
        rule: MarshalRule,
    ) -> mlua::Result<Function> {
        let binding = name.to_string();
        let export = export.to_string();
        self.lua.create_function(move |_, args: MultiValue| {
            let params = rule.marshal_args(&args).map_err(|detail| {
                mlua::Error::external(BridgeError::TypeMismatch {
                    binding: binding.clone(),
                    detail,
                })
            })?;
            let results = module.call(&export, &params).map_err(|source| {
                mlua::Error::external(BridgeError::Native {
                    binding: binding.clone(),
                    source,
                })
            })?;
            Ok(results.into_iter().map(native_to_lua).collect::<MultiValue>())
        })
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("state", &self.state)
            .field(
                "bindings",
                &self
                    .bindings
                    .iter()
                    .map(|(name, info)| (name.as_str(), info.export.as_str(), info.rule.signature()))
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

fn install_module_table(lua: &Lua, module_name: &str) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    let package: Table = lua.globals().get("package")?;
    let loaded: Table = package.get("loaded")?;
    loaded.set(module_name, table.clone())?;
    Ok(table)
}

/// Replaces `print` so output is either collected for the outcome or written
/// to stderr. Stdout is left to the host.
fn install_print(lua: &Lua, capture: bool) -> mlua::Result<()> {
    if capture {
        lua.set_app_data(PrintBuffer::default());
    }
    let tostring: Function = lua.globals().get("tostring")?;
    let print = lua.create_function(move |lua, args: MultiValue| {
        let mut parts: Vec<String> = Vec::with_capacity(args.len());
        for value in args {
            let text: mlua::String = tostring.call(value)?;
            parts.push(String::from(text.to_string_lossy()));
        }
        let line = parts.join("\t");
        match lua.app_data_mut::<PrintBuffer>() {
            Some(mut buf) => buf.0.push(line),
            None => eprintln!("{line}"),
        }
        Ok(())
    })?;
    lua.globals().set("print", print)
}

fn global_entries(lua: &Lua) -> Vec<(String, ScriptValue)> {
    let globals = lua.globals();
    let entries = globals
        .pairs::<Value, Value>()
        .filter_map(Result::ok)
        .filter_map(|(key, value)| match key {
            Value::String(key) => Some((
                String::from(key.to_string_lossy()),
                ScriptValue::from_lua(&value),
            )),
            _ => None,
        })
        .collect();
    entries
}

fn global_snapshot(lua: &Lua) -> HashMap<String, ScriptValue> {
    global_entries(lua).into_iter().collect()
}

/// Scalar globals that are new since `before` or hold a different value.
fn changed_scalar_globals(
    lua: &Lua,
    before: &HashMap<String, ScriptValue>,
) -> BTreeMap<String, ScriptValue> {
    global_entries(lua)
        .into_iter()
        .filter(|(key, value)| {
            !matches!(value, ScriptValue::Other(_)) && before.get(key) != Some(value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::ImportTable;

    fn adder() -> Arc<NativeModule> {
        let wasm = wat::parse_str(
            r#"(module
              (func (export "add") (param i64 i64) (result i64)
                local.get 0
                local.get 1
                i64.add))"#,
        )
        .unwrap();
        Arc::new(NativeModule::load(&wasm, &ImportTable::new(), &HostConfig::default()).unwrap())
    }

    #[test]
    fn state_moves_to_registered() {
        let module = adder();
        let mut interp = Interpreter::new(&HostConfig::default()).unwrap();
        assert_eq!(interp.state(), InterpreterState::Created);
        interp
            .register_binding("add_numbers", &module, "add", MarshalRule::binary_i64())
            .unwrap();
        assert_eq!(interp.state(), InterpreterState::BindingsRegistered);
        assert_eq!(interp.binding_names().collect::<Vec<_>>(), vec!["add_numbers"]);
    }

    #[test]
    fn rejects_invalid_binding_names() {
        let module = adder();
        let mut interp = Interpreter::new(&HostConfig::default()).unwrap();
        let err = interp
            .register_binding("add-numbers", &module, "add", MarshalRule::binary_i64())
            .unwrap_err();
        assert!(matches!(err, BridgeError::Registration(_)));
        assert_eq!(interp.state(), InterpreterState::Created);
    }

    #[test]
    fn script_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            ScriptValue::Nil,
            ScriptValue::Integer(12),
            ScriptValue::String("ok".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,12,"ok"]"#);
    }
}
