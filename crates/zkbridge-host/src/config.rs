use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WASM_PAGE_BYTES: usize = 65_536;
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 256 * WASM_PAGE_BYTES;
pub const DEFAULT_MODULE_NAME: &str = "native";
pub const DEFAULT_CHUNK_NAME: &str = "script";

pub const ENV_MAX_MEMORY_BYTES: &str = "ZKBRIDGE_MAX_MEMORY_BYTES";
pub const ENV_MODULE_NAME: &str = "ZKBRIDGE_MODULE_NAME";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Upper bound on guest linear memory.
    pub max_memory_bytes: usize,
    /// Name under which bindings are `require`-able from scripts.
    pub module_name: String,
    /// Collect `print` output into the run outcome instead of writing to stdout.
    pub capture_print: bool,
    pub chunk_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            module_name: DEFAULT_MODULE_NAME.to_string(),
            capture_print: true,
            chunk_name: DEFAULT_CHUNK_NAME.to_string(),
        }
    }
}

impl HostConfig {
    /// Defaults overridden by `ZKBRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let payload = fs::read(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        let cfg: Self = serde_json::from_slice(&payload)
            .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory_bytes < WASM_PAGE_BYTES {
            return Err(ConfigError::Invalid(
                "max_memory_bytes must be at least one wasm page".to_string(),
            ));
        }
        if !is_lua_identifier(&self.module_name) {
            return Err(ConfigError::Invalid(format!(
                "module_name must be a Lua identifier, got {:?}",
                self.module_name
            )));
        }
        if self.chunk_name.is_empty() {
            return Err(ConfigError::Invalid("chunk_name must not be empty".to_string()));
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(ENV_MAX_MEMORY_BYTES) {
            self.max_memory_bytes = raw.trim().parse().map_err(|_| {
                ConfigError::Parse(format!("{ENV_MAX_MEMORY_BYTES} must be an integer, got {raw:?}"))
            })?;
        }
        if let Some(name) = lookup(ENV_MODULE_NAME) {
            self.module_name = name;
        }
        self.validate()
    }
}

pub(crate) fn is_lua_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_lua_keyword(name)
}

fn is_lua_keyword(name: &str) -> bool {
    matches!(
        name,
        "and" | "break" | "do" | "else" | "elseif" | "end" | "false" | "for" | "function"
            | "goto" | "if" | "in" | "local" | "nil" | "not" | "or" | "repeat" | "return"
            | "then" | "true" | "until" | "while"
    )
}
