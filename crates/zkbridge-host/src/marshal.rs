//! Value conversion between Lua and the native numeric ABI.
//!
//! Lua 5.4 carries a 64-bit integer subtype, so integers move between the
//! interpreter and `i64` exports without touching a float. Conversions are
//! only performed when they are exact; anything that would round, wrap or
//! truncate is reported as a mismatch.

use mlua::{MultiValue, Value};
use zkbridge_abi::{NativeValue, Signature, ValueType};

/// Expected argument and result types for a script binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalRule {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl MarshalRule {
    pub fn new(params: impl Into<Vec<ValueType>>, results: impl Into<Vec<ValueType>>) -> Self {
        Self {
            params: params.into(),
            results: results.into(),
        }
    }

    /// Two integer arguments widened to `i64`, one `i64` result.
    pub fn binary_i64() -> Self {
        Self::new([ValueType::I64, ValueType::I64], [ValueType::I64])
    }

    pub fn from_signature(signature: &Signature) -> Self {
        Self::new(signature.params.clone(), signature.results.clone())
    }

    pub fn matches(&self, signature: &Signature) -> bool {
        self.params == signature.params && self.results == signature.results
    }

    pub fn signature(&self) -> Signature {
        Signature::new(self.params.clone(), self.results.clone())
    }

    /// Converts script arguments into native values, or describes the first
    /// argument that cannot be represented exactly.
    pub fn marshal_args(&self, args: &MultiValue) -> Result<Vec<NativeValue>, String> {
        if args.len() != self.params.len() {
            return Err(format!(
                "expected {} arguments, got {}",
                self.params.len(),
                args.len()
            ));
        }
        args.iter()
            .zip(&self.params)
            .enumerate()
            .map(|(idx, (value, ty))| {
                lua_to_native(value, *ty).map_err(|why| format!("argument {}: {why}", idx + 1))
            })
            .collect()
    }
}

pub fn lua_to_native(value: &Value, ty: ValueType) -> Result<NativeValue, String> {
    match (ty, value) {
        (ValueType::I32, Value::Integer(i)) => i32::try_from(*i)
            .map(NativeValue::I32)
            .map_err(|_| format!("{i} is out of range for i32")),
        (ValueType::I64, Value::Integer(i)) => Ok(NativeValue::I64(*i)),
        (ValueType::I32, Value::Number(f)) => {
            integral(*f, i32::MIN as f64, i32::MAX as f64 + 1.0)
                .map(|v| NativeValue::I32(v as i32))
                .ok_or_else(|| format!("{f} is not an exact i32"))
        }
        (ValueType::I64, Value::Number(f)) => {
            integral(*f, i64::MIN as f64, -(i64::MIN as f64))
                .map(|v| NativeValue::I64(v as i64))
                .ok_or_else(|| format!("{f} is not an exact i64"))
        }
        (ValueType::F64, Value::Number(f)) => Ok(NativeValue::F64(*f)),
        (ValueType::F64, Value::Integer(i)) => {
            let f = *i as f64;
            if f as i128 == *i as i128 {
                Ok(NativeValue::F64(f))
            } else {
                Err(format!("{i} cannot be represented exactly as f64"))
            }
        }
        (ValueType::F32, Value::Number(f)) => {
            let narrowed = *f as f32;
            if f.is_nan() || narrowed as f64 == *f {
                Ok(NativeValue::F32(narrowed))
            } else {
                Err(format!("{f} cannot be represented exactly as f32"))
            }
        }
        (ValueType::F32, Value::Integer(i)) => {
            let f = *i as f32;
            if f as i128 == *i as i128 {
                Ok(NativeValue::F32(f))
            } else {
                Err(format!("{i} cannot be represented exactly as f32"))
            }
        }
        (expected, other) => Err(format!("expected {expected}, got {}", other.type_name())),
    }
}

pub fn native_to_lua(value: NativeValue) -> Value {
    match value {
        NativeValue::I32(v) => Value::Integer(i64::from(v)),
        NativeValue::I64(v) => Value::Integer(v),
        NativeValue::F32(v) => Value::Number(f64::from(v)),
        NativeValue::F64(v) => Value::Number(v),
    }
}

/// `f` as an integer in `[lo, hi)` when it has no fractional part.
fn integral(f: f64, lo: f64, hi: f64) -> Option<f64> {
    (f.is_finite() && f.fract() == 0.0 && f >= lo && f < hi).then_some(f)
}
