use wasmtime::{FuncType, Val, ValType};
use zkbridge_abi::{NativeValue, Signature, ValueType};

pub(crate) fn val_type(ty: ValueType) -> ValType {
    match ty {
        ValueType::I32 => ValType::I32,
        ValueType::I64 => ValType::I64,
        ValueType::F32 => ValType::F32,
        ValueType::F64 => ValType::F64,
    }
}

pub(crate) fn value_type(ty: &ValType) -> Option<ValueType> {
    match ty {
        ValType::I32 => Some(ValueType::I32),
        ValType::I64 => Some(ValueType::I64),
        ValType::F32 => Some(ValueType::F32),
        ValType::F64 => Some(ValueType::F64),
        _ => None,
    }
}

pub(crate) fn wasm_type_name(ty: &ValType) -> &'static str {
    match ty {
        ValType::I32 => "i32",
        ValType::I64 => "i64",
        ValType::F32 => "f32",
        ValType::F64 => "f64",
        ValType::V128 => "v128",
        _ => "ref",
    }
}

/// Numeric signature of a wasm function type, or the first non-numeric type.
pub(crate) fn signature_of(ty: &FuncType) -> Result<Signature, &'static str> {
    let params = ty
        .params()
        .map(|p| value_type(&p).ok_or_else(|| wasm_type_name(&p)))
        .collect::<Result<Vec<_>, _>>()?;
    let results = ty
        .results()
        .map(|r| value_type(&r).ok_or_else(|| wasm_type_name(&r)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Signature { params, results })
}

pub(crate) fn native_to_val(value: NativeValue) -> Val {
    match value {
        NativeValue::I32(v) => Val::I32(v),
        NativeValue::I64(v) => Val::I64(v),
        NativeValue::F32(v) => Val::F32(v.to_bits()),
        NativeValue::F64(v) => Val::F64(v.to_bits()),
    }
}

pub(crate) fn val_to_native(value: &Val) -> Option<NativeValue> {
    match value {
        Val::I32(v) => Some(NativeValue::I32(*v)),
        Val::I64(v) => Some(NativeValue::I64(*v)),
        Val::F32(bits) => Some(NativeValue::F32(f32::from_bits(*bits))),
        Val::F64(bits) => Some(NativeValue::F64(f64::from_bits(*bits))),
        _ => None,
    }
}

pub(crate) fn zero_val(ty: ValueType) -> Val {
    match ty {
        ValueType::I32 => Val::I32(0),
        ValueType::I64 => Val::I64(0),
        ValueType::F32 => Val::F32(0),
        ValueType::F64 => Val::F64(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_bits_survive_conversion() {
        let v = native_to_val(NativeValue::F64(-0.0));
        assert_eq!(val_to_native(&v), Some(NativeValue::F64(-0.0)));
        let v = native_to_val(NativeValue::F32(1.5));
        assert_eq!(val_to_native(&v), Some(NativeValue::F32(1.5)));
    }

    #[test]
    fn wide_integers_are_not_narrowed() {
        let v = native_to_val(NativeValue::I64(i64::MIN));
        assert_eq!(val_to_native(&v), Some(NativeValue::I64(i64::MIN)));
    }
}
