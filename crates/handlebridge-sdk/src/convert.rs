//! Conversions between Rust values and [`WireValue`]
//!
//! Implemented for primitives, strings, optional values and vectors so
//! callers can write `i32::from_wire(reply)?` instead of matching by hand.

use crate::error::{AbiResult, NativeError};
use crate::{Handle, WireValue};

/// Convert a wire value into a Rust type
pub trait FromWire: Sized {
    /// Convert, failing with `TypeMismatch` on the wrong variant
    fn from_wire(value: WireValue) -> AbiResult<Self>;
}

/// Convert a Rust value into a wire value
pub trait ToWire {
    /// Convert to a wire value
    fn to_wire(&self) -> WireValue;
}

fn mismatch(expected: &str, got: &WireValue) -> NativeError {
    NativeError::TypeMismatch {
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

macro_rules! wire_primitive {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromWire for $ty {
            fn from_wire(value: WireValue) -> AbiResult<Self> {
                match value {
                    WireValue::$variant(v) => Ok(v),
                    other => Err(mismatch($name, &other)),
                }
            }
        }

        impl ToWire for $ty {
            fn to_wire(&self) -> WireValue {
                WireValue::$variant(*self)
            }
        }
    };
}

wire_primitive!(bool, Bool, "boolean");
wire_primitive!(i8, Byte, "byte");
wire_primitive!(char, Char, "char");
wire_primitive!(i16, Short, "short");
wire_primitive!(f32, Float, "float");

// Integer and double targets accept narrower numeric kinds.

impl FromWire for i32 {
    fn from_wire(value: WireValue) -> AbiResult<Self> {
        value.as_i32().ok_or_else(|| mismatch("int", &value))
    }
}

impl ToWire for i32 {
    fn to_wire(&self) -> WireValue {
        WireValue::Int(*self)
    }
}

impl FromWire for i64 {
    fn from_wire(value: WireValue) -> AbiResult<Self> {
        value.as_i64().ok_or_else(|| mismatch("long", &value))
    }
}

impl ToWire for i64 {
    fn to_wire(&self) -> WireValue {
        WireValue::Long(*self)
    }
}

impl FromWire for f64 {
    fn from_wire(value: WireValue) -> AbiResult<Self> {
        value.as_f64().ok_or_else(|| mismatch("double", &value))
    }
}

impl ToWire for f64 {
    fn to_wire(&self) -> WireValue {
        WireValue::Double(*self)
    }
}

impl FromWire for String {
    fn from_wire(value: WireValue) -> AbiResult<Self> {
        match value {
            WireValue::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl ToWire for String {
    fn to_wire(&self) -> WireValue {
        WireValue::String(self.clone())
    }
}

impl ToWire for str {
    fn to_wire(&self) -> WireValue {
        WireValue::String(self.to_string())
    }
}

impl FromWire for Handle {
    fn from_wire(value: WireValue) -> AbiResult<Self> {
        match value {
            WireValue::Ref { handle, .. } => Ok(handle),
            WireValue::Null => Ok(Handle::NULL),
            other => Err(mismatch("object", &other)),
        }
    }
}

impl FromWire for () {
    fn from_wire(_value: WireValue) -> AbiResult<Self> {
        Ok(())
    }
}

impl ToWire for () {
    fn to_wire(&self) -> WireValue {
        WireValue::Null
    }
}

impl<T: FromWire> FromWire for Option<T> {
    fn from_wire(value: WireValue) -> AbiResult<Self> {
        match value {
            WireValue::Null => Ok(None),
            other => T::from_wire(other).map(Some),
        }
    }
}

impl<T: ToWire> ToWire for Option<T> {
    fn to_wire(&self) -> WireValue {
        match self {
            Some(v) => v.to_wire(),
            None => WireValue::Null,
        }
    }
}

impl<T: FromWire> FromWire for Vec<T> {
    fn from_wire(value: WireValue) -> AbiResult<Self> {
        match value {
            WireValue::Array(items) => items.into_iter().map(T::from_wire).collect(),
            other => Err(mismatch("array", &other)),
        }
    }
}

impl<T: ToWire> ToWire for [T] {
    fn to_wire(&self) -> WireValue {
        WireValue::Array(self.iter().map(ToWire::to_wire).collect())
    }
}

impl<T: ToWire> ToWire for Vec<T> {
    fn to_wire(&self) -> WireValue {
        self.as_slice().to_wire()
    }
}
