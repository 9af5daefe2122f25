//! WireValue - Values as they cross the boundary
//!
//! Primitives and strings are copied. Objects never cross by value: they
//! travel as a [`WireValue::Ref`] carrying the handle both sides agreed on
//! plus the class name, so the receiver can build a typed proxy.

use crate::descriptor::TypeDescriptor;
use crate::Handle;
use std::fmt;

/// A value passed to or returned from a boundary call
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// No value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 8-bit integer
    Byte(i8),
    /// Single character
    Char(char),
    /// Signed 16-bit integer
    Short(i16),
    /// Signed 32-bit integer
    Int(i32),
    /// Signed 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string (copied)
    String(String),
    /// Array of values (copied element-wise)
    Array(Vec<WireValue>),
    /// Reference to an object owned by one of the two runtimes
    Ref {
        /// Handle naming the object
        handle: Handle,
        /// Class name of the referenced object
        class_name: String,
    },
}

impl WireValue {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Reference to the object named by `handle`
    pub fn reference(handle: Handle, class_name: impl Into<String>) -> Self {
        WireValue::Ref {
            handle,
            class_name: class_name.into(),
        }
    }

    // ========================================================================
    // Type Checks
    // ========================================================================

    /// Check if null
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    /// Check if this is an object reference
    pub fn is_ref(&self) -> bool {
        matches!(self, WireValue::Ref { .. })
    }

    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Bool(_) => "boolean",
            WireValue::Byte(_) => "byte",
            WireValue::Char(_) => "char",
            WireValue::Short(_) => "short",
            WireValue::Int(_) => "int",
            WireValue::Long(_) => "long",
            WireValue::Float(_) => "float",
            WireValue::Double(_) => "double",
            WireValue::String(_) => "string",
            WireValue::Array(_) => "array",
            WireValue::Ref { .. } => "object",
        }
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Extract as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract as i32, widening the narrower integer kinds
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            WireValue::Byte(v) => Some(i32::from(*v)),
            WireValue::Short(v) => Some(i32::from(*v)),
            WireValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract as i64, widening the narrower integer kinds
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::Long(v) => Some(*v),
            other => other.as_i32().map(i64::from),
        }
    }

    /// Extract as f64 (floats and integers)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Double(v) => Some(*v),
            WireValue::Float(v) => Some(f64::from(*v)),
            WireValue::Long(v) => Some(*v as f64),
            other => other.as_i32().map(f64::from),
        }
    }

    /// Borrow as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Handle of a reference value
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            WireValue::Ref { handle, .. } => Some(*handle),
            _ => None,
        }
    }

    /// Descriptor the remote runtime uses to pick an overload for this value.
    ///
    /// Returns `None` for `Null`, which matches any reference type.
    pub fn descriptor(&self) -> Option<TypeDescriptor> {
        Some(match self {
            WireValue::Null => return None,
            WireValue::Bool(_) => TypeDescriptor::Boolean,
            WireValue::Byte(_) => TypeDescriptor::Byte,
            WireValue::Char(_) => TypeDescriptor::Char,
            WireValue::Short(_) => TypeDescriptor::Short,
            WireValue::Int(_) => TypeDescriptor::Int,
            WireValue::Long(_) => TypeDescriptor::Long,
            WireValue::Float(_) => TypeDescriptor::Float,
            WireValue::Double(_) => TypeDescriptor::Double,
            WireValue::String(_) => TypeDescriptor::string(),
            WireValue::Array(items) => {
                let element = items
                    .iter()
                    .find_map(WireValue::descriptor)
                    .unwrap_or_else(TypeDescriptor::any);
                TypeDescriptor::array_of(element)
            }
            WireValue::Ref { class_name, .. } => TypeDescriptor::object(class_name),
        })
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Null => write!(f, "null"),
            WireValue::Bool(b) => write!(f, "{}", b),
            WireValue::Byte(v) => write!(f, "{}", v),
            WireValue::Char(c) => write!(f, "'{}'", c),
            WireValue::Short(v) => write!(f, "{}", v),
            WireValue::Int(v) => write!(f, "{}", v),
            WireValue::Long(v) => write!(f, "{}L", v),
            WireValue::Float(v) => write!(f, "{}f", v),
            WireValue::Double(v) => write!(f, "{}", v),
            WireValue::String(s) => write!(f, "\"{}\"", s),
            WireValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            WireValue::Ref { handle, class_name } => write!(f, "{}{}", class_name, handle),
        }
    }
}
