//! Local values
//!
//! [`Value`] is what local code passes to and receives from the bridge.
//! Objects stay objects: a remote object shows up as a [`Proxy`], a local
//! object as a [`LocalRef`]. Only the marshaller turns them into handles.

use crate::exported::Exported;
use crate::proxy::{Proxy, ProxyInner};
use handlebridge_sdk::Handle;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased shared local object
pub type LocalObject = Arc<dyn Any + Send + Sync>;

// ============================================================================
// LocalRef
// ============================================================================

/// Shared reference to a local object that may be handed to the remote side.
///
/// Identity is the allocation: clones of a `LocalRef` (and `LocalRef`s built
/// from clones of the same `Arc`) are the same object and get the same
/// handle.
#[derive(Clone)]
pub struct LocalRef {
    object: LocalObject,
    exported: Option<Arc<dyn Exported>>,
    class_name: Arc<str>,
}

impl LocalRef {
    /// Wrap an opaque value; the remote side can hold it but not call into it
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing shared value, keeping its identity
    pub fn from_arc<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Self {
            object,
            exported: None,
            class_name: Arc::from(std::any::type_name::<T>()),
        }
    }

    /// Wrap a value that serves remote calls through [`Exported`]
    pub fn exported<T: Exported>(value: T) -> Self {
        Self::from_exported_arc(Arc::new(value))
    }

    /// Wrap an existing shared exported value, keeping its identity
    pub fn from_exported_arc<T: Exported>(object: Arc<T>) -> Self {
        let class_name = Arc::from(object.schema().class_name());
        let exported: Arc<dyn Exported> = object.clone();
        Self {
            object,
            exported: Some(exported),
            class_name,
        }
    }

    pub(crate) fn from_parts(
        object: LocalObject,
        exported: Option<Arc<dyn Exported>>,
        class_name: Arc<str>,
    ) -> Self {
        Self {
            object,
            exported,
            class_name,
        }
    }

    /// Override the class name advertised to the remote side
    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.class_name = Arc::from(class_name);
        self
    }

    /// Class name advertised to the remote side
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Typed access to the underlying object
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    /// Whether the underlying object is a `T`
    pub fn is<T: Any>(&self) -> bool {
        (*self.object).is::<T>()
    }

    /// The remote-callable view, if the object is exported
    pub fn as_exported(&self) -> Option<&Arc<dyn Exported>> {
        self.exported.as_ref()
    }

    /// Whether both refer to the same object
    pub fn ptr_eq(&self, other: &LocalRef) -> bool {
        self.address() == other.address()
    }

    pub(crate) fn object(&self) -> &LocalObject {
        &self.object
    }

    pub(crate) fn class_name_arc(&self) -> Arc<str> {
        self.class_name.clone()
    }

    /// Identity key: address of the shared allocation
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.object) as *const () as usize
    }

    /// Handle of a proxy that was wrapped as a local object
    pub(crate) fn proxy_handle(&self) -> Option<Handle> {
        (*self.object).downcast_ref::<ProxyInner>().map(ProxyInner::handle)
    }
}

impl fmt::Debug for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalRef({}@{:#x})", self.class_name, self.address())
    }
}

// ============================================================================
// Value
// ============================================================================

/// A value on the local side of the bridge
#[derive(Clone)]
pub enum Value {
    /// No value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 8-bit integer
    Byte(i8),
    /// Character
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
    /// String
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Remote object (or local delegate) reached through a handle
    Proxy(Proxy),
    /// Local object
    Object(LocalRef),
}

impl Value {
    /// Wrap an opaque local value
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(LocalRef::new(value))
    }

    /// Check if null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Char(_) => "char",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Proxy(_) => "proxy",
            Value::Object(_) => "object",
        }
    }

    /// Extract as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract as i32, widening narrower integers
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Byte(v) => Some(i32::from(*v)),
            Value::Short(v) => Some(i32::from(*v)),
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract as i64, widening narrower integers
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            other => other.as_i32().map(i64::from),
        }
    }

    /// Extract as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Long(v) => Some(*v as f64),
            other => other.as_i32().map(f64::from),
        }
    }

    /// Borrow as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as proxy
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow as local object
    pub fn as_local(&self) -> Option<&LocalRef> {
        match self {
            Value::Object(local) => Some(local),
            _ => None,
        }
    }

    /// Typed access to a local object
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_local().and_then(LocalRef::downcast)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Proxy(a), Value::Proxy(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Byte(v) => write!(f, "Byte({})", v),
            Value::Char(v) => write!(f, "Char({:?})", v),
            Value::Short(v) => write!(f, "Short({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Long(v) => write!(f, "Long({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Double(v) => write!(f, "Double({})", v),
            Value::String(v) => write!(f, "String({:?})", v),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Proxy(p) => write!(f, "{}", p),
            Value::Object(local) => write!(f, "{:?}", local),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Byte,
    char => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<Value> => Array,
    Proxy => Proxy,
    LocalRef => Object,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
