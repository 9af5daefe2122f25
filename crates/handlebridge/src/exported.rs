//! Local objects that serve remote calls

use crate::context::BridgeContext;
use crate::value::Value;
use handlebridge_sdk::{InterfaceSchema, NativeError};
use std::any::Any;

/// A local object the remote side may call into by handle.
///
/// The schema is what the remote side sees when it asks for the object's
/// signatures; dispatch itself is by member name.
///
/// ```ignore
/// struct Counter(AtomicI32);
///
/// impl Exported for Counter {
///     fn schema(&self) -> InterfaceSchema {
///         InterfaceSchema::new("demo.Counter").method("increment", vec![], TypeDescriptor::Int)
///     }
///
///     fn invoke(&self, _ctx: &BridgeContext, method: &str, _args: &[Value]) -> Result<Value, NativeError> {
///         match method {
///             "increment" => Ok(Value::Int(self.0.fetch_add(1, Ordering::SeqCst) + 1)),
///             other => Err(unknown_member(&self.schema(), other)),
///         }
///     }
/// }
/// ```
pub trait Exported: Any + Send + Sync {
    /// Members advertised to the remote side
    fn schema(&self) -> InterfaceSchema;

    /// Invoke `method` on behalf of the remote side
    fn invoke(&self, ctx: &BridgeContext, method: &str, args: &[Value]) -> Result<Value, NativeError>;

    /// Read a property on behalf of the remote side
    fn get_property(&self, ctx: &BridgeContext, name: &str) -> Result<Value, NativeError> {
        let _ = ctx;
        Err(unknown_member(&self.schema(), name))
    }

    /// Write a property on behalf of the remote side
    fn set_property(&self, ctx: &BridgeContext, name: &str, value: Value) -> Result<(), NativeError> {
        let _ = (ctx, value);
        Err(unknown_member(&self.schema(), name))
    }
}

/// Error for a member the schema does not provide
pub fn unknown_member(schema: &InterfaceSchema, member: &str) -> NativeError {
    NativeError::UnknownMember {
        class_name: schema.class_name().to_string(),
        member: member.to_string(),
    }
}
