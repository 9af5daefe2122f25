//! Delegate adapters
//!
//! A delegate is a local function the remote side can call by handle. The
//! adapter record owns the function and is bound to its handle with strong
//! retention, so it survives until the remote side releases it.

use crate::context::BridgeContext;
use crate::value::Value;
use handlebridge_sdk::{Handle, NativeError};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Signature of a delegate body
pub type DelegateFn = dyn Fn(&BridgeContext, &[Value]) -> Result<Value, NativeError> + Send + Sync;

/// A local function exposed to the remote side under a handle
pub struct AdapterRecord {
    name: String,
    handle: OnceCell<Handle>,
    func: Box<DelegateFn>,
}

impl AdapterRecord {
    pub(crate) fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&BridgeContext, &[Value]) -> Result<Value, NativeError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            handle: OnceCell::new(),
            func: Box::new(func),
        }
    }

    /// Descriptor name the delegate was registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle the delegate is bound to, once registered
    pub fn handle(&self) -> Option<Handle> {
        self.handle.get().copied()
    }

    pub(crate) fn bind(&self, handle: Handle) {
        let _ = self.handle.set(handle);
    }

    /// Run the delegate. Panics are turned into [`NativeError::Panic`].
    pub fn apply(&self, ctx: &BridgeContext, args: &[Value]) -> Result<Value, NativeError> {
        guarded(|| (self.func)(ctx, args))
    }
}

impl fmt::Debug for AdapterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRecord")
            .field("name", &self.name)
            .field("handle", &self.handle.get())
            .finish_non_exhaustive()
    }
}

/// Run local code on behalf of the remote side without letting a panic
/// unwind across the boundary
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, NativeError>) -> Result<T, NativeError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(NativeError::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
