//! Proxies for remote objects
//!
//! A [`Proxy`] is the local stand-in for an object owned by the remote
//! runtime. Clones share one binding; when the last clone goes away the
//! binding's sentinel releases the remote handle.
//!
//! Calls come in two flavours. `try_*` methods return a [`BridgeResult`].
//! The plain methods log the failure and collapse it to [`Value::Null`],
//! for callers that treat a remote fault like a missing value.

use crate::context::BridgeShared;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::Sentinel;
use crate::value::{LocalObject, LocalRef, Value};
use handlebridge_sdk::Handle;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

pub(crate) enum ProxyKind {
    /// Remote object; dropping the last proxy releases the handle
    Remote,
    /// Local delegate; the record stays alive while the proxy does
    Delegate { _record: LocalObject },
}

pub(crate) struct ProxyInner {
    handle: Handle,
    class_name: String,
    sentinel: Arc<Sentinel>,
    shared: Weak<BridgeShared>,
    kind: ProxyKind,
}

impl ProxyInner {
    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        if matches!(self.kind, ProxyKind::Remote) && self.sentinel.dispose() {
            debug!(handle = %self.handle, class = %self.class_name, "proxy dropped");
        }
    }
}

/// Local stand-in for a remote object
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

impl Proxy {
    pub(crate) fn new(
        handle: Handle,
        class_name: &str,
        sentinel: Arc<Sentinel>,
        shared: Weak<BridgeShared>,
        kind: ProxyKind,
    ) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                handle,
                class_name: class_name.to_string(),
                sentinel,
                shared,
                kind,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ProxyInner>) -> Self {
        Self { inner }
    }

    /// Wrap as a local object so the handle table can track it weakly
    pub(crate) fn into_local(self) -> LocalRef {
        let class_name = Arc::from(self.inner.class_name.as_str());
        LocalRef::from_parts(self.inner, None, class_name)
    }

    /// Handle naming the remote object
    pub fn handle(&self) -> Handle {
        self.inner.handle
    }

    /// Class name reported by the remote side
    pub fn class_name(&self) -> &str {
        &self.inner.class_name
    }

    /// Whether this proxy stands for a local delegate
    pub fn is_delegate(&self) -> bool {
        matches!(self.inner.kind, ProxyKind::Delegate { .. })
    }

    /// Whether the handle has been released
    pub fn is_released(&self) -> bool {
        self.inner.sentinel.is_disposed()
    }

    /// Release the handle now instead of waiting for the last clone to drop.
    ///
    /// Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        self.inner.sentinel.dispose()
    }

    fn shared(&self) -> BridgeResult<Arc<BridgeShared>> {
        let shared = self.inner.shared.upgrade().ok_or(BridgeError::ShutDown)?;
        shared.ensure_running()?;
        if self.is_released() {
            return Err(BridgeError::StaleHandle(self.handle()));
        }
        Ok(shared)
    }

    fn or_null(&self, result: BridgeResult<Value>, operation: &str, args: &[Value]) -> Value {
        result.unwrap_or_else(|err| {
            warn!(handle = %self.handle(), operation, args = ?args, error = %err, "proxy call failed");
            Value::Null
        })
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Invoke a method on the remote object
    pub fn try_invoke(&self, method: &str, args: &[Value]) -> BridgeResult<Value> {
        self.shared()?.invoke_remote(self.handle(), method, args)
    }

    /// Invoke a method, collapsing failures to `Null`
    pub fn invoke(&self, method: &str, args: &[Value]) -> Value {
        self.or_null(self.try_invoke(method, args), method, args)
    }

    /// Call the remote object as a function
    pub fn try_call(&self, args: &[Value]) -> BridgeResult<Value> {
        self.shared()?.call_remote(self.handle(), args)
    }

    /// Call the remote object as a function, collapsing failures to `Null`
    pub fn call(&self, args: &[Value]) -> Value {
        self.or_null(self.try_call(args), "call", args)
    }

    /// Read a property of the remote object
    pub fn try_get_property(&self, name: &str) -> BridgeResult<Value> {
        self.shared()?.get_remote(self.handle(), name)
    }

    /// Read a property, collapsing failures to `Null`
    pub fn get_property(&self, name: &str) -> Value {
        self.or_null(self.try_get_property(name), name, &[])
    }

    /// Write a property of the remote object
    pub fn try_set_property(&self, name: &str, value: Value) -> BridgeResult<()> {
        self.shared()?.set_remote(self.handle(), name, &value)
    }

    /// Write a property, logging failures. Returns whether the write succeeded.
    pub fn set_property(&self, name: &str, value: Value) -> bool {
        match self.try_set_property(name, value.clone()) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    handle = %self.handle(),
                    operation = name,
                    value = ?value,
                    error = %err,
                    "proxy property write failed"
                );
                false
            }
        }
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.handle() == other.handle()
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle().hash(state);
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proxy({}{})", self.class_name(), self.handle())
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("handle", &self.handle())
            .field("class_name", &self.class_name())
            .field("released", &self.is_released())
            .finish()
    }
}
