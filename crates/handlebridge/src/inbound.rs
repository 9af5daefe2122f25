//! Inbound surface: what the foreign runtime calls into
//!
//! Every entry point has a `try_*` form returning a [`BridgeResult`] and a
//! plain form that logs the failure and answers with a null value, which is
//! what a native trampoline hands back to the other engine.

use crate::context::BridgeContext;
use crate::delegate::{guarded, AdapterRecord};
use crate::error::{BridgeError, BridgeResult};
use crate::exported::Exported;
use crate::marshal;
use handlebridge_sdk::{Handle, WireValue};
use std::sync::Arc;
use tracing::{trace, warn};

/// Borrowed view of a context exposing its inbound entry points
pub struct Inbound<'a> {
    ctx: &'a BridgeContext,
}

impl<'a> Inbound<'a> {
    pub(crate) fn new(ctx: &'a BridgeContext) -> Self {
        Self { ctx }
    }

    fn or_null(&self, result: BridgeResult<WireValue>, handle: Handle, operation: &str, args: &[WireValue]) -> WireValue {
        result.unwrap_or_else(|err| {
            warn!(%handle, operation, args = ?args, error = %err, "inbound call failed");
            WireValue::Null
        })
    }

    fn exported(&self, handle: Handle) -> BridgeResult<Arc<dyn Exported>> {
        let local = self
            .ctx
            .shared()
            .table()
            .resolve(handle)
            .ok_or(BridgeError::StaleHandle(handle))?;
        local.as_exported().cloned().ok_or(BridgeError::NotExported(handle))
    }

    // ========================================================================
    // Delegates
    // ========================================================================

    /// Run the delegate bound to `handle` with `args`
    pub fn try_invoke_callback(&self, handle: Handle, args: &[WireValue]) -> BridgeResult<WireValue> {
        let shared = self.ctx.shared();
        shared.ensure_running()?;
        let record = shared
            .table()
            .resolve(handle)
            .ok_or(BridgeError::StaleHandle(handle))?
            .downcast::<AdapterRecord>()
            .ok_or(BridgeError::NotExported(handle))?;

        let args = marshal::from_wire_all(shared, args)?;
        let result = record
            .apply(self.ctx, &args)
            .map_err(|source| BridgeError::callback(handle, record.name(), source))?;
        marshal::to_wire(shared, &result)
    }

    /// Run the delegate bound to `handle`, answering `Null` on failure
    pub fn invoke_callback(&self, handle: Handle, args: &[WireValue]) -> WireValue {
        self.or_null(self.try_invoke_callback(handle, args), handle, "invoke_callback", args)
    }

    // ========================================================================
    // Exported objects
    // ========================================================================

    /// Invoke `method` on the exported object bound to `handle`
    pub fn try_invoke(&self, handle: Handle, method: &str, args: &[WireValue]) -> BridgeResult<WireValue> {
        let shared = self.ctx.shared();
        shared.ensure_running()?;
        let target = self.exported(handle)?;
        let args = marshal::from_wire_all(shared, args)?;
        let result = guarded(|| target.invoke(self.ctx, method, &args))
            .map_err(|source| BridgeError::callback(handle, method, source))?;
        marshal::to_wire(shared, &result)
    }

    /// Invoke `method`, answering `Null` on failure
    pub fn invoke(&self, handle: Handle, method: &str, args: &[WireValue]) -> WireValue {
        self.or_null(self.try_invoke(handle, method, args), handle, method, args)
    }

    /// Read a property of the exported object bound to `handle`
    pub fn try_get_property(&self, handle: Handle, name: &str) -> BridgeResult<WireValue> {
        let shared = self.ctx.shared();
        shared.ensure_running()?;
        let target = self.exported(handle)?;
        let result = guarded(|| target.get_property(self.ctx, name))
            .map_err(|source| BridgeError::callback(handle, name, source))?;
        marshal::to_wire(shared, &result)
    }

    /// Read a property, answering `Null` on failure
    pub fn get_property(&self, handle: Handle, name: &str) -> WireValue {
        self.or_null(self.try_get_property(handle, name), handle, name, &[])
    }

    /// Write a property of the exported object bound to `handle`
    pub fn try_set_property(&self, handle: Handle, name: &str, value: WireValue) -> BridgeResult<()> {
        let shared = self.ctx.shared();
        shared.ensure_running()?;
        let target = self.exported(handle)?;
        let value = marshal::from_wire(shared, value)?;
        guarded(|| target.set_property(self.ctx, name, value))
            .map_err(|source| BridgeError::callback(handle, name, source))
    }

    /// Write a property. Returns whether the write succeeded.
    pub fn set_property(&self, handle: Handle, name: &str, value: WireValue) -> bool {
        let args = [value.clone()];
        match self.try_set_property(handle, name, value) {
            Ok(()) => true,
            Err(err) => {
                warn!(%handle, operation = name, args = ?args, error = %err, "inbound property write failed");
                false
            }
        }
    }

    /// Encoded member signatures of the exported object bound to `handle`
    pub fn try_signatures(&self, handle: Handle) -> BridgeResult<Vec<String>> {
        self.ctx.shared().ensure_running()?;
        let target = self.exported(handle)?;
        Ok(target.schema().encode())
    }

    /// Encoded member signatures, empty on failure
    pub fn signatures(&self, handle: Handle) -> Vec<String> {
        self.try_signatures(handle).unwrap_or_else(|err| {
            warn!(%handle, operation = "signatures", error = %err, "signature lookup failed");
            Vec::new()
        })
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// The foreign runtime dropped its reference to a local object.
    ///
    /// Only the local retention ends here; the binding itself is reclaimed
    /// once the object becomes unreachable. No native release is sent back.
    pub fn release(&self, handle: Handle) -> bool {
        let held = self.ctx.unretain(handle);
        trace!(%handle, held, "remote released local handle");
        held
    }
}
