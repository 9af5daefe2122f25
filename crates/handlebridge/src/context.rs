//! Bridge context
//!
//! [`BridgeContext`] is the single entry point of the local side. It owns
//! the handle table, the native bridge and the sweeper, and funnels every
//! native call through one re-entrant gate: a remote call may call back
//! into local code, which may call out again on the same thread.
//!
//! Contexts are cheap to clone. The last clone going away shuts the
//! context down, releasing every handle it still holds.

use crate::config::BridgeConfig;
use crate::delegate::AdapterRecord;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{
    HandleState, HandleStats, HandleTable, Reclaim, ReleaseTicket, RetentionMode,
};
use crate::inbound::Inbound;
use crate::marshal;
use crate::proxy::{Proxy, ProxyInner, ProxyKind};
use crate::sweeper::{self, SweepReport, Sweeper};
use crate::value::{LocalRef, Value};
use handlebridge_sdk::{AbiResult, Handle, NativeBridge, NativeError};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct BridgeShared {
    bridge: Arc<dyn NativeBridge>,
    config: BridgeConfig,
    table: HandleTable,
    gate: ReentrantMutex<()>,
    shut_down: AtomicBool,
    sweeper: Mutex<Option<Sweeper>>,
    this: Weak<BridgeShared>,
}

impl BridgeShared {
    pub(crate) fn table(&self) -> &HandleTable {
        &self.table
    }

    pub(crate) fn ensure_running(&self) -> BridgeResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(BridgeError::ShutDown);
        }
        Ok(())
    }

    /// Run a primitive through the global gate
    fn call<R>(&self, f: impl FnOnce(&dyn NativeBridge) -> AbiResult<R>) -> AbiResult<R> {
        let _gate = self.gate.lock();
        f(self.bridge.as_ref())
    }

    pub(crate) fn sweep(&self) -> SweepReport {
        sweeper::sweep(&self.table)
    }

    // ------------------------------------------------------------------------
    // Binding values
    // ------------------------------------------------------------------------

    fn value_of(&self, local: LocalRef) -> Value {
        match local.object().clone().downcast::<ProxyInner>() {
            Ok(inner) => Value::Proxy(Proxy::from_inner(inner)),
            Err(_) => Value::Object(local),
        }
    }

    fn bind_proxy(&self, handle: Handle, class_name: &str) -> BridgeResult<Value> {
        let bound = self.table.bind_remote(handle, |sentinel| {
            Proxy::new(handle, class_name, sentinel, self.this.clone(), ProxyKind::Remote).into_local()
        })?;
        Ok(self.value_of(bound))
    }

    /// Local view of a handle received from the remote side.
    ///
    /// A local handle whose object is gone reads as null. Only handles the
    /// remote side minted become proxies.
    pub(crate) fn value_for_ref(&self, handle: Handle, class_name: &str) -> BridgeResult<Value> {
        if handle.is_null() {
            return Ok(Value::Null);
        }
        if let Some(local) = self.table.resolve(handle) {
            return Ok(self.value_of(local));
        }
        if self.table.is_local(handle) {
            debug!(%handle, class = class_name, "stale local handle received");
            return Ok(Value::Null);
        }
        match self.bind_proxy(handle, class_name) {
            Err(BridgeError::StaleHandle(_)) => {
                debug!(%handle, class = class_name, "stale local handle received");
                Ok(Value::Null)
            }
            bound => bound,
        }
    }

    // ------------------------------------------------------------------------
    // Outbound calls
    // ------------------------------------------------------------------------

    pub(crate) fn create_remote(&self, class_name: &str, args: &[Value]) -> BridgeResult<Proxy> {
        self.ensure_running()?;
        let wire_args = marshal::to_wire_all(self, args)?;
        let handle = self
            .call(|bridge| bridge.create_instance(class_name, &wire_args))
            .map_err(|source| BridgeError::native(Handle::NULL, class_name, source))?;
        if handle.is_null() {
            return Err(BridgeError::native(
                handle,
                class_name,
                NativeError::Fault("foreign runtime returned the null handle".to_string()),
            ));
        }

        match self.bind_proxy(handle, class_name)? {
            Value::Proxy(proxy) => Ok(proxy),
            _ => Err(BridgeError::HandleConflict { handle }),
        }
    }

    pub(crate) fn invoke_remote(&self, handle: Handle, method: &str, args: &[Value]) -> BridgeResult<Value> {
        self.ensure_running()?;
        let wire_args = marshal::to_wire_all(self, args)?;
        let reply = self
            .call(|bridge| bridge.invoke(handle, method, &wire_args))
            .map_err(|source| BridgeError::native(handle, method, source))?;
        marshal::from_wire(self, reply)
    }

    pub(crate) fn call_remote(&self, handle: Handle, args: &[Value]) -> BridgeResult<Value> {
        self.ensure_running()?;
        let wire_args = marshal::to_wire_all(self, args)?;
        let reply = self
            .call(|bridge| bridge.invoke_callback(handle, &wire_args))
            .map_err(|source| BridgeError::native(handle, "invoke_callback", source))?;
        marshal::from_wire(self, reply)
    }

    pub(crate) fn get_remote(&self, handle: Handle, name: &str) -> BridgeResult<Value> {
        self.ensure_running()?;
        let reply = self
            .call(|bridge| bridge.get_property(handle, name))
            .map_err(|source| BridgeError::native(handle, name, source))?;
        marshal::from_wire(self, reply)
    }

    pub(crate) fn set_remote(&self, handle: Handle, name: &str, value: &Value) -> BridgeResult<()> {
        self.ensure_running()?;
        let wire = marshal::to_wire(self, value)?;
        self.call(|bridge| bridge.set_property(handle, name, wire))
            .map_err(|source| BridgeError::native(handle, name, source))
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop();
        }

        let mut released = 0usize;
        for sentinel in self.table.sentinels() {
            if !sentinel.mark_disposed() {
                continue;
            }
            if self.config.release_on_shutdown {
                self.reclaim(sentinel.handle(), sentinel.generation());
                released += 1;
            }
        }
        drop(self.table.clear());

        info!(released, "bridge context shut down");
    }
}

impl Reclaim for BridgeShared {
    fn reclaim(&self, handle: Handle, generation: u64) {
        if self.table.begin_release(handle, generation) == ReleaseTicket::Superseded {
            debug!(%handle, generation, "binding superseded, native release skipped");
            return;
        }
        if let Err(err) = self.call(|bridge| bridge.release(handle)) {
            warn!(%handle, operation = "release", error = %err, "native release failed");
        }
        drop(self.table.finish_release(handle, generation));
        debug!(%handle, "handle released");
    }
}

impl Drop for BridgeShared {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// BridgeContext
// ============================================================================

/// The local side of a cross-runtime bridge
#[derive(Clone)]
pub struct BridgeContext {
    shared: Arc<BridgeShared>,
}

/// Non-owning reference to a [`BridgeContext`]
#[derive(Clone)]
pub struct WeakBridgeContext {
    shared: Weak<BridgeShared>,
}

impl WeakBridgeContext {
    /// The context, if it is still alive
    pub fn upgrade(&self) -> Option<BridgeContext> {
        self.shared.upgrade().map(|shared| BridgeContext { shared })
    }
}

impl BridgeContext {
    /// Create a context over `bridge` and start the sweeper if enabled
    pub fn new(bridge: Arc<dyn NativeBridge>, config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;

        let shared = Arc::new_cyclic(|this: &Weak<BridgeShared>| {
            let owner: Weak<dyn Reclaim> = this.clone();
            let table = HandleTable::new(&config, owner);
            BridgeShared {
                bridge,
                config,
                table,
                gate: ReentrantMutex::new(()),
                shut_down: AtomicBool::new(false),
                sweeper: Mutex::new(None),
                this: this.clone(),
            }
        });

        if shared.config.sweeper_enabled {
            let sweeper = Sweeper::spawn(Arc::downgrade(&shared), shared.config.sweep_interval())?;
            *shared.sweeper.lock() = Some(sweeper);
        }

        info!(
            floor = shared.config.handle_floor,
            ceiling = shared.config.handle_ceiling,
            sweeper = shared.config.sweeper_enabled,
            "bridge context created"
        );
        Ok(Self { shared })
    }

    /// Create a context with the default configuration
    pub fn with_defaults(bridge: Arc<dyn NativeBridge>) -> BridgeResult<Self> {
        Self::new(bridge, BridgeConfig::default())
    }

    pub(crate) fn shared(&self) -> &Arc<BridgeShared> {
        &self.shared
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Non-owning reference, for holders that must not keep the context alive
    pub fn downgrade(&self) -> WeakBridgeContext {
        WeakBridgeContext {
            shared: Arc::downgrade(&self.shared),
        }
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Handle for an object, allocating one on first use.
    ///
    /// Proxies answer with their own handle. Only objects can carry handles.
    pub fn get_or_create_handle(&self, value: &Value, mode: RetentionMode) -> BridgeResult<Handle> {
        self.shared.ensure_running()?;
        match value {
            Value::Proxy(proxy) => Ok(proxy.handle()),
            Value::Object(local) => self.shared.table.get_or_create(local, mode),
            other => Err(BridgeError::NotTrackable(other.type_name())),
        }
    }

    /// Bind a local object to a handle chosen by the caller or the remote side.
    ///
    /// An earlier handle of the same object stops resolving; the object is
    /// released once, under `handle`.
    pub fn pin(&self, object: &LocalRef, handle: Handle) -> BridgeResult<()> {
        self.shared.ensure_running()?;
        self.shared.table.pin(object, handle)
    }

    /// Object bound to `handle`, if it is still alive
    pub fn resolve(&self, handle: Handle) -> Option<Value> {
        match self.shared.table.resolve(handle) {
            Some(local) => Some(self.shared.value_of(local)),
            None => {
                debug!(%handle, "stale or unknown handle");
                None
            }
        }
    }

    /// Proxy bound to `handle`, if it names a live remote object
    pub fn proxy_for(&self, handle: Handle) -> Option<Proxy> {
        match self.resolve(handle)? {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Release a handle now: tell the foreign runtime and forget the binding.
    ///
    /// Idempotent; returns `false` if the handle was unknown or already
    /// released.
    pub fn release(&self, handle: Handle) -> bool {
        match self.shared.table.sentinel_of(handle) {
            Some(sentinel) => sentinel.dispose(),
            None => {
                trace!(%handle, "release of unknown handle ignored");
                false
            }
        }
    }

    /// Keep the object bound to `handle` alive until [`unretain`](Self::unretain)
    pub fn retain(&self, handle: Handle) -> BridgeResult<()> {
        self.shared.table.retain(handle)
    }

    /// Stop keeping the object bound to `handle` alive
    pub fn unretain(&self, handle: Handle) -> bool {
        self.shared.table.unretain(handle)
    }

    /// Current state of a handle, `None` once released
    pub fn state(&self, handle: Handle) -> Option<HandleState> {
        self.shared.table.state(handle)
    }

    /// Whether the table holds any binding for `handle`
    pub fn is_bound(&self, handle: Handle) -> bool {
        self.shared.table.contains(handle)
    }

    /// Counts over the handle table
    pub fn stats(&self) -> HandleStats {
        self.shared.table.stats()
    }

    /// Run one reclamation sweep on the calling thread
    pub fn sweep_now(&self) -> SweepReport {
        self.shared.sweep()
    }

    // ========================================================================
    // Outbound calls
    // ========================================================================

    /// Instantiate a remote class
    pub fn try_create_instance(&self, class_name: &str, args: &[Value]) -> BridgeResult<Proxy> {
        self.shared.create_remote(class_name, args)
    }

    /// Instantiate a remote class, logging failures
    pub fn create_instance(&self, class_name: &str, args: &[Value]) -> Option<Proxy> {
        match self.try_create_instance(class_name, args) {
            Ok(proxy) => Some(proxy),
            Err(err) => {
                warn!(class = class_name, args = ?args, error = %err, "remote instantiation failed");
                None
            }
        }
    }

    /// Proxy for a remote class object (an instantiation without arguments)
    pub fn get_class(&self, class_name: &str) -> Option<Proxy> {
        self.create_instance(class_name, &[])
    }

    /// Invoke a method on the remote object named by `handle`
    pub fn try_invoke(&self, handle: Handle, method: &str, args: &[Value]) -> BridgeResult<Value> {
        self.shared.invoke_remote(handle, method, args)
    }

    /// Invoke a method by handle, collapsing failures to `Null`
    pub fn invoke(&self, handle: Handle, method: &str, args: &[Value]) -> Value {
        self.try_invoke(handle, method, args).unwrap_or_else(|err| {
            warn!(%handle, operation = method, args = ?args, error = %err, "remote invoke failed");
            Value::Null
        })
    }

    /// Expose a local function to the remote side.
    ///
    /// The function is bound to a fresh handle with strong retention and
    /// registered with the foreign runtime under `name`. It stays callable
    /// until the remote side releases it and the returned proxy is gone.
    pub fn create_delegate<F>(&self, name: &str, func: F) -> BridgeResult<Proxy>
    where
        F: Fn(&BridgeContext, &[Value]) -> Result<Value, NativeError> + Send + Sync + 'static,
    {
        let shared = &self.shared;
        shared.ensure_running()?;

        let record = Arc::new(AdapterRecord::new(name, func));
        let local = LocalRef::from_arc(record.clone()).with_class_name(name);
        let handle = shared
            .table
            .get_or_create(&local, RetentionMode::StrongUntilReleased)?;
        record.bind(handle);

        let sentinel = shared
            .table
            .sentinel_of(handle)
            .ok_or(BridgeError::StaleHandle(handle))?;
        if let Err(source) = shared.call(|bridge| bridge.register_callback(name, handle)) {
            sentinel.dispose();
            return Err(BridgeError::native(handle, "register_callback", source));
        }

        trace!(%handle, name, "delegate registered");
        Ok(Proxy::new(
            handle,
            name,
            sentinel,
            shared.this.clone(),
            ProxyKind::Delegate {
                _record: local.object().clone(),
            },
        ))
    }

    // ========================================================================
    // Inbound calls and lifecycle
    // ========================================================================

    /// Entry points the foreign runtime calls into
    pub fn inbound(&self) -> Inbound<'_> {
        Inbound::new(self)
    }

    /// Stop the sweeper and release every outstanding handle.
    ///
    /// Later calls through this context or its proxies fail with
    /// [`BridgeError::ShutDown`].
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    pub fn is_shut_down(&self) -> bool {
        self.shared.ensure_running().is_err()
    }
}

impl std::fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeContext")
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{HostClass, LoopbackHost};
    use handlebridge_sdk::WireValue;

    fn manual_config() -> BridgeConfig {
        BridgeConfig {
            sweeper_enabled: false,
            ..BridgeConfig::default()
        }
    }

    fn setup() -> (Arc<LoopbackHost>, BridgeContext) {
        let host = Arc::new(LoopbackHost::new());
        host.define_class(
            HostClass::new("demo.Box")
                .constructor(|args| Ok(vec![("value".to_string(), args.first().cloned().unwrap_or(WireValue::Null))]))
                .method("get", |call| call.get("value")),
        );
        let ctx = BridgeContext::new(host.clone(), manual_config()).unwrap();
        host.attach(&ctx);
        (host, ctx)
    }

    #[test]
    fn test_primitives_cannot_carry_handles() {
        let (_host, ctx) = setup();
        assert!(matches!(
            ctx.get_or_create_handle(&Value::Int(1), RetentionMode::Weak),
            Err(BridgeError::NotTrackable("int"))
        ));
    }

    #[test]
    fn test_proxy_short_circuits_to_its_handle() {
        let (_host, ctx) = setup();
        let proxy = ctx.create_instance("demo.Box", &[Value::Int(3)]).unwrap();
        let handle = ctx
            .get_or_create_handle(&Value::Proxy(proxy.clone()), RetentionMode::Weak)
            .unwrap();
        assert_eq!(handle, proxy.handle());
        assert_eq!(ctx.stats().total, 1);
        assert_eq!(ctx.proxy_for(handle), Some(proxy));
    }

    #[test]
    fn test_create_instance_failure_is_none() {
        let (_host, ctx) = setup();
        assert!(ctx.create_instance("demo.Missing", &[]).is_none());
        assert!(matches!(
            ctx.try_create_instance("demo.Missing", &[]),
            Err(BridgeError::NativeCallFault { .. })
        ));
    }

    #[test]
    fn test_invoke_by_handle() {
        let (_host, ctx) = setup();
        let proxy = ctx.create_instance("demo.Box", &[Value::from("x")]).unwrap();
        assert_eq!(ctx.invoke(proxy.handle(), "get", &[]), Value::from("x"));
        assert_eq!(ctx.invoke(proxy.handle(), "missing", &[]), Value::Null);
    }

    #[test]
    fn test_shutdown_refuses_calls() {
        let (host, ctx) = setup();
        let proxy = ctx.create_instance("demo.Box", &[]).unwrap();
        ctx.shutdown();
        ctx.shutdown();

        assert!(ctx.is_shut_down());
        assert!(matches!(proxy.try_invoke("get", &[]), Err(BridgeError::ShutDown)));
        assert!(matches!(
            ctx.try_create_instance("demo.Box", &[]),
            Err(BridgeError::ShutDown)
        ));
        assert_eq!(host.released(), vec![proxy.handle()]);
        drop(proxy);
        assert_eq!(host.released().len(), 1);
        assert_eq!(ctx.stats().total, 0);
    }

    #[test]
    fn test_dropping_last_context_releases_handles() {
        let (host, ctx) = setup();
        let proxy = ctx.create_instance("demo.Box", &[]).unwrap();
        let handle = proxy.handle();
        std::mem::forget(proxy.clone());
        drop(proxy);
        assert!(host.released().is_empty());

        drop(ctx);
        assert_eq!(host.released(), vec![handle]);
    }

    #[test]
    fn test_context_debug_output() {
        let (_host, ctx) = setup();
        let text = format!("{:?}", ctx);
        assert!(text.contains("BridgeContext"));
        assert!(text.contains("shut_down: false"));
    }
}
