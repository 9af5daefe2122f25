//! In-process foreign runtime
//!
//! [`LoopbackHost`] implements [`NativeBridge`] without any real engine
//! behind it. Classes are declared in Rust, objects live in a map keyed by
//! the handles the host mints, and callbacks registered by the local side
//! are dispatched straight back into the attached context. It records every
//! release it receives so tests can assert on handle lifetimes.
//!
//! The host mints handles from 1 upward, well below the default local
//! allocation floor.

use crate::context::{BridgeContext, WeakBridgeContext};
use handlebridge_sdk::{AbiResult, Handle, NativeBridge, NativeError, WireValue};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Method body of a host class
pub type HostMethod = Arc<dyn Fn(&HostCall<'_>) -> AbiResult<WireValue> + Send + Sync>;

/// Constructor of a host class: initial property values from arguments
pub type HostConstructor =
    Arc<dyn Fn(&[WireValue]) -> AbiResult<Vec<(String, WireValue)>> + Send + Sync>;

// ============================================================================
// Classes
// ============================================================================

/// A class the host can instantiate
#[derive(Clone)]
pub struct HostClass {
    name: String,
    constructor: Option<HostConstructor>,
    methods: FxHashMap<String, HostMethod>,
}

impl HostClass {
    /// Class without constructor or methods
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constructor: None,
            methods: FxHashMap::default(),
        }
    }

    /// Set the constructor
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&[WireValue]) -> AbiResult<Vec<(String, WireValue)>> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    /// Add a method
    pub fn method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&HostCall<'_>) -> AbiResult<WireValue> + Send + Sync + 'static,
    {
        self.methods.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Arguments and helpers available to a host method
pub struct HostCall<'a> {
    host: &'a LoopbackHost,
    this: Handle,
    args: &'a [WireValue],
}

impl<'a> HostCall<'a> {
    /// Handle of the receiving object
    pub fn this(&self) -> Handle {
        self.this
    }

    /// All arguments
    pub fn args(&self) -> &[WireValue] {
        self.args
    }

    /// Argument `index`
    pub fn arg(&self, index: usize) -> AbiResult<&WireValue> {
        self.args.get(index).ok_or_else(|| {
            NativeError::ArgumentError(format!("missing argument {}", index))
        })
    }

    /// Read a property of the receiving object
    pub fn get(&self, name: &str) -> AbiResult<WireValue> {
        self.host.get_property(self.this, name)
    }

    /// Write a property of the receiving object
    pub fn set(&self, name: &str, value: WireValue) -> AbiResult<()> {
        self.host.set_property(self.this, name, value)
    }

    /// The host itself, for spawning objects or calling back
    pub fn host(&self) -> &LoopbackHost {
        self.host
    }
}

struct HostObject {
    class_name: String,
    properties: FxHashMap<String, WireValue>,
}

// ============================================================================
// LoopbackHost
// ============================================================================

/// In-process [`NativeBridge`] for tests, benchmarks and demos
pub struct LoopbackHost {
    classes: RwLock<FxHashMap<String, Arc<HostClass>>>,
    objects: Mutex<FxHashMap<Handle, HostObject>>,
    callbacks: Mutex<FxHashMap<Handle, String>>,
    failing: RwLock<FxHashSet<String>>,
    released: Mutex<Vec<Handle>>,
    next_handle: AtomicU32,
    calls: AtomicUsize,
    local: RwLock<Option<WeakBridgeContext>>,
}

impl LoopbackHost {
    /// Empty host
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
            objects: Mutex::new(FxHashMap::default()),
            callbacks: Mutex::new(FxHashMap::default()),
            failing: RwLock::new(FxHashSet::default()),
            released: Mutex::new(Vec::new()),
            next_handle: AtomicU32::new(1),
            calls: AtomicUsize::new(0),
            local: RwLock::new(None),
        }
    }

    /// Declare a class
    pub fn define_class(&self, class: HostClass) {
        self.classes.write().insert(class.name.clone(), Arc::new(class));
    }

    /// Route callbacks and inbound calls to `ctx`
    pub fn attach(&self, ctx: &BridgeContext) {
        *self.local.write() = Some(ctx.downgrade());
    }

    /// Make every call to the member (or primitive) `name` fail
    pub fn fail_on(&self, name: &str) {
        self.failing.write().insert(name.to_string());
    }

    /// Undo [`fail_on`](Self::fail_on)
    pub fn clear_failure(&self, name: &str) {
        self.failing.write().remove(name);
    }

    /// Create an object host-side, as the foreign runtime would on its own
    pub fn spawn_object(&self, class_name: &str, properties: Vec<(String, WireValue)>) -> Handle {
        let handle = Handle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.objects.lock().insert(
            handle,
            HostObject {
                class_name: class_name.to_string(),
                properties: properties.into_iter().collect(),
            },
        );
        handle
    }

    /// Reference value for a host object
    pub fn reference(&self, handle: Handle) -> WireValue {
        let class_name = self
            .objects
            .lock()
            .get(&handle)
            .map(|object| object.class_name.clone())
            .unwrap_or_default();
        WireValue::reference(handle, class_name)
    }

    /// Every handle released so far, in order
    pub fn released(&self) -> Vec<Handle> {
        self.released.lock().clone()
    }

    /// Number of live host objects
    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    /// Whether the host still holds the object or callback slot
    pub fn holds(&self, handle: Handle) -> bool {
        self.objects.lock().contains_key(&handle) || self.callbacks.lock().contains_key(&handle)
    }

    /// Descriptor of a registered callback slot
    pub fn callback_descriptor(&self, handle: Handle) -> Option<String> {
        self.callbacks.lock().get(&handle).cloned()
    }

    /// Primitive calls served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Context the host is attached to
    pub fn context(&self) -> AbiResult<BridgeContext> {
        self.local
            .read()
            .as_ref()
            .and_then(WeakBridgeContext::upgrade)
            .ok_or_else(|| NativeError::Fault("no local context attached".to_string()))
    }

    /// Invoke a method on a local exported object, as the foreign runtime would
    pub fn call_local(&self, handle: Handle, method: &str, args: &[WireValue]) -> AbiResult<WireValue> {
        let ctx = self.context()?;
        ctx.inbound()
            .try_invoke(handle, method, args)
            .map_err(|err| NativeError::Fault(err.to_string()))
    }

    /// Drop the host's reference to a local object, as the foreign runtime
    /// would once its proxy is collected
    pub fn drop_local(&self, handle: Handle) -> bool {
        self.context()
            .map(|ctx| ctx.inbound().release(handle))
            .unwrap_or(false)
    }

    fn enter(&self, name: &str) -> AbiResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.read().contains(name) {
            return Err(NativeError::Fault(format!("injected failure in '{}'", name)));
        }
        Ok(())
    }

    fn class_of(&self, handle: Handle) -> AbiResult<Arc<HostClass>> {
        let class_name = self
            .objects
            .lock()
            .get(&handle)
            .map(|object| object.class_name.clone())
            .ok_or(NativeError::UnknownHandle(handle))?;
        self.classes
            .read()
            .get(&class_name)
            .cloned()
            .ok_or_else(|| NativeError::Fault(format!("class '{}' is not defined", class_name)))
    }
}

impl Default for LoopbackHost {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBridge for LoopbackHost {
    fn create_instance(&self, class_name: &str, args: &[WireValue]) -> AbiResult<Handle> {
        self.enter("create_instance")?;
        let class = self
            .classes
            .read()
            .get(class_name)
            .cloned()
            .ok_or_else(|| NativeError::Fault(format!("class '{}' is not defined", class_name)))?;
        let properties = match &class.constructor {
            Some(constructor) => constructor(args)?,
            None => Vec::new(),
        };
        let handle = self.spawn_object(class_name, properties);
        trace!(%handle, class = class_name, "host object created");
        Ok(handle)
    }

    fn invoke(&self, handle: Handle, method: &str, args: &[WireValue]) -> AbiResult<WireValue> {
        self.enter(method)?;
        let class = self.class_of(handle)?;
        let body = class
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| NativeError::UnknownMember {
                class_name: class.name.clone(),
                member: method.to_string(),
            })?;
        body(&HostCall {
            host: self,
            this: handle,
            args,
        })
    }

    fn get_property(&self, handle: Handle, name: &str) -> AbiResult<WireValue> {
        self.enter(name)?;
        let objects = self.objects.lock();
        let object = objects.get(&handle).ok_or(NativeError::UnknownHandle(handle))?;
        object
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| NativeError::UnknownMember {
                class_name: object.class_name.clone(),
                member: name.to_string(),
            })
    }

    fn set_property(&self, handle: Handle, name: &str, value: WireValue) -> AbiResult<()> {
        self.enter(name)?;
        let mut objects = self.objects.lock();
        let object = objects
            .get_mut(&handle)
            .ok_or(NativeError::UnknownHandle(handle))?;
        object.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn register_callback(&self, descriptor: &str, handle: Handle) -> AbiResult<()> {
        self.enter("register_callback")?;
        self.callbacks.lock().insert(handle, descriptor.to_string());
        Ok(())
    }

    fn invoke_callback(&self, handle: Handle, args: &[WireValue]) -> AbiResult<WireValue> {
        self.enter("invoke_callback")?;
        if !self.callbacks.lock().contains_key(&handle) {
            return Err(NativeError::UnknownHandle(handle));
        }
        let ctx = self.context()?;
        ctx.inbound()
            .try_invoke_callback(handle, args)
            .map_err(|err| NativeError::Fault(err.to_string()))
    }

    fn release(&self, handle: Handle) -> AbiResult<()> {
        self.enter("release")?;
        self.released.lock().push(handle);
        self.objects.lock().remove(&handle);
        self.callbacks.lock().remove(&handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_invoke() {
        let host = LoopbackHost::new();
        host.define_class(
            HostClass::new("demo.Counter")
                .constructor(|args| Ok(vec![("count".to_string(), args[0].clone())]))
                .method("increment", |call| {
                    let next = call.get("count")?.as_i32().unwrap_or(0) + 1;
                    call.set("count", WireValue::Int(next))?;
                    Ok(WireValue::Int(next))
                }),
        );

        let handle = host.create_instance("demo.Counter", &[WireValue::Int(4)]).unwrap();
        assert_eq!(host.invoke(handle, "increment", &[]).unwrap(), WireValue::Int(5));
        assert_eq!(host.get_property(handle, "count").unwrap(), WireValue::Int(5));
        assert!(matches!(
            host.invoke(handle, "decrement", &[]),
            Err(NativeError::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_release_is_idempotent_and_logged() {
        let host = LoopbackHost::new();
        let handle = host.spawn_object("demo.Thing", Vec::new());
        host.release(handle).unwrap();
        host.release(handle).unwrap();
        assert_eq!(host.released(), vec![handle, handle]);
        assert_eq!(host.object_count(), 0);
        assert!(matches!(
            host.get_property(handle, "x"),
            Err(NativeError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_failure_injection() {
        let host = LoopbackHost::new();
        let handle = host.spawn_object("demo.Thing", vec![("x".to_string(), WireValue::Int(1))]);
        host.fail_on("x");
        assert!(matches!(host.get_property(handle, "x"), Err(NativeError::Fault(_))));
        host.clear_failure("x");
        assert_eq!(host.get_property(handle, "x").unwrap(), WireValue::Int(1));
        assert!(host.call_count() >= 2);
    }

    #[test]
    fn test_callbacks_need_a_context() {
        let host = LoopbackHost::new();
        let handle = Handle::from_raw(1 << 30);
        host.register_callback("Func", handle).unwrap();
        assert_eq!(host.callback_descriptor(handle).as_deref(), Some("Func"));
        assert!(matches!(
            host.invoke_callback(handle, &[]),
            Err(NativeError::Fault(_))
        ));
        assert!(matches!(
            host.invoke_callback(Handle::from_raw(5), &[]),
            Err(NativeError::UnknownHandle(_))
        ));
    }
}
