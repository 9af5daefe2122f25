//! NativeBridge trait - Primitive surface of the foreign runtime
//!
//! Everything the local side does to remote objects goes through this
//! trait. Implementations wrap whatever transport reaches the other engine
//! (an embedded VM, a shared library, an in-process fake for tests).

use crate::error::AbiResult;
use crate::{Handle, WireValue};

/// Primitive operations exposed by the foreign runtime.
///
/// Handles passed in are either handles the foreign side minted (remote
/// objects) or handles the local side minted for its own objects.
/// Implementations must be safe to call from any thread; the local side
/// serializes calls through a single gate but may re-enter from inside a
/// callback.
pub trait NativeBridge: Send + Sync {
    /// Instantiate `class_name` with `args`, returning the handle the
    /// foreign runtime assigned to the new object
    fn create_instance(&self, class_name: &str, args: &[WireValue]) -> AbiResult<Handle>;

    /// Invoke `method` on the object named by `handle`
    fn invoke(&self, handle: Handle, method: &str, args: &[WireValue]) -> AbiResult<WireValue>;

    /// Read a property
    fn get_property(&self, handle: Handle, name: &str) -> AbiResult<WireValue>;

    /// Write a property
    fn set_property(&self, handle: Handle, name: &str, value: WireValue) -> AbiResult<()>;

    /// Tell the foreign runtime that `handle` names a local callable with
    /// the given descriptor, so it can build a callback object for it
    fn register_callback(&self, descriptor: &str, handle: Handle) -> AbiResult<()>;

    /// Invoke a callable by handle
    fn invoke_callback(&self, handle: Handle, args: &[WireValue]) -> AbiResult<WireValue>;

    /// Drop the foreign runtime's binding for `handle`.
    ///
    /// Must be idempotent: releasing an unknown or already released handle
    /// succeeds.
    fn release(&self, handle: Handle) -> AbiResult<()>;
}
