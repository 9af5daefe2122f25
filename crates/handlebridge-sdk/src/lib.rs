//! Handlebridge SDK - Boundary types shared by both sides of the bridge
//!
//! This crate defines what crosses the runtime boundary: opaque handles,
//! wire values, member descriptors and the [`NativeBridge`] primitive
//! surface a foreign runtime exposes.
//!
//! # Example
//!
//! ```ignore
//! use handlebridge_sdk::{AbiResult, FromWire, Handle, NativeBridge, WireValue};
//!
//! fn ping(bridge: &dyn NativeBridge, target: Handle) -> AbiResult<i32> {
//!     let reply = bridge.invoke(target, "ping", &[WireValue::Int(1)])?;
//!     i32::from_wire(reply)
//! }
//! ```

#![warn(missing_docs)]

mod bridge;
mod convert;
mod descriptor;
mod error;
mod handle;
mod value;

pub use bridge::NativeBridge;
pub use convert::{FromWire, ToWire};
pub use descriptor::{InterfaceSchema, Signature, TypeDescriptor, MAX_NESTING_DEPTH};
pub use error::{AbiResult, NativeError};
pub use handle::Handle;
pub use value::WireValue;
