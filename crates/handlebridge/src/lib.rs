//! Handlebridge - Object lifetimes and delegates across a runtime boundary
//!
//! Two runtimes that exchange object references by integer handle need to
//! agree on what each handle means and when it stops meaning anything. This
//! crate is the local half of that agreement:
//!
//! - **Handle table**: stable, collision-free handles for local objects
//!   (auto-assigned or pinned), tracked weakly unless retained
//! - **Sentinels and sweeper**: every binding is released exactly once,
//!   whether explicitly, on proxy drop, by periodic sweep or at shutdown
//! - **Proxies**: typed stand-ins for remote objects
//! - **Delegates**: local functions callable from the remote side
//! - **Marshalling**: values in and out, with round-trip identity for
//!   objects
//!
//! The foreign runtime is reached through the
//! [`NativeBridge`](handlebridge_sdk::NativeBridge) trait; [`LoopbackHost`]
//! is an in-process implementation for tests and demos.
//!
//! # Example
//!
//! ```ignore
//! let host = Arc::new(LoopbackHost::new());
//! let ctx = BridgeContext::with_defaults(host.clone())?;
//! host.attach(&ctx);
//!
//! let add = ctx.create_delegate("Func", |_ctx, args| {
//!     let a = args[0].as_i32().unwrap_or(0);
//!     let b = args[1].as_i32().unwrap_or(0);
//!     Ok(Value::Int(a + b))
//! })?;
//! let sum = host.invoke_callback(add.handle(), &[WireValue::Int(1), WireValue::Int(2)])?;
//! assert_eq!(sum, WireValue::Int(3));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod delegate;
pub mod error;
pub mod exported;
pub mod handle;
pub mod inbound;
pub mod loopback;
mod marshal;
pub mod proxy;
pub mod sweeper;
pub mod value;

pub use config::BridgeConfig;
pub use context::{BridgeContext, WeakBridgeContext};
pub use delegate::{AdapterRecord, DelegateFn};
pub use error::{BridgeError, BridgeResult};
pub use exported::{unknown_member, Exported};
pub use handle::{HandleState, HandleStats, Origin, RetentionMode};
pub use inbound::Inbound;
pub use loopback::{HostCall, HostClass, LoopbackHost};
pub use proxy::Proxy;
pub use sweeper::SweepReport;
pub use value::{LocalObject, LocalRef, Value};

pub use handlebridge_sdk::{
    AbiResult, FromWire, Handle, InterfaceSchema, NativeBridge, NativeError, Signature, ToWire,
    TypeDescriptor, WireValue,
};
