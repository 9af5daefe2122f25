//! Shared fixtures for the integration tests

#![allow(dead_code)]

use handlebridge::{BridgeConfig, BridgeContext, HostClass, LoopbackHost, NativeBridge, NativeError, WireValue};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route bridge logs to the test harness; `RUST_LOG=handlebridge=trace` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration with the background sweeper off; tests sweep explicitly
pub fn manual_config() -> BridgeConfig {
    BridgeConfig {
        sweeper_enabled: false,
        ..BridgeConfig::default()
    }
}

fn int_arg(args: &[WireValue], index: usize) -> Result<i32, NativeError> {
    args.get(index)
        .and_then(WireValue::as_i32)
        .ok_or_else(|| NativeError::ArgumentError(format!("argument {} must be an int", index)))
}

/// Host with a few demo classes:
///
/// - `demo.Point(x, y)`: `sum()`, `echo(v)`, `callWith(fn, a, b)`, `scale(k)`
/// - `demo.Factory()`: `make(x, y)` returns a new point
pub fn demo_host() -> Arc<LoopbackHost> {
    let host = Arc::new(LoopbackHost::new());
    host.define_class(
        HostClass::new("demo.Point")
            .constructor(|args| {
                Ok(vec![
                    ("x".to_string(), WireValue::Int(int_arg(args, 0)?)),
                    ("y".to_string(), WireValue::Int(int_arg(args, 1)?)),
                ])
            })
            .method("sum", |call| {
                let x = call.get("x")?.as_i32().unwrap_or(0);
                let y = call.get("y")?.as_i32().unwrap_or(0);
                Ok(WireValue::Int(x + y))
            })
            .method("echo", |call| Ok(call.arg(0)?.clone()))
            .method("callWith", |call| {
                let callback = call
                    .arg(0)?
                    .as_handle()
                    .ok_or_else(|| NativeError::ArgumentError("expected a callback".to_string()))?;
                call.host()
                    .invoke_callback(callback, &call.args()[1..])
            })
            .method("scale", |call| {
                let k = int_arg(call.args(), 0)?;
                for axis in ["x", "y"] {
                    let v = call.get(axis)?.as_i32().unwrap_or(0);
                    call.set(axis, WireValue::Int(v * k))?;
                }
                Ok(WireValue::Null)
            }),
    );
    host.define_class(HostClass::new("demo.Factory").method("make", |call| {
        let handle = call.host().spawn_object(
            "demo.Point",
            vec![
                ("x".to_string(), WireValue::Int(int_arg(call.args(), 0)?)),
                ("y".to_string(), WireValue::Int(int_arg(call.args(), 1)?)),
            ],
        );
        Ok(call.host().reference(handle))
    }));
    host
}

/// Demo host plus an attached context with manual sweeping
pub fn setup() -> (Arc<LoopbackHost>, BridgeContext) {
    setup_with(manual_config())
}

pub fn setup_with(config: BridgeConfig) -> (Arc<LoopbackHost>, BridgeContext) {
    init_tracing();
    let host = demo_host();
    let ctx = BridgeContext::new(host.clone(), config).expect("context");
    host.attach(&ctx);
    (host, ctx)
}
