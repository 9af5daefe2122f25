//! End-to-end handle scenarios
//!
//! Tests cover:
//! - Auto handles: identity, resolve, idempotent release
//! - Pinned handles taking precedence over auto ones
//! - Delegates called back from the foreign runtime
//! - Stale local handles coming back from the foreign runtime

mod common;

use common::setup;
use handlebridge::{
    BridgeContext, BridgeError, Handle, HandleState, LocalRef, NativeBridge, NativeError, Proxy,
    RetentionMode, Value, WireValue,
};

#[test]
fn test_auto_handle_lifecycle() {
    let (host, ctx) = setup();
    let a = Value::object("A");

    let h1 = ctx.get_or_create_handle(&a, RetentionMode::Weak).unwrap();
    assert!(!h1.is_null());
    assert_eq!(ctx.get_or_create_handle(&a, RetentionMode::Weak).unwrap(), h1);
    assert_eq!(ctx.resolve(h1), Some(a.clone()));

    assert!(ctx.release(h1));
    assert_eq!(ctx.resolve(h1), None);
    assert!(!ctx.release(h1));
    assert_eq!(host.released(), vec![h1]);
}

#[test]
fn test_pinned_handle_precedence() {
    let (_host, ctx) = setup();
    let b = LocalRef::new("B");
    let pinned = Handle::from_raw(42);

    ctx.pin(&b, pinned).unwrap();
    assert_eq!(
        ctx.get_or_create_handle(&Value::Object(b.clone()), RetentionMode::Weak)
            .unwrap(),
        pinned
    );
    assert_eq!(ctx.resolve(pinned), Some(Value::Object(b.clone())));

    let other = LocalRef::new("C");
    assert!(matches!(
        ctx.pin(&other, pinned),
        Err(BridgeError::HandleConflict { handle }) if handle == pinned
    ));
}

#[test]
fn test_pinning_auto_object_releases_once() {
    let (host, ctx) = setup();
    let b = LocalRef::new("B");
    let auto = ctx
        .get_or_create_handle(&Value::Object(b.clone()), RetentionMode::Weak)
        .unwrap();
    let pinned = Handle::from_raw(42);

    ctx.pin(&b, pinned).unwrap();
    assert!(ctx.resolve(auto).is_none());
    assert_eq!(ctx.stats().total, 1);

    drop(b);
    ctx.sweep_now();
    assert_eq!(host.released(), vec![pinned]);
    assert_eq!(ctx.stats().total, 0);
}

#[test]
fn test_delegate_called_from_remote() {
    let (host, ctx) = setup();
    let add = ctx
        .create_delegate("Func", |_ctx, args| {
            let a = args[0].as_i32().unwrap_or(0);
            let b = args[1].as_i32().unwrap_or(0);
            Ok(Value::Int(a + b))
        })
        .unwrap();
    let h = add.handle();
    assert!(add.is_delegate());
    assert_eq!(host.callback_descriptor(h).as_deref(), Some("Func"));

    let args = [WireValue::Int(1), WireValue::Int(2)];
    assert_eq!(host.invoke_callback(h, &args).unwrap(), WireValue::Int(3));
    assert_eq!(ctx.inbound().invoke_callback(h, &args), WireValue::Int(3));
}

#[test]
fn test_failing_delegate_answers_null() {
    let (host, ctx) = setup();
    let failing = ctx
        .create_delegate("Func", |_ctx, _args| Err(NativeError::Fault("nope".to_string())))
        .unwrap();
    let panicking = ctx
        .create_delegate("Func", |_ctx, _args| panic!("delegate bug"))
        .unwrap();

    assert_eq!(ctx.inbound().invoke_callback(failing.handle(), &[]), WireValue::Null);
    assert_eq!(ctx.inbound().invoke_callback(panicking.handle(), &[]), WireValue::Null);
    assert!(matches!(
        ctx.inbound().try_invoke_callback(panicking.handle(), &[]),
        Err(BridgeError::CallbackFault {
            source: NativeError::Panic(_),
            ..
        })
    ));
    assert!(host.invoke_callback(failing.handle(), &[]).is_err());
}

#[test]
fn test_delegate_result_objects_are_retained() {
    let (_host, ctx) = setup();
    let maker = ctx
        .create_delegate("Supplier", |_ctx, _args| Ok(Value::object(String::from("fresh"))))
        .unwrap();

    let reply = ctx.inbound().invoke_callback(maker.handle(), &[]);
    let handle = reply.as_handle().unwrap();
    ctx.sweep_now();

    let value = ctx.resolve(handle).unwrap();
    assert_eq!(
        value.downcast::<String>().as_deref().map(String::as_str),
        Some("fresh")
    );
}

#[test]
fn test_delegate_survives_until_remote_release() {
    let (host, ctx) = setup();
    let delegate = ctx
        .create_delegate("Func", |_ctx, _args| Ok(Value::Int(1)))
        .unwrap();
    let h = delegate.handle();

    drop(delegate);
    ctx.sweep_now();
    assert_eq!(host.invoke_callback(h, &[]).unwrap(), WireValue::Int(1));

    assert!(host.drop_local(h));
    ctx.sweep_now();
    assert!(ctx.resolve(h).is_none());
    assert!(host.released().contains(&h));
    assert!(!host.holds(h));
}

#[test]
fn test_stale_callback_handle_answers_null() {
    let (_host, ctx) = setup();
    let unknown = Handle::from_raw(123_456);
    assert_eq!(ctx.inbound().invoke_callback(unknown, &[]), WireValue::Null);
    assert!(matches!(
        ctx.inbound().try_invoke_callback(unknown, &[]),
        Err(BridgeError::StaleHandle(h)) if h == unknown
    ));
}

/// Delegate answering with the type name of its first argument
fn arg_inspector(ctx: &BridgeContext) -> Proxy {
    ctx.create_delegate("Func", |_ctx, args| {
        Ok(Value::from(args.first().map_or("missing", Value::type_name)))
    })
    .unwrap()
}

#[test]
fn test_dead_local_ref_reads_null() {
    let (host, ctx) = setup();
    let inspect = arg_inspector(&ctx);
    let object = Value::object(11u32);
    let h = ctx.get_or_create_handle(&object, RetentionMode::Weak).unwrap();
    drop(object);
    assert_eq!(ctx.state(h), Some(HandleState::PendingRelease));

    let reply = ctx
        .inbound()
        .invoke_callback(inspect.handle(), &[WireValue::reference(h, "x")]);
    assert_eq!(reply, WireValue::String("null".to_string()));
    assert!(ctx.proxy_for(h).is_none());
    assert_eq!(ctx.state(h), Some(HandleState::PendingRelease));

    ctx.sweep_now();
    assert_eq!(host.released(), vec![h]);
}

#[test]
fn test_swept_local_ref_reads_null() {
    let (host, ctx) = setup();
    let inspect = arg_inspector(&ctx);
    let object = Value::object(12u32);
    let h = ctx.get_or_create_handle(&object, RetentionMode::Weak).unwrap();
    drop(object);
    ctx.sweep_now();
    assert!(!ctx.is_bound(h));

    let reply = ctx
        .inbound()
        .invoke_callback(inspect.handle(), &[WireValue::reference(h, "x")]);
    assert_eq!(reply, WireValue::String("null".to_string()));
    assert!(!ctx.is_bound(h));
    assert!(ctx.proxy_for(h).is_none());

    ctx.sweep_now();
    assert_eq!(host.released(), vec![h]);
}

#[test]
fn test_dead_pinned_ref_reads_null() {
    let (_host, ctx) = setup();
    let inspect = arg_inspector(&ctx);
    let pinned = Handle::from_raw(77);
    let object = LocalRef::new("pinned");
    ctx.pin(&object, pinned).unwrap();
    drop(object);

    let reply = ctx
        .inbound()
        .invoke_callback(inspect.handle(), &[WireValue::reference(pinned, "x")]);
    assert_eq!(reply, WireValue::String("null".to_string()));
    assert!(ctx.proxy_for(pinned).is_none());
}

#[test]
fn test_remote_ref_still_becomes_proxy() {
    let (host, ctx) = setup();
    let inspect = arg_inspector(&ctx);
    let minted = host.spawn_object("demo.Point", vec![]);

    let reply = ctx
        .inbound()
        .invoke_callback(inspect.handle(), &[host.reference(minted)]);
    assert_eq!(reply, WireValue::String("proxy".to_string()));
}
