//! Value marshalling across the boundary
//!
//! Outbound, primitives and strings are copied and objects become
//! references: a proxy contributes its own handle, a local object gets (or
//! reuses) a handle with strong retention so it stays resolvable until the
//! remote side releases it. Inbound, a reference to one of our own handles
//! resolves to the original object; any other handle becomes a proxy.

use crate::context::BridgeShared;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::RetentionMode;
use crate::value::Value;
use handlebridge_sdk::{WireValue, MAX_NESTING_DEPTH as MAX_DEPTH};

/// Convert a local value for the remote side
pub(crate) fn to_wire(shared: &BridgeShared, value: &Value) -> BridgeResult<WireValue> {
    to_wire_at(shared, value, 0)
}

/// Convert an argument list for the remote side
pub(crate) fn to_wire_all(shared: &BridgeShared, values: &[Value]) -> BridgeResult<Vec<WireValue>> {
    values.iter().map(|v| to_wire_at(shared, v, 0)).collect()
}

fn to_wire_at(shared: &BridgeShared, value: &Value, depth: usize) -> BridgeResult<WireValue> {
    if depth > MAX_DEPTH {
        return Err(BridgeError::MaxDepthExceeded);
    }

    Ok(match value {
        Value::Null => WireValue::Null,
        Value::Bool(b) => WireValue::Bool(*b),
        Value::Byte(v) => WireValue::Byte(*v),
        Value::Char(c) => WireValue::Char(*c),
        Value::Short(v) => WireValue::Short(*v),
        Value::Int(v) => WireValue::Int(*v),
        Value::Long(v) => WireValue::Long(*v),
        Value::Float(v) => WireValue::Float(*v),
        Value::Double(v) => WireValue::Double(*v),
        Value::String(s) => WireValue::String(s.clone()),
        Value::Array(items) => WireValue::Array(
            items
                .iter()
                .map(|item| to_wire_at(shared, item, depth + 1))
                .collect::<BridgeResult<Vec<_>>>()?,
        ),
        Value::Proxy(proxy) => WireValue::reference(proxy.handle(), proxy.class_name()),
        Value::Object(local) => {
            let handle = shared
                .table()
                .get_or_create(local, RetentionMode::StrongUntilReleased)?;
            WireValue::reference(handle, local.class_name())
        }
    })
}

/// Convert a value received from the remote side
pub(crate) fn from_wire(shared: &BridgeShared, value: WireValue) -> BridgeResult<Value> {
    from_wire_at(shared, value, 0)
}

/// Convert an argument list received from the remote side
pub(crate) fn from_wire_all(shared: &BridgeShared, values: &[WireValue]) -> BridgeResult<Vec<Value>> {
    values
        .iter()
        .map(|v| from_wire_at(shared, v.clone(), 0))
        .collect()
}

fn from_wire_at(shared: &BridgeShared, value: WireValue, depth: usize) -> BridgeResult<Value> {
    if depth > MAX_DEPTH {
        return Err(BridgeError::MaxDepthExceeded);
    }

    Ok(match value {
        WireValue::Null => Value::Null,
        WireValue::Bool(b) => Value::Bool(b),
        WireValue::Byte(v) => Value::Byte(v),
        WireValue::Char(c) => Value::Char(c),
        WireValue::Short(v) => Value::Short(v),
        WireValue::Int(v) => Value::Int(v),
        WireValue::Long(v) => Value::Long(v),
        WireValue::Float(v) => Value::Float(v),
        WireValue::Double(v) => Value::Double(v),
        WireValue::String(s) => Value::String(s),
        WireValue::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| from_wire_at(shared, item, depth + 1))
                .collect::<BridgeResult<Vec<_>>>()?,
        ),
        WireValue::Ref { handle, class_name } => shared.value_for_ref(handle, &class_name)?,
    })
}
