//! Conversion between graft values and rhai dynamics.

use crate::record::Record;
use rhi_graft_core::{Arg, Value, ValueMap};
use rhai::{Array, Dynamic, Map};

/// Convert a value for use inside a script. Objects become [`Record`]s.
pub fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Int(n) => Dynamic::from(*n),
        Value::Float(n) => Dynamic::from(*n),
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
        Value::Object(map) => Dynamic::from(Record::new(map.clone())),
    }
}

/// Convert a script result back into a value.
///
/// Unit is null. Types without a value counterpart use their string form.
pub fn from_dynamic(value: Dynamic) -> Value {
    let value = value.flatten();

    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(n) = value.as_int() {
        return Value::Int(n);
    }
    if let Ok(n) = value.as_float() {
        return Value::Float(n);
    }
    if let Ok(c) = value.as_char() {
        return Value::String(c.to_string());
    }
    if value.is_string() {
        return Value::String(value.to_string());
    }
    if value.is_array() {
        let items = value.cast::<Array>();
        return Value::Array(items.into_iter().map(from_dynamic).collect());
    }
    if value.is_map() {
        let map = value.cast::<Map>();
        return Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_string(), from_dynamic(v)))
                .collect::<ValueMap>(),
        );
    }
    if value.is::<Record>() {
        return Value::Object(value.cast::<Record>().into_inner());
    }

    Value::String(value.to_string())
}

/// Convert an entry-point argument.
pub(crate) fn to_arg(arg: Arg) -> Dynamic {
    match arg {
        Arg::Values(values) => Dynamic::from(Record::new(values)),
        Arg::Collector(collector) => Dynamic::from(collector),
    }
}
