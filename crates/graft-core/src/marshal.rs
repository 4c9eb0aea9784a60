//! Marshalling between pipeline rows and script values.

use crate::collector::OutputRow;
use crate::column::{InputColumn, InputRow};
use crate::value::{Value, ValueMap};

/// Build the value map presented to a script for one record.
///
/// Keys are column display names, in configured column order. A repeated
/// name keeps its first position and takes the last value.
pub fn to_value_map(inputs: &[InputColumn], row: &dyn InputRow) -> ValueMap {
    let mut map = ValueMap::with_capacity(inputs.len());
    for column in inputs {
        map.insert(column.name.clone(), row.value(column));
    }
    map
}

/// Coerce a script result into a single output field.
///
/// Null becomes the null marker (`None`), strings pass through and every
/// other value uses its canonical textual form. Never fails.
pub fn to_output_field(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Coerce a structured result into a row of exactly `field_count` fields.
///
/// Sequences contribute their elements in order, maps their values in
/// order, and any other value fills the first field. Missing fields are
/// null and surplus values are dropped.
pub fn to_output_row(field_count: usize, value: &Value) -> OutputRow {
    let mut row: OutputRow = match value {
        Value::Array(items) => items.iter().map(to_output_field).collect(),
        Value::Object(entries) => entries.values().map(to_output_field).collect(),
        other => vec![to_output_field(other)],
    };
    row.resize(field_count, None);
    row
}

/// Split a direct return value into rows.
///
/// A sequence whose elements are all sequences yields one row per element;
/// null yields no rows; anything else is a single row.
pub(crate) fn to_output_rows(field_count: usize, value: &Value) -> Vec<OutputRow> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) if !items.is_empty() && items.iter().all(|v| v.as_array().is_some()) => {
            items.iter().map(|item| to_output_row(field_count, item)).collect()
        }
        other => vec![to_output_row(field_count, other)],
    }
}
