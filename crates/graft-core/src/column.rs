//! Input columns and rows.

use crate::error::HostError;
use crate::value::{Value, ValueMap};
use serde::{Deserialize, Serialize};

/// Declared type of an input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Values are passed through as they are.
    #[default]
    Any,
    String,
    Integer,
    Float,
    Boolean,
}

impl ColumnType {
    /// Parse a textual cell into a value of this type.
    ///
    /// Empty text is null for every type.
    pub fn parse_text(self, raw: &str) -> Result<Value, HostError> {
        if raw.is_empty() {
            return Ok(Value::Null);
        }

        match self {
            ColumnType::Any | ColumnType::String => Ok(Value::String(raw.to_string())),
            ColumnType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| HostError::Config(format!("'{raw}' is not an integer: {e}"))),
            ColumnType::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| HostError::Config(format!("'{raw}' is not a float: {e}"))),
            ColumnType::Boolean => match raw.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                other => Err(HostError::Config(format!("'{other}' is not a boolean"))),
            },
        }
    }
}

/// A reference to one column of the incoming rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputColumn {
    /// Display name; becomes the key in the value map.
    pub name: String,
    #[serde(default, rename = "type")]
    pub column_type: ColumnType,
}

impl InputColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Any,
        }
    }

    pub fn typed(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A record flowing through the pipeline.
pub trait InputRow {
    /// Value of `column` in this record, or null if absent.
    fn value(&self, column: &InputColumn) -> Value;
}

/// In-memory row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: ValueMap,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for a column name.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<ValueMap> for Row {
    fn from(values: ValueMap) -> Self {
        Self { values }
    }
}

impl InputRow for Row {
    fn value(&self, column: &InputColumn) -> Value {
        self.values.get(&column.name).cloned().unwrap_or(Value::Null)
    }
}
