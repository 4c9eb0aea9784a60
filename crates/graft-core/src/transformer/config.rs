//! Transformer and engine configuration.

use crate::column::InputColumn;
use crate::error::HostError;
use crate::policy::{ExecutionPolicy, ShapePolicy};
use crate::script::ScriptEngine;
use crate::transformer::TransformerKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_concurrent() -> bool {
    true
}

fn default_output_fields() -> usize {
    2
}

fn default_max_call_levels() -> usize {
    64
}

/// Configuration of the simple variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimpleConfig {
    pub inputs: Vec<InputColumn>,
    /// Script source; the engine's example script when absent.
    #[serde(default)]
    pub code: Option<String>,
}

impl SimpleConfig {
    pub fn new(inputs: Vec<InputColumn>) -> Self {
        Self { inputs, code: None }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Configuration of the standard variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandardConfig {
    pub inputs: Vec<InputColumn>,
    /// Let concurrent callers enter the script simultaneously.
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,
    #[serde(default)]
    pub code: Option<String>,
}

impl StandardConfig {
    pub fn new(inputs: Vec<InputColumn>) -> Self {
        Self {
            inputs,
            concurrent: default_concurrent(),
            code: None,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn policy(&self) -> ExecutionPolicy {
        ExecutionPolicy::from_concurrent(self.concurrent)
    }
}

/// Configuration of the advanced variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdvancedConfig {
    pub inputs: Vec<InputColumn>,
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,
    /// Declared number of output fields.
    #[serde(default = "default_output_fields")]
    pub output_fields: usize,
    /// How emitted rows that do not match `output_fields` are treated.
    #[serde(default)]
    pub shape: ShapePolicy,
    /// Also emit rows from a non-null direct return value.
    #[serde(default)]
    pub emit_returned: bool,
    #[serde(default)]
    pub code: Option<String>,
}

impl AdvancedConfig {
    pub fn new(inputs: Vec<InputColumn>) -> Self {
        Self {
            inputs,
            concurrent: default_concurrent(),
            output_fields: default_output_fields(),
            shape: ShapePolicy::default(),
            emit_returned: false,
            code: None,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn output_fields(mut self, output_fields: usize) -> Self {
        self.output_fields = output_fields;
        self
    }

    pub fn shape(mut self, shape: ShapePolicy) -> Self {
        self.shape = shape;
        self
    }

    pub fn emit_returned(mut self, emit_returned: bool) -> Self {
        self.emit_returned = emit_returned;
        self
    }

    pub fn policy(&self) -> ExecutionPolicy {
        ExecutionPolicy::from_concurrent(self.concurrent)
    }
}

/// Configuration of any variant, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransformerConfig {
    Simple(SimpleConfig),
    Standard(StandardConfig),
    Advanced(AdvancedConfig),
}

impl TransformerConfig {
    pub fn kind(&self) -> TransformerKind {
        match self {
            TransformerConfig::Simple(_) => TransformerKind::Simple,
            TransformerConfig::Standard(_) => TransformerKind::Standard,
            TransformerConfig::Advanced(_) => TransformerKind::Advanced,
        }
    }

    pub fn inputs(&self) -> &[InputColumn] {
        match self {
            TransformerConfig::Simple(c) => &c.inputs,
            TransformerConfig::Standard(c) => &c.inputs,
            TransformerConfig::Advanced(c) => &c.inputs,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            TransformerConfig::Simple(c) => c.code.as_deref(),
            TransformerConfig::Standard(c) => c.code.as_deref(),
            TransformerConfig::Advanced(c) => c.code.as_deref(),
        }
    }
}

impl From<SimpleConfig> for TransformerConfig {
    fn from(config: SimpleConfig) -> Self {
        TransformerConfig::Simple(config)
    }
}

impl From<StandardConfig> for TransformerConfig {
    fn from(config: StandardConfig) -> Self {
        TransformerConfig::Standard(config)
    }
}

impl From<AdvancedConfig> for TransformerConfig {
    fn from(config: AdvancedConfig) -> Self {
        TransformerConfig::Advanced(config)
    }
}

/// Limits applied by the interpreter adapter to every compiled unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    /// Operation budget per call; unlimited when absent.
    #[serde(default)]
    pub max_operations: Option<u64>,
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,
    /// Longest string a script may build; unlimited when absent.
    #[serde(default)]
    pub max_string_size: Option<usize>,
    /// Wall-clock limit per call in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_operations: None,
            max_call_levels: default_max_call_levels(),
            max_string_size: None,
            timeout_ms: None,
        }
    }
}

impl EngineOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Check the configured input columns before a lifecycle starts.
pub(crate) fn validate_inputs(inputs: &[InputColumn]) -> Result<(), HostError> {
    if inputs.is_empty() {
        return Err(HostError::Config("at least one input column is required".into()));
    }
    if let Some(column) = inputs.iter().find(|c| c.name.is_empty()) {
        return Err(HostError::Config(format!(
            "input column names must not be empty (type {:?})",
            column.column_type
        )));
    }
    Ok(())
}

/// The configured script source, or the engine's example for `kind`.
pub(crate) fn resolve_source<E: ScriptEngine + ?Sized>(
    code: Option<&str>,
    engine: &E,
    kind: TransformerKind,
) -> Result<String, HostError> {
    match code {
        Some(code) => Ok(code.to_string()),
        None => engine.default_source(kind).map(str::to_string).ok_or_else(|| {
            HostError::Config(format!("no code configured for the {} transformer", kind.id()))
        }),
    }
}
