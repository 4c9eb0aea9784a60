//! Transformer variants.
//!
//! Every variant composes the value-map marshaller, a [`ScriptHost`] and the
//! execution policy. They differ in the `transform` arity they look for,
//! whether lifecycle hooks run and how results leave the script:
//!
//! | variant  | `transform` | hooks | concurrency  | output                   |
//! |----------|-------------|-------|--------------|--------------------------|
//! | simple   | `(map)`     | no    | reentrant    | one field                |
//! | standard | `(map)`     | yes   | configurable | one field                |
//! | advanced | `(map, out)`| yes   | configurable | N fields, 0..n rows/rec. |
//!
//! [`ScriptHost`]: crate::ScriptHost

mod advanced;
mod config;
mod simple;
mod standard;

pub use advanced::AdvancedTransformer;
pub use config::{AdvancedConfig, EngineOptions, SimpleConfig, StandardConfig, TransformerConfig};
pub use simple::SimpleTransformer;
pub use standard::StandardTransformer;

pub(crate) use config::{resolve_source, validate_inputs};

use crate::collector::{OutputRow, OutputRowCollector};
use crate::column::{InputColumn, InputRow};
use crate::error::HostError;
use crate::host::ScriptHost;
use crate::marshal::{to_output_field, to_value_map};
use crate::script::{Arg, ScriptEngine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Column name of the single output field of the simple and standard variants.
pub const SINGLE_OUTPUT_COLUMN: &str = "Script output";

/// A pipeline component that runs a user script once per record.
pub trait Transformer: Send + Sync {
    fn kind(&self) -> TransformerKind;

    /// Names of the produced columns. Depends on configuration only.
    fn output_columns(&self) -> Vec<String>;

    /// Compile and load the script. Must precede any `transform`.
    fn initialize(&mut self) -> Result<(), HostError>;

    /// Transform one record.
    ///
    /// Returns the output row for single-field variants and `None` for
    /// variants that emit through their output collector.
    fn transform(&self, row: &dyn InputRow) -> Result<Option<OutputRow>, HostError>;

    /// Run the script's finalizer and release it.
    fn close(&mut self) -> Result<(), HostError>;
}

/// The hosting variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformerKind {
    Simple,
    Standard,
    Advanced,
}

impl TransformerKind {
    pub const ALL: [TransformerKind; 3] = [
        TransformerKind::Simple,
        TransformerKind::Standard,
        TransformerKind::Advanced,
    ];

    /// Identifier used in configuration files.
    pub fn id(self) -> &'static str {
        match self {
            TransformerKind::Simple => "simple",
            TransformerKind::Standard => "standard",
            TransformerKind::Advanced => "advanced",
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            TransformerKind::Simple => "Script (simple)",
            TransformerKind::Standard => "Script",
            TransformerKind::Advanced => "Script (advanced)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TransformerKind::Simple => {
                "Single-function script returning one value per record. Always concurrent."
            }
            TransformerKind::Standard => {
                "Script with optional initialize/close hooks returning one value per record."
            }
            TransformerKind::Advanced => {
                "Script that emits any number of multi-field rows per record through an output collector."
            }
        }
    }
}

impl fmt::Display for TransformerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TransformerKind {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransformerKind::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| HostError::Config(format!("unknown transformer kind '{s}'")))
    }
}

/// Construct the transformer a configuration describes.
///
/// `sink` receives the rows of the advanced variant; the single-field
/// variants return their row directly and ignore it.
pub fn build_transformer<E: ScriptEngine + 'static>(
    engine: Arc<E>,
    config: TransformerConfig,
    sink: Arc<dyn OutputRowCollector>,
) -> Box<dyn Transformer> {
    match config {
        TransformerConfig::Simple(config) => Box::new(SimpleTransformer::new(engine, config)),
        TransformerConfig::Standard(config) => Box::new(StandardTransformer::new(engine, config)),
        TransformerConfig::Advanced(config) => {
            Box::new(AdvancedTransformer::new(engine, config, sink))
        }
    }
}

/// `transform(map)` followed by single-field coercion.
fn transform_single<E: ScriptEngine>(
    host: &ScriptHost<E>,
    inputs: &[InputColumn],
    row: &dyn InputRow,
) -> Result<Option<OutputRow>, HostError> {
    let values = to_value_map(inputs, row);
    let result = host.call_transform(vec![Arg::Values(values)])?;
    let field = to_output_field(&result);
    tracing::trace!(?field, "record transformed");
    Ok(Some(vec![field]))
}
