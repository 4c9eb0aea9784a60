//! Graft: hosting user scripts inside row pipelines.
//!
//! A transformer compiles a script once, then calls its `transform` entry
//! point for every record. Column values are marshalled into an ordered
//! value map on the way in; results are coerced into the pipeline's output
//! columns on the way out, either as one returned value or as any number of
//! rows emitted through a collector.
//!
//! The interpreter itself is behind the [`ScriptEngine`] capability.

mod collector;
mod column;
mod error;
mod host;
mod job;
mod marshal;
mod policy;
mod script;
mod transformer;
mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::{OutputRow, OutputRowCollector, RecordCollector, RowBuffer};
pub use column::{ColumnType, InputColumn, InputRow, Row};
pub use error::{HostError, ScriptError};
pub use host::ScriptHost;
pub use job::{Job, JobError, Sink, Source};
pub use marshal::{to_output_field, to_output_row, to_value_map};
pub use policy::{ExecutionGate, ExecutionPolicy, ShapePolicy};
pub use script::{Arg, CompiledUnit, EntryPoint, EntryPoints, ScriptEngine, ScriptInstance};
pub use transformer::{
    AdvancedConfig, AdvancedTransformer, EngineOptions, SINGLE_OUTPUT_COLUMN, SimpleConfig,
    SimpleTransformer, StandardConfig, StandardTransformer, Transformer, TransformerConfig,
    TransformerKind, build_transformer,
};
pub use value::{Value, ValueMap, ValueMapExt};
