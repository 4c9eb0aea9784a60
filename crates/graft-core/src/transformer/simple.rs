use super::{
    SINGLE_OUTPUT_COLUMN, SimpleConfig, Transformer, TransformerKind, resolve_source,
    transform_single, validate_inputs,
};
use crate::collector::OutputRow;
use crate::column::InputRow;
use crate::error::HostError;
use crate::host::ScriptHost;
use crate::policy::ExecutionPolicy;
use crate::script::{EntryPoint, ScriptEngine};
use std::sync::Arc;

/// A single `transform(map)` function; no hooks, always reentrant.
pub struct SimpleTransformer<E: ScriptEngine> {
    config: SimpleConfig,
    host: ScriptHost<E>,
}

impl<E: ScriptEngine> SimpleTransformer<E> {
    pub fn new(engine: Arc<E>, config: SimpleConfig) -> Self {
        let host = ScriptHost::new(engine, EntryPoint::TRANSFORM, ExecutionPolicy::Reentrant)
            .with_hooks(false);
        Self { config, host }
    }

    pub fn config(&self) -> &SimpleConfig {
        &self.config
    }
}

impl<E: ScriptEngine> Transformer for SimpleTransformer<E> {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Simple
    }

    fn output_columns(&self) -> Vec<String> {
        vec![SINGLE_OUTPUT_COLUMN.to_string()]
    }

    fn initialize(&mut self) -> Result<(), HostError> {
        validate_inputs(&self.config.inputs)?;
        let source = resolve_source(self.config.code.as_deref(), self.host.engine(), self.kind())?;
        self.host.initialize(&source)
    }

    fn transform(&self, row: &dyn InputRow) -> Result<Option<OutputRow>, HostError> {
        transform_single(&self.host, &self.config.inputs, row)
    }

    fn close(&mut self) -> Result<(), HostError> {
        self.host.close()
    }
}
