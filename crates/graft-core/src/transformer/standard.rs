use super::{
    SINGLE_OUTPUT_COLUMN, StandardConfig, Transformer, TransformerKind, resolve_source,
    transform_single, validate_inputs,
};
use crate::collector::OutputRow;
use crate::column::InputRow;
use crate::error::HostError;
use crate::host::ScriptHost;
use crate::script::{EntryPoint, ScriptEngine};
use std::sync::Arc;

/// `transform(map)` with optional `initialize`/`close` hooks and a selectable policy.
pub struct StandardTransformer<E: ScriptEngine> {
    config: StandardConfig,
    host: ScriptHost<E>,
}

impl<E: ScriptEngine> StandardTransformer<E> {
    pub fn new(engine: Arc<E>, config: StandardConfig) -> Self {
        let host = ScriptHost::new(engine, EntryPoint::TRANSFORM, config.policy());
        Self { config, host }
    }

    pub fn config(&self) -> &StandardConfig {
        &self.config
    }
}

impl<E: ScriptEngine> Transformer for StandardTransformer<E> {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Standard
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
