use super::{AdvancedConfig, Transformer, TransformerKind, resolve_source, validate_inputs};
use crate::collector::{OutputRow, OutputRowCollector, RecordCollector};
use crate::column::InputRow;
use crate::error::HostError;
use crate::host::ScriptHost;
use crate::marshal::{to_output_field, to_output_rows, to_value_map};
use crate::script::{Arg, EntryPoint, ScriptEngine};
use crate::value::Value;
use std::sync::Arc;

/// `transform(map, out)`: emits any number of rows per record through `out`.
///
/// Rows collected during a call reach the sink only after the call returns
/// successfully, so a failing record contributes nothing.
pub struct AdvancedTransformer<E: ScriptEngine> {
    config: AdvancedConfig,
    host: ScriptHost<E>,
    sink: Arc<dyn OutputRowCollector>,
}

impl<E: ScriptEngine> AdvancedTransformer<E> {
    pub fn new(engine: Arc<E>, config: AdvancedConfig, sink: Arc<dyn OutputRowCollector>) -> Self {
        let host = ScriptHost::new(engine, EntryPoint::TRANSFORM_COLLECTING, config.policy());
        Self { config, host, sink }
    }

    pub fn config(&self) -> &AdvancedConfig {
        &self.config
    }

    fn collect_rows(
        &self,
        collector: &RecordCollector,
        returned: &Value,
    ) -> Result<Vec<OutputRow>, HostError> {
        let expected = self.config.output_fields;

        let mut rows: Vec<OutputRow> = collector
            .take()
            .into_iter()
            .map(|values| values.iter().map(to_output_field).collect())
            .collect();
        if self.config.emit_returned {
            rows.extend(to_output_rows(expected, returned));
        }

        rows.into_iter()
            .map(|row| self.config.shape.apply(row, expected))
            .collect()
    }
}

impl<E: ScriptEngine> Transformer for AdvancedTransformer<E> {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Advanced
    }

    fn output_columns(&self) -> Vec<String> {
        (1..=self.config.output_fields)
            .map(|i| format!("Script output ({i})"))
            .collect()
    }

    fn initialize(&mut self) -> Result<(), HostError> {
        validate_inputs(&self.config.inputs)?;
        let source = resolve_source(self.config.code.as_deref(), self.host.engine(), self.kind())?;
        self.host.initialize(&source)
    }

    fn transform(&self, row: &dyn InputRow) -> Result<Option<OutputRow>, HostError> {
        let values = to_value_map(&self.config.inputs, row);
        let collector = RecordCollector::new();

        let returned = self
            .host
            .call_transform(vec![Arg::Values(values), Arg::Collector(collector.clone())])?;

        let rows = self.collect_rows(&collector, &returned)?;
        tracing::trace!(rows = rows.len(), "record transformed");
        self.sink.put_rows(rows);
        Ok(None)
    }

    fn close(&mut self) -> Result<(), HostError> {
        self.host.close()
    }
}
