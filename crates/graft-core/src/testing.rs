//! In-memory script engine for exercising the host without an interpreter.

use crate::error::ScriptError;
use crate::script::{Arg, CompiledUnit, EntryPoint, ScriptEngine, ScriptInstance};
use crate::transformer::TransformerKind;
use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = Arc<dyn Fn(&EntryPoint, Vec<Arg>) -> Result<Value, ScriptError> + Send + Sync>;

/// Counters shared by an engine and everything it produces.
#[derive(Debug, Default)]
pub(crate) struct MockStats {
    compiles: AtomicUsize,
    instantiations: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: Mutex<Vec<&'static str>>,
}

impl MockStats {
    pub(crate) fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub(crate) fn instantiations(&self) -> usize {
        self.instantiations.load(Ordering::SeqCst)
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_to(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|n| **n == name).count()
    }
}

/// Engine whose "source" is ignored unless it starts with `!`, which fails to compile.
pub(crate) struct MockEngine {
    defined: Vec<EntryPoint>,
    handler: Handler,
    delay: Option<Duration>,
    fail_instantiate: bool,
    stats: Arc<MockStats>,
}

impl MockEngine {
    /// Defines `transform(map)`, which echoes the value map back.
    pub(crate) fn new() -> Self {
        Self {
            defined: vec![EntryPoint::TRANSFORM],
            handler: Arc::new(echo),
            delay: None,
            fail_instantiate: false,
            stats: Arc::new(MockStats::default()),
        }
    }

    pub(crate) fn define(mut self, entry: EntryPoint) -> Self {
        self.defined.push(entry);
        self
    }

    pub(crate) fn undefine(mut self, entry: EntryPoint) -> Self {
        self.defined.retain(|e| *e != entry);
        self
    }

    pub(crate) fn on_call(
        mut self,
        handler: impl Fn(&EntryPoint, Vec<Arg>) -> Result<Value, ScriptError> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn failing_instantiation(mut self) -> Self {
        self.fail_instantiate = true;
        self
    }

    pub(crate) fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

/// Echo the value map for `transform(map)`; emit one row per entry for `transform(map, out)`.
fn echo(entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError> {
    let mut map = None;
    let mut collector = None;
    for arg in args {
        match arg {
            Arg::Values(values) => map = Some(values),
            Arg::Collector(c) => collector = Some(c),
        }
    }

    match (entry.name, map, collector) {
        ("transform", Some(map), Some(collector)) => {
            for (key, value) in map {
                collector.put_values(vec![Value::String(key), value]);
            }
            Ok(Value::Null)
        }
        ("transform", Some(map), None) => Ok(Value::Object(map)),
        _ => Ok(Value::Null),
    }
}

impl ScriptEngine for MockEngine {
    type Unit = MockUnit;

    fn compile(&self, source: &str) -> Result<MockUnit, ScriptError> {
        self.stats.compiles.fetch_add(1, Ordering::SeqCst);
        if source.starts_with('!') {
            return Err(ScriptError::Compilation(format!("unexpected token in '{source}'")));
        }
        Ok(MockUnit {
            defined: self.defined.clone(),
            handler: self.handler.clone(),
            delay: self.delay,
            fail_instantiate: self.fail_instantiate,
            stats: self.stats.clone(),
        })
    }

    fn default_source(&self, kind: TransformerKind) -> Option<&'static str> {
        match kind {
            TransformerKind::Simple => None,
            TransformerKind::Standard | TransformerKind::Advanced => Some("default"),
        }
    }
}

pub(crate) struct MockUnit {
    defined: Vec<EntryPoint>,
    handler: Handler,
    delay: Option<Duration>,
    fail_instantiate: bool,
    stats: Arc<MockStats>,
}

impl CompiledUnit for MockUnit {
    type Instance = MockInstance;

    fn defines(&self, entry: &EntryPoint) -> bool {
        self.defined.contains(entry)
    }

    fn instantiate(&self) -> Result<MockInstance, ScriptError> {
        self.stats.instantiations.fetch_add(1, Ordering::SeqCst);
        if self.fail_instantiate {
            return Err(ScriptError::Instantiation("constructor threw".into()));
        }
        Ok(MockInstance {
            handler: self.handler.clone(),
            delay: self.delay,
            stats: self.stats.clone(),
            mutations: 0,
        })
    }
}

pub(crate) struct MockInstance {
    handler: Handler,
    delay: Option<Duration>,
    stats: Arc<MockStats>,
    mutations: usize,
}

impl MockInstance {
    /// Number of calls made with exclusive access.
    pub(crate) fn mutations(&self) -> usize {
        self.mutations
    }

    fn run(&self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError> {
        let now = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(now, Ordering::SeqCst);
        self.stats.calls.lock().unwrap().push(entry.name);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let result = (self.handler)(entry, args);

        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ScriptInstance for MockInstance {
    fn invoke(&self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError> {
        self.run(entry, args)
    }

    fn invoke_mut(&mut self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError> {
        self.mutations += 1;
        self.run(entry, args)
    }
}
