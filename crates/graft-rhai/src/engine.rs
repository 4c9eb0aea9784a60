//! [`ScriptEngine`] implementation backed by rhai.

use crate::convert::{from_dynamic, to_arg};
use crate::defaults;
use crate::record::{register_collector, register_record};
use rhi_graft_core::{
    Arg, CompiledUnit, EngineOptions, EntryPoint, ScriptEngine, ScriptError, ScriptInstance,
    TransformerKind, Value,
};
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Position, Scope};
use std::cell::Cell;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Operations between two deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Entry name reported when the top-level statements exceed the time limit.
const TOP_LEVEL: &str = "<top level>";

thread_local! {
    static DEADLINE: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// Arms the per-call deadline on this thread and restores the previous one on drop.
struct DeadlineGuard {
    previous: Option<Instant>,
}

impl DeadlineGuard {
    fn arm(limit: Duration) -> Self {
        let previous = DEADLINE.with(|d| d.replace(Some(Instant::now() + limit)));
        Self { previous }
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        DEADLINE.with(|d| d.set(self.previous));
    }
}

fn deadline_passed(operations: u64) -> Option<Dynamic> {
    if operations % DEADLINE_CHECK_INTERVAL != 0 {
        return None;
    }
    DEADLINE
        .with(Cell::get)
        .filter(|deadline| Instant::now() >= *deadline)
        .map(|_| Dynamic::from("time limit exceeded".to_string()))
}

/// Compiles rhai source into units with `initialize`/`transform`/`close` entry points.
///
/// Script state that must survive between calls lives on `this`, an object
/// map bound to every entry-point call.
pub struct RhaiEngine {
    engine: Arc<Engine>,
    options: EngineOptions,
}

impl std::fmt::Debug for RhaiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiEngine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            engine: Arc::new(Self::create_engine(&options)),
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn create_engine(options: &EngineOptions) -> Engine {
        let mut engine = Engine::new();

        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(options.max_call_levels);
        if let Some(max) = options.max_operations {
            engine.set_max_operations(max);
        }
        if let Some(max) = options.max_string_size {
            engine.set_max_string_size(max);
        }
        if options.timeout_ms.is_some() {
            engine.on_progress(deadline_passed);
        }

        engine.on_print(|text| tracing::info!(target: "graft::script", "{text}"));
        engine.on_debug(|text, source, pos: Position| {
            tracing::debug!(target: "graft::script", source = source.unwrap_or(""), %pos, "{text}")
        });

        register_record(&mut engine);
        register_collector(&mut engine);
        engine
    }
}

impl ScriptEngine for RhaiEngine {
    type Unit = RhaiUnit;

    fn compile(&self, source: &str) -> Result<RhaiUnit, ScriptError> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| ScriptError::Compilation(e.to_string()))?;

        let functions = ast
            .iter_functions()
            .map(|f| (f.name.to_string(), f.params.len()))
            .collect();

        Ok(RhaiUnit {
            runtime: Runtime {
                engine: self.engine.clone(),
                ast: Arc::new(ast),
                timeout: self.options.timeout(),
            },
            functions,
        })
    }

    fn default_source(&self, kind: TransformerKind) -> Option<&'static str> {
        Some(defaults::default_source(kind))
    }
}

/// What every call needs: the engine, the compiled script and the time limit.
#[derive(Clone)]
struct Runtime {
    engine: Arc<Engine>,
    ast: Arc<AST>,
    timeout: Option<Duration>,
}

impl Runtime {
    fn call(
        &self,
        this: &mut Dynamic,
        entry: &EntryPoint,
        args: Vec<Arg>,
    ) -> Result<Value, ScriptError> {
        let args: Vec<Dynamic> = args.into_iter().map(to_arg).collect();
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(this);
        let mut scope = Scope::new();

        let _deadline = self.timeout.map(DeadlineGuard::arm);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, entry.name, args)
            .map(from_dynamic)
            .map_err(|e| self.call_error(entry, *e))
    }

    fn call_error(&self, entry: &EntryPoint, err: EvalAltResult) -> ScriptError {
        match (err, self.timeout) {
            (EvalAltResult::ErrorTerminated(..), Some(limit)) => ScriptError::Timeout {
                entry: entry.name,
                limit,
            },
            (err, _) => ScriptError::invocation(entry.name, err.to_string()),
        }
    }

    /// Run the top-level statements.
    fn run_top_level(&self) -> Result<(), ScriptError> {
        let mut scope = Scope::new();
        let _deadline = self.timeout.map(DeadlineGuard::arm);
        self.engine
            .run_ast_with_scope(&mut scope, &self.ast)
            .map_err(|e| match (*e, self.timeout) {
                (EvalAltResult::ErrorTerminated(..), Some(limit)) => ScriptError::Timeout {
                    entry: TOP_LEVEL,
                    limit,
                },
                (err, _) => ScriptError::Instantiation(err.to_string()),
            })
    }
}

/// A compiled rhai script.
pub struct RhaiUnit {
    runtime: Runtime,
    functions: HashSet<(String, usize)>,
}

impl std::fmt::Debug for RhaiUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiUnit")
            .field("functions", &self.functions)
            .finish_non_exhaustive()
    }
}

impl CompiledUnit for RhaiUnit {
    type Instance = RhaiInstance;

    fn defines(&self, entry: &EntryPoint) -> bool {
        self.functions.contains(&(entry.name.to_string(), entry.arity))
    }

    /// Runs the script's top-level statements once.
    fn instantiate(&self) -> Result<RhaiInstance, ScriptError> {
        self.runtime.run_top_level()?;

        Ok(RhaiInstance {
            runtime: self.runtime.clone(),
            this: Dynamic::from_map(Map::new()).into_shared(),
        })
    }
}

/// A live rhai script together with its `this` state.
///
/// `this` is a shared value: every call, reentrant or not, reads and writes
/// the same map. Reentrant callers may interleave their updates.
pub struct RhaiInstance {
    runtime: Runtime,
    this: Dynamic,
}

impl RhaiInstance {
    /// The script's `this` state.
    pub fn state(&self) -> Value {
        from_dynamic(self.this.flatten_clone())
    }
}

impl ScriptInstance for RhaiInstance {
    fn invoke(&self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError> {
        // Cloning a shared value clones the handle, not the map.
        let mut this = self.this.clone();
        self.runtime.call(&mut this, entry, args)
    }

    fn invoke_mut(&mut self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError> {
        self.runtime.call(&mut self.this, entry, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_graft_core::{RecordCollector, ValueMap, ValueMapExt};

    fn instance(source: &str) -> RhaiInstance {
        RhaiEngine::new().compile(source).unwrap().instantiate().unwrap()
    }

    #[test]
    fn test_compile_error() {
        let err = RhaiEngine::new().compile("fn transform(map) {").unwrap_err();
        assert!(matches!(err, ScriptError::Compilation(_)));
    }

    #[test]
    fn test_defines_by_arity() {
        let unit = RhaiEngine::new()
            .compile("fn initialize() {} fn transform(map, out) {}")
            .unwrap();

        assert!(unit.defines(&EntryPoint::INITIALIZE));
        assert!(unit.defines(&EntryPoint::TRANSFORM_COLLECTING));
        assert!(!unit.defines(&EntryPoint::TRANSFORM));
        assert!(!unit.defines(&EntryPoint::CLOSE));
    }

    #[test]
    fn test_instantiation_error() {
        let unit = RhaiEngine::new()
            .compile(r#"throw "no database"; fn transform(map) { 1 }"#)
            .unwrap();
        assert!(matches!(unit.instantiate(), Err(ScriptError::Instantiation(_))));
    }

    #[test]
    fn test_invoke_returns_value() {
        let instance = instance("fn transform(map) { map.len() * 2 }");
        let args = vec![Arg::Values(ValueMap::new().with("a", 1i64).with("b", 2i64))];

        assert_eq!(instance.invoke(&EntryPoint::TRANSFORM, args).unwrap(), Value::Int(4));
    }

    #[test]
    fn test_invocation_error() {
        let instance = instance(r#"fn transform(map) { throw "bad row" }"#);

        let err = instance
            .invoke(&EntryPoint::TRANSFORM, vec![Arg::Values(ValueMap::new())])
            .unwrap_err();
        assert!(matches!(err, ScriptError::Invocation { entry: "transform", .. }));
    }

    #[test]
    fn test_state_persists_with_exclusive_access() {
        let mut instance = instance(
            r#"
            fn initialize() { this.count = 0; }
            fn transform(map) { this.count += 1; this.count }
            "#,
        );
        instance.invoke_mut(&EntryPoint::INITIALIZE, Vec::new()).unwrap();

        let args = || vec![Arg::Values(ValueMap::new())];
        instance.invoke_mut(&EntryPoint::TRANSFORM, args()).unwrap();
        let count = instance.invoke_mut(&EntryPoint::TRANSFORM, args()).unwrap();

        assert_eq!(count, Value::Int(2));
        assert_eq!(instance.state(), Value::from(ValueMap::new().with("count", 2i64)));
    }

    #[test]
    fn test_state_persists_with_shared_access() {
        let mut instance = instance(
            r#"
            fn initialize() { this.count = 10; }
            fn transform(map) { this.count += 1; this.count }
            "#,
        );
        instance.invoke_mut(&EntryPoint::INITIALIZE, Vec::new()).unwrap();

        let args = || vec![Arg::Values(ValueMap::new())];
        assert_eq!(instance.invoke(&EntryPoint::TRANSFORM, args()).unwrap(), Value::Int(11));
        assert_eq!(instance.invoke(&EntryPoint::TRANSFORM, args()).unwrap(), Value::Int(12));
        assert_eq!(instance.state(), Value::from(ValueMap::new().with("count", 12i64)));
    }

    #[test]
    fn test_top_level_timeout() {
        let engine = RhaiEngine::with_options(EngineOptions {
            timeout_ms: Some(20),
            ..EngineOptions::default()
        });
        let unit = engine
            .compile("let x = 0; loop { x += 1; } fn transform(map) { 1 }")
            .unwrap();

        assert!(matches!(
            unit.instantiate(),
            Err(ScriptError::Timeout { entry: TOP_LEVEL, .. })
        ));
    }

    #[test]
    fn test_collector_argument() {
        let instance = instance("fn transform(map, out) { out.put_values(map.len()); }");
        let out = RecordCollector::new();

        let args = vec![
            Arg::Values(ValueMap::new().with("a", 1i64)),
            Arg::Collector(out.clone()),
        ];
        let returned = instance.invoke(&EntryPoint::TRANSFORM_COLLECTING, args).unwrap();

        assert_eq!(returned, Value::Null);
        assert_eq!(out.take(), vec![vec![Value::Int(1)]]);
    }

    #[test]
    fn test_timeout() {
        let engine = RhaiEngine::with_options(EngineOptions {
            timeout_ms: Some(50),
            ..EngineOptions::default()
        });
        let instance = engine
            .compile("fn transform(map) { let x = 0; loop { x += 1; } }")
            .unwrap()
            .instantiate()
            .unwrap();

        let err = instance
            .invoke(&EntryPoint::TRANSFORM, vec![Arg::Values(ValueMap::new())])
            .unwrap_err();
        assert!(matches!(err, ScriptError::Timeout { entry: "transform", .. }));

        // The deadline is disarmed once the call returns.
        assert!(DEADLINE.with(Cell::get).is_none());
    }

    #[test]
    fn test_operation_budget() {
        let engine = RhaiEngine::with_options(EngineOptions {
            max_operations: Some(1_000),
            ..EngineOptions::default()
        });
        let instance = engine
            .compile("fn transform(map) { let x = 0; loop { x += 1; } }")
            .unwrap()
            .instantiate()
            .unwrap();

        let err = instance
            .invoke(&EntryPoint::TRANSFORM, vec![Arg::Values(ValueMap::new())])
            .unwrap_err();
        assert!(matches!(err, ScriptError::Invocation { .. }));
    }
}
