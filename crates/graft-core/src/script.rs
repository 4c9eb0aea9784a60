//! The embedded-interpreter capability.
//!
//! The host never talks to a specific interpreter. An adapter implements
//! [`ScriptEngine`] (compile source), [`CompiledUnit`] (report entry points,
//! instantiate) and [`ScriptInstance`] (call an entry point).

use crate::collector::RecordCollector;
use crate::error::ScriptError;
use crate::transformer::TransformerKind;
use crate::value::{Value, ValueMap};

/// A named function the host looks for in a compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPoint {
    pub name: &'static str,
    pub arity: usize,
}

impl EntryPoint {
    /// Optional setup hook, called once after instantiation.
    pub const INITIALIZE: EntryPoint = EntryPoint {
        name: "initialize",
        arity: 0,
    };

    /// Optional teardown hook, called once before release.
    pub const CLOSE: EntryPoint = EntryPoint {
        name: "close",
        arity: 0,
    };

    /// `transform(map)`: returns the single output value.
    pub const TRANSFORM: EntryPoint = EntryPoint {
        name: "transform",
        arity: 1,
    };

    /// `transform(map, collector)`: emits rows through the collector.
    pub const TRANSFORM_COLLECTING: EntryPoint = EntryPoint {
        name: "transform",
        arity: 2,
    };
}

/// Entry points resolved once, when the unit is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoints {
    pub initialize: Option<EntryPoint>,
    pub transform: EntryPoint,
    pub close: Option<EntryPoint>,
}

impl EntryPoints {
    /// Resolve the hooks a unit defines. `transform` is required.
    pub fn resolve<U: CompiledUnit + ?Sized>(
        unit: &U,
        transform: EntryPoint,
    ) -> Result<Self, ScriptError> {
        if !unit.defines(&transform) {
            return Err(ScriptError::MissingEntryPoint {
                name: transform.name,
                arity: transform.arity,
            });
        }

        let optional = |entry: EntryPoint| unit.defines(&entry).then_some(entry);

        Ok(Self {
            initialize: optional(EntryPoint::INITIALIZE),
            transform,
            close: optional(EntryPoint::CLOSE),
        })
    }
}

/// An argument passed to an entry point.
#[derive(Debug, Clone)]
pub enum Arg {
    /// The record's ordered value map.
    Values(ValueMap),
    /// The per-call output collector.
    Collector(RecordCollector),
}

/// Compiles source text into loadable units.
pub trait ScriptEngine: Send + Sync {
    type Unit: CompiledUnit;

    /// Parse and load `source`.
    fn compile(&self, source: &str) -> Result<Self::Unit, ScriptError>;

    /// Working example script for a transformer kind, used when no code is configured.
    fn default_source(&self, kind: TransformerKind) -> Option<&'static str> {
        let _ = kind;
        None
    }
}

/// A compiled, not yet instantiated, unit of script logic.
pub trait CompiledUnit: Send + Sync {
    type Instance: ScriptInstance;

    /// Whether the unit defines `entry` with the matching arity.
    fn defines(&self, entry: &EntryPoint) -> bool;

    /// Produce the live instance that backs a transformer.
    fn instantiate(&self) -> Result<Self::Instance, ScriptError>;
}

/// A live script instance.
pub trait ScriptInstance: Send + Sync {
    /// Call an entry point without exclusive access.
    ///
    /// Used on the reentrant path, where other threads may be inside the
    /// same instance. State changes persist; the instance keeps its own
    /// state consistent but concurrent updates may interleave.
    fn invoke(&self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError>;

    /// Call an entry point with exclusive access; state changes persist.
    fn invoke_mut(&mut self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError>;
}
