//! Lifecycle of one hosted script: compile once, invoke many, close.

use crate::error::HostError;
use crate::policy::{ExecutionGate, ExecutionPolicy};
use crate::script::{Arg, CompiledUnit, EntryPoint, EntryPoints, ScriptEngine};
use crate::value::Value;
use std::sync::Arc;

type InstanceOf<E> = <<E as ScriptEngine>::Unit as CompiledUnit>::Instance;

enum State<I> {
    Uninitialized,
    Ready {
        entries: EntryPoints,
        gate: ExecutionGate<I>,
    },
    Closed,
}

/// Owns a script instance across its `Uninitialized -> Ready -> Closed` lifecycle.
///
/// `initialize` and `close` take `&mut self`, so callers must quiesce workers
/// around them. `call_transform` takes `&self` and may be called from many
/// threads at once; the configured [`ExecutionPolicy`] decides whether those
/// calls overlap inside the script.
pub struct ScriptHost<E: ScriptEngine> {
    engine: Arc<E>,
    transform: EntryPoint,
    policy: ExecutionPolicy,
    hooks: bool,
    state: State<InstanceOf<E>>,
}

impl<E: ScriptEngine> ScriptHost<E> {
    /// A host that calls `transform` and the `initialize`/`close` hooks when present.
    pub fn new(engine: Arc<E>, transform: EntryPoint, policy: ExecutionPolicy) -> Self {
        Self {
            engine,
            transform,
            policy,
            hooks: true,
            state: State::Uninitialized,
        }
    }

    /// Whether the script's own `initialize`/`close` hooks are invoked.
    pub fn with_hooks(mut self, hooks: bool) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Compile `source`, instantiate it and run its `initialize` hook.
    ///
    /// Allowed from `Uninitialized` and from `Closed` (a fresh run). On any
    /// failure the host keeps its previous state and nothing can be invoked.
    pub fn initialize(&mut self, source: &str) -> Result<(), HostError> {
        if self.is_ready() {
            return Err(HostError::AlreadyInitialized);
        }

        tracing::debug!(
            bytes = source.len(),
            entry = self.transform.name,
            arity = self.transform.arity,
            policy = ?self.policy,
            "compiling script"
        );

        let unit = self.engine.compile(source)?;
        let entries = EntryPoints::resolve(&unit, self.transform)?;
        let mut gate = ExecutionGate::new(unit.instantiate()?, self.policy);

        if self.hooks {
            if let Some(hook) = entries.initialize {
                gate.call_mut(&hook, Vec::new())?;
            }
        }

        self.state = State::Ready { entries, gate };
        tracing::debug!("script host ready");
        Ok(())
    }

    /// Call the script's `transform` entry point.
    pub fn call_transform(&self, args: Vec<Arg>) -> Result<Value, HostError> {
        match &self.state {
            State::Ready { entries, gate } => Ok(gate.call(&entries.transform, args)?),
            State::Uninitialized => Err(HostError::NotInitialized),
            State::Closed => Err(HostError::Closed),
        }
    }

    /// Run the script's `close` hook and release the instance.
    ///
    /// The host ends up `Closed` even if the hook fails; the hook's error is
    /// still returned. Closing a closed host does nothing.
    pub fn close(&mut self) -> Result<(), HostError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Ready { entries, mut gate } => {
                let result = match entries.close {
                    Some(hook) if self.hooks => gate.call_mut(&hook, Vec::new()).map(drop),
                    _ => Ok(()),
                };
                drop(gate.into_inner());
                tracing::debug!(ok = result.is_ok(), "script host closed");
                Ok(result?)
            }
            State::Uninitialized => {
                self.state = State::Uninitialized;
                Err(HostError::NotInitialized)
            }
            State::Closed => Ok(()),
        }
    }
}
