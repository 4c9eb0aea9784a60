//! Execution and shape policies.

use crate::collector::OutputRow;
use crate::error::{HostError, ScriptError};
use crate::script::{Arg, EntryPoint, ScriptInstance};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// How concurrent `transform` callers enter the script instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPolicy {
    /// Callers enter simultaneously; the script must be reentrant.
    #[default]
    Reentrant,
    /// Callers are serialized through one lock per instance.
    Exclusive,
}

impl ExecutionPolicy {
    /// Policy for the `concurrent` configuration flag.
    pub fn from_concurrent(concurrent: bool) -> Self {
        if concurrent {
            ExecutionPolicy::Reentrant
        } else {
            ExecutionPolicy::Exclusive
        }
    }
}

/// A script instance wrapped in its execution policy.
///
/// The exclusive gate holds its lock for exactly one call. The guard is
/// dropped on every exit path, including script errors.
#[derive(Debug)]
pub enum ExecutionGate<I> {
    Reentrant(I),
    Exclusive(Mutex<I>),
}

impl<I: ScriptInstance> ExecutionGate<I> {
    pub fn new(instance: I, policy: ExecutionPolicy) -> Self {
        match policy {
            ExecutionPolicy::Reentrant => ExecutionGate::Reentrant(instance),
            ExecutionPolicy::Exclusive => ExecutionGate::Exclusive(Mutex::new(instance)),
        }
    }

    pub fn policy(&self) -> ExecutionPolicy {
        match self {
            ExecutionGate::Reentrant(_) => ExecutionPolicy::Reentrant,
            ExecutionGate::Exclusive(_) => ExecutionPolicy::Exclusive,
        }
    }

    /// Call an entry point under this gate's policy.
    pub fn call(&self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError> {
        match self {
            ExecutionGate::Reentrant(instance) => instance.invoke(entry, args),
            ExecutionGate::Exclusive(lock) => {
                // A poisoned lock only means an earlier call panicked; the
                // instance itself is still usable.
                let mut instance = lock.lock().unwrap_or_else(PoisonError::into_inner);
                instance.invoke_mut(entry, args)
            }
        }
    }

    /// Call an entry point with exclusive access, bypassing the lock.
    pub fn call_mut(&mut self, entry: &EntryPoint, args: Vec<Arg>) -> Result<Value, ScriptError> {
        self.instance_mut().invoke_mut(entry, args)
    }

    fn instance_mut(&mut self) -> &mut I {
        match self {
            ExecutionGate::Reentrant(instance) => instance,
            ExecutionGate::Exclusive(lock) => lock.get_mut().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Release the gate and return the instance.
    pub fn into_inner(self) -> I {
        match self {
            ExecutionGate::Reentrant(instance) => instance,
            ExecutionGate::Exclusive(lock) => lock.into_inner().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// What to do when an emitted row's arity differs from the declared field count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapePolicy {
    /// Forward rows as emitted; mismatches surface downstream.
    #[default]
    Unchecked,
    /// Fail the record with a shape mismatch.
    Reject,
    /// Pad with nulls or truncate to the declared count.
    Fit,
}

impl ShapePolicy {
    /// Apply this policy to one row.
    pub fn apply(self, mut row: OutputRow, expected: usize) -> Result<OutputRow, HostError> {
        if row.len() == expected {
            return Ok(row);
        }

        match self {
            ShapePolicy::Unchecked => Ok(row),
            ShapePolicy::Reject => Err(HostError::ShapeMismatch {
                expected,
                actual: row.len(),
            }),
            ShapePolicy::Fit => {
                tracing::warn!(expected, actual = row.len(), "fitting output row to declared shape");
                row.resize(expected, None);
                Ok(row)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{CompiledUnit, ScriptEngine};
    use crate::testing::MockEngine;
    use std::time::Duration;

    fn row(fields: &[&str]) -> OutputRow {
        fields.iter().map(|f| Some(f.to_string())).collect()
    }

    #[test]
    fn test_policy_from_flag() {
        assert_eq!(ExecutionPolicy::from_concurrent(true), ExecutionPolicy::Reentrant);
        assert_eq!(ExecutionPolicy::from_concurrent(false), ExecutionPolicy::Exclusive);
    }

    #[test]
    fn test_exclusive_never_overlaps() {
        let engine = MockEngine::new().with_delay(Duration::from_millis(5));
        let stats = engine.stats();
        let instance = engine.compile("ok").unwrap().instantiate().unwrap();
        let gate = ExecutionGate::new(instance, ExecutionPolicy::Exclusive);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..4 {
                        gate.call(&EntryPoint::TRANSFORM, Vec::new()).unwrap();
                    }
                });
            }
        });

        assert_eq!(stats.max_active(), 1);
        assert_eq!(stats.calls_to("transform"), 32);
    }

    #[test]
    fn test_reentrant_overlaps() {
        let engine = MockEngine::new().with_delay(Duration::from_millis(50));
        let stats = engine.stats();
        let instance = engine.compile("ok").unwrap().instantiate().unwrap();
        let gate = ExecutionGate::new(instance, ExecutionPolicy::Reentrant);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| gate.call(&EntryPoint::TRANSFORM, Vec::new()).unwrap());
            }
        });

        assert!(stats.max_active() > 1);
    }

    #[test]
    fn test_exclusive_lock_released_on_error() {
        let engine = MockEngine::new()
            .on_call(|_, _| Err(ScriptError::invocation("transform", "boom")));
        let instance = engine.compile("ok").unwrap().instantiate().unwrap();
        let gate = ExecutionGate::new(instance, ExecutionPolicy::Exclusive);

        assert!(gate.call(&EntryPoint::TRANSFORM, Vec::new()).is_err());
        // Would deadlock if the first call kept the lock.
        assert!(gate.call(&EntryPoint::TRANSFORM, Vec::new()).is_err());
    }

    #[test]
    fn test_exclusive_state_persists() {
        let engine = MockEngine::new();
        let instance = engine.compile("ok").unwrap().instantiate().unwrap();
        let gate = ExecutionGate::new(instance, ExecutionPolicy::Exclusive);

        gate.call(&EntryPoint::TRANSFORM, Vec::new()).unwrap();
        gate.call(&EntryPoint::TRANSFORM, Vec::new()).unwrap();

        assert_eq!(gate.into_inner().mutations(), 2);
    }

    #[test]
    fn test_reentrant_state_not_kept() {
        let engine = MockEngine::new();
        let instance = engine.compile("ok").unwrap().instantiate().unwrap();
        let mut gate = ExecutionGate::new(instance, ExecutionPolicy::Reentrant);

        gate.call(&EntryPoint::TRANSFORM, Vec::new()).unwrap();
        gate.call_mut(&EntryPoint::INITIALIZE, Vec::new()).unwrap();

        assert_eq!(gate.policy(), ExecutionPolicy::Reentrant);
        assert_eq!(gate.into_inner().mutations(), 1);
    }

    #[test]
    fn test_shape_policies() {
        assert_eq!(ShapePolicy::Unchecked.apply(row(&["a"]), 2).unwrap(), row(&["a"]));
        assert_eq!(
            ShapePolicy::Fit.apply(row(&["a"]), 2).unwrap(),
            vec![Some("a".to_string()), None]
        );
        assert_eq!(ShapePolicy::Fit.apply(row(&["a", "b", "c"]), 2).unwrap(), row(&["a", "b"]));
        assert!(matches!(
            ShapePolicy::Reject.apply(row(&["a"]), 2),
            Err(HostError::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(ShapePolicy::Reject.apply(row(&["a", "b"]), 2).unwrap(), row(&["a", "b"]));
    }
}
