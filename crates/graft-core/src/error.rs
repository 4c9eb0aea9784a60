//! Error types for script hosting.

use std::time::Duration;

/// Errors raised by a script engine while compiling, loading or calling a unit.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script compilation failed: {0}")]
    Compilation(String),

    #[error("script instantiation failed: {0}")]
    Instantiation(String),

    #[error("script does not define `{name}` taking {arity} argument(s)")]
    MissingEntryPoint { name: &'static str, arity: usize },

    #[error("`{entry}` failed: {message}")]
    Invocation {
        entry: &'static str,
        message: String,
    },

    #[error("`{entry}` exceeded its time limit of {limit:?}")]
    Timeout {
        entry: &'static str,
        limit: Duration,
    },
}

impl ScriptError {
    /// Build an invocation error for the named entry point.
    pub fn invocation(entry: &'static str, message: impl Into<String>) -> Self {
        ScriptError::Invocation {
            entry,
            message: message.into(),
        }
    }

    /// Whether this error prevents the lifecycle from starting at all.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            ScriptError::Compilation(_)
                | ScriptError::Instantiation(_)
                | ScriptError::MissingEntryPoint { .. }
        )
    }
}

/// Errors surfaced by a hosting transformer to its caller.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("transformer is not initialized")]
    NotInitialized,

    #[error("transformer is already initialized")]
    AlreadyInitialized,

    #[error("transformer has been closed")]
    Closed,

    #[error("output row has {actual} field(s), expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

impl HostError {
    /// Whether this error comes from misuse of the lifecycle rather than the script.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            HostError::NotInitialized | HostError::AlreadyInitialized | HostError::Closed
        )
    }
}
