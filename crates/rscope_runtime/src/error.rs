use crate::value::Value;
use rscope_binder::ScopeError;
use rscope_compiler::CompileError;

/// Failures that end a script run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A thrown value nothing caught.
    #[error("uncaught {0}")]
    Uncaught(Value),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("internal scope error")]
    Scope(#[from] ScopeError),
}

impl RuntimeError {
    /// The thrown value, for uncaught exceptions.
    pub fn thrown(&self) -> Option<&Value> {
        match self {
            RuntimeError::Uncaught(value) => Some(value),
            _ => None,
        }
    }
}
