//! rscope_runtime: Executes compiled code over materialized scopes.
//!
//! Each activation of a function, catch clause or eval program gets its own
//! scope instance in a [`ScopeHeap`]. Statically resolved references index
//! into those instances by `(depth, slot)`; dynamic references walk the
//! active chain by name.

mod error;
mod heap;
mod interpreter;
mod value;

pub use error::RuntimeError;
pub use heap::{ScopeHeap, Trace, Tracer, DEFAULT_GC_THRESHOLD};
pub use interpreter::{Interpreter, MAX_CALL_DEPTH};
pub use value::{Closure, ErrorKind, ErrorValue, Value};
