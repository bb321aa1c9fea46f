//! rscope_emitter: Lowers bound programs into executable code.
//!
//! The output is a tree IR in which every identifier carries the addressing
//! the binder chose for it, and every function, catch and program body starts
//! from a single [`ScopeEntry`] directive describing the scope to materialize.

mod emitter;
pub mod ir;

pub use emitter::{EmitError, Emitter};
pub use ir::{CatchCode, EntryMode, Expr, FunctionCode, HoistedFunction, Literal, ScopeEntry, Stmt};
