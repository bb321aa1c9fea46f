//! rscope_binder: Scope descriptors, declaration tables and name resolution.
//!
//! The binder walks a parsed program, builds one scope descriptor per
//! function, catch clause and program, and decides for every identifier
//! occurrence whether it is addressed statically by `(depth, slot)` or looked
//! up by name at run time. The same [`ScopeArena`] type holds the runtime
//! instances materialized from those descriptors.

mod arena;
mod binder;
mod error;
mod resolve;
mod scope;
mod table;

pub use arena::{ScopeArena, ScopeId, ScopeLimits};
pub use binder::{BindResult, Binder, ResolvedReference};
pub use error::ScopeError;
pub use resolve::{resolve, VarRef};
pub use scope::{Scope, ScopeKind};
pub use table::{Declaration, DeclarationTable, Slot};

/// Descriptor pool produced at compile time. Descriptors never hold values.
pub type DescriptorArena = ScopeArena<()>;
