//! rscope_ast: Abstract syntax tree for the script subset rscope compiles.
//!
//! Nodes are allocated in a `bumpalo` arena and borrow from it. Every node
//! the binder attaches scope information to (identifiers, functions, catch
//! clauses, programs) carries a [`NodeId`](types::NodeId).

pub mod node;
pub mod syntax_kind;
pub mod types;

pub use node::*;
pub use syntax_kind::SyntaxKind;
pub use types::{NodeId, NodeIdGenerator};
