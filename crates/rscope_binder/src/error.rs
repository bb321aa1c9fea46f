//! Internal-state errors of the scope subsystem.
//!
//! None of these are reachable from correctly generated code. They abort
//! compilation or execution instead of producing a wrong binding.

use crate::arena::ScopeId;
use crate::scope::ScopeKind;
use crate::table::Slot;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("value access on scope {0} which has no backing value array")]
    Unmaterialized(ScopeId),

    #[error("{0} scope constructed without a parent scope")]
    MissingParent(ScopeKind),

    #[error("scope handle {0} is stale or was never allocated")]
    StaleHandle(ScopeId),

    #[error("slot {slot} is outside the value array of scope {scope}")]
    SlotOutOfRange { scope: ScopeId, slot: Slot },

    #[error("scope {scope} has no ancestor at depth {depth}")]
    MissingAncestor { scope: ScopeId, depth: u32 },

    #[error("scope chain exceeds the maximum depth of {0}")]
    DepthExceeded(u32),
}
