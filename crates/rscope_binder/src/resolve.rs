//! Compile-time chain resolution.

use crate::arena::{ScopeArena, ScopeId};
use crate::error::ScopeError;
use crate::table::Slot;
use rscope_core::intern::InternedString;
use std::fmt;

/// How one identifier occurrence is addressed at run time. Chosen once, at
/// compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarRef {
    /// `depth` parent links above the active scope, then `slot`.
    Static { depth: u32, slot: Slot },
    /// Looked up by name along the active chain.
    Dynamic(InternedString),
}

impl VarRef {
    #[inline]
    pub fn is_static(&self) -> bool {
        matches!(self, VarRef::Static { .. })
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarRef::Static { depth, slot } => write!(f, "static depth={} slot={}", depth, slot),
            VarRef::Dynamic(_) => write!(f, "dynamic"),
        }
    }
}

/// Resolve `name` starting at `from`.
///
/// A hit in a statically closed scope gives its `(depth, slot)`. Reaching a
/// global or eval scope first, or running off the root, gives a dynamic
/// reference: those scopes can gain and lose bindings while code runs. So
/// does missing in a scope whose code calls `eval` directly, since the eval
/// may declare the name there.
pub fn resolve<V>(
    arena: &ScopeArena<V>,
    from: ScopeId,
    name: InternedString,
) -> Result<VarRef, ScopeError> {
    let max_depth = arena.limits().max_depth;
    let mut current = from;
    let mut depth = 0u32;
    loop {
        let scope = arena.get(current)?;
        if !scope.kind().is_statically_closed() {
            return Ok(VarRef::Dynamic(name));
        }
        if let Some(slot) = scope.index_of(name) {
            return Ok(VarRef::Static { depth, slot });
        }
        if scope.has_direct_eval() {
            return Ok(VarRef::Dynamic(name));
        }
        match scope.parent() {
            Some(parent) => current = parent,
            None => return Ok(VarRef::Dynamic(name)),
        }
        depth += 1;
        if depth > max_depth {
            return Err(ScopeError::DepthExceeded(max_depth));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ScopeLimits;
    use crate::DescriptorArena;
    use rscope_core::intern::StringInterner;

    #[test]
    fn test_static_hit_reports_depth_and_slot() {
        let interner = StringInterner::new();
        let well_known = interner.well_known();
        let mut arena = DescriptorArena::new();
        let global = arena.new_global();
        let (a, b) = (interner.intern("a"), interner.intern("b"));
        let outer = arena.new_function(Some(global), None, &well_known, &[a]).unwrap();
        let inner = arena.new_function(Some(outer), None, &well_known, &[b]).unwrap();

        assert_eq!(resolve(&arena, inner, b), Ok(VarRef::Static { depth: 0, slot: 2 }));
        assert_eq!(resolve(&arena, inner, a), Ok(VarRef::Static { depth: 1, slot: 2 }));
        assert_eq!(
            resolve(&arena, inner, well_known.this),
            Ok(VarRef::Static { depth: 0, slot: 0 })
        );
    }

    #[test]
    fn test_global_is_dynamic() {
        let interner = StringInterner::new();
        let mut arena = DescriptorArena::new();
        let global = arena.new_global();
        let g = interner.intern("g");
        arena.declare(global, g).unwrap();
        let function = arena
            .new_function(Some(global), None, &interner.well_known(), &[])
            .unwrap();

        assert_eq!(resolve(&arena, global, g), Ok(VarRef::Dynamic(g)));
        assert_eq!(resolve(&arena, function, g), Ok(VarRef::Dynamic(g)));
    }

    #[test]
    fn test_eval_boundary_is_dynamic() {
        let interner = StringInterner::new();
        let well_known = interner.well_known();
        let mut arena = DescriptorArena::new();
        let eval = arena.new_eval(None).unwrap();
        let v = interner.intern("v");
        arena.declare(eval, v).unwrap();
        let function = arena.new_function(Some(eval), None, &well_known, &[]).unwrap();

        assert_eq!(resolve(&arena, function, v), Ok(VarRef::Dynamic(v)));
        assert_eq!(
            resolve(&arena, function, well_known.arguments),
            Ok(VarRef::Static { depth: 0, slot: 1 })
        );
    }

    #[test]
    fn test_catch_binding_and_forwarded_names() {
        let interner = StringInterner::new();
        let mut arena = DescriptorArena::new();
        let global = arena.new_global();
        let function = arena
            .new_function(Some(global), None, &interner.well_known(), &[])
            .unwrap();
        let (e, x) = (interner.intern("e"), interner.intern("x"));
        let catch = arena.new_catch(Some(function), e).unwrap();
        arena.declare(catch, x).unwrap();

        assert_eq!(resolve(&arena, catch, e), Ok(VarRef::Static { depth: 0, slot: 0 }));
        assert_eq!(resolve(&arena, catch, x), Ok(VarRef::Static { depth: 1, slot: 2 }));
    }

    #[test]
    fn test_direct_eval_scope_hides_outer_slots() {
        let interner = StringInterner::new();
        let well_known = interner.well_known();
        let mut arena = DescriptorArena::new();
        let global = arena.new_global();
        let (y, p, q) = (interner.intern("y"), interner.intern("p"), interner.intern("q"));
        let outer = arena.new_function(Some(global), None, &well_known, &[y]).unwrap();
        let f = arena.new_function(Some(outer), None, &well_known, &[p]).unwrap();
        let inner = arena.new_function(Some(f), None, &well_known, &[q]).unwrap();
        arena.mark_direct_eval(f).unwrap();

        // Locals of the eval-calling scope keep their slots.
        assert_eq!(resolve(&arena, f, p), Ok(VarRef::Static { depth: 0, slot: 2 }));
        assert_eq!(resolve(&arena, inner, p), Ok(VarRef::Static { depth: 1, slot: 2 }));
        assert_eq!(resolve(&arena, inner, q), Ok(VarRef::Static { depth: 0, slot: 2 }));
        // Anything found only above it could be shadowed at run time.
        assert_eq!(resolve(&arena, f, y), Ok(VarRef::Dynamic(y)));
        assert_eq!(resolve(&arena, inner, y), Ok(VarRef::Dynamic(y)));
        assert_eq!(
            resolve(&arena, outer, y),
            Ok(VarRef::Static { depth: 0, slot: 2 })
        );
    }

    #[test]
    fn test_running_off_the_root_is_dynamic() {
        let interner = StringInterner::new();
        let mut arena = DescriptorArena::new();
        let function = arena
            .new_function(None, None, &interner.well_known(), &[])
            .unwrap();
        let free = interner.intern("free");
        assert_eq!(resolve(&arena, function, free), Ok(VarRef::Dynamic(free)));
    }

    #[test]
    fn test_depth_limit() {
        let interner = StringInterner::new();
        let well_known = interner.well_known();
        let mut arena = DescriptorArena::with_limits(ScopeLimits {
            max_depth: 3,
            ..ScopeLimits::default()
        });
        let mut scope = arena.new_function(None, None, &well_known, &[]).unwrap();
        for _ in 0..5 {
            scope = arena.new_function(Some(scope), None, &well_known, &[]).unwrap();
        }
        assert_eq!(
            resolve(&arena, scope, interner.intern("missing")),
            Err(ScopeError::DepthExceeded(3))
        );
    }
}
