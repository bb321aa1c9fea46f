//! The scope pool.
//!
//! Scopes refer to their parents, and closures refer to the scope active when
//! they were created, so scopes form a shared graph with no single owner.
//! They live in a pool addressed by generational handles: a handle to a
//! reclaimed scope fails with [`ScopeError::StaleHandle`] instead of reaching
//! whatever reused its index.

use crate::error::ScopeError;
use crate::scope::{Scope, ScopeKind};
use crate::table::{DeclarationTable, Slot};
use rscope_ast::NodeId;
use rscope_core::intern::{InternedString, WellKnownNames};
use std::fmt;

/// Handle to a scope in a [`ScopeArena`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

impl ScopeId {
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Tunables for growth and chain walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLimits {
    /// Extra slots added when a materialized scope outgrows its value array.
    pub growth_slack: u32,
    /// Maximum number of parent links followed in one walk.
    pub max_depth: u32,
}

impl ScopeLimits {
    pub const DEFAULT_GROWTH_SLACK: u32 = 10;
    /// Maximum scope chain traversal depth to guard against cycles.
    pub const DEFAULT_MAX_DEPTH: u32 = 500;
}

impl Default for ScopeLimits {
    fn default() -> Self {
        Self {
            growth_slack: Self::DEFAULT_GROWTH_SLACK,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    generation: u32,
    scope: Option<Scope<V>>,
}

/// Pool of scopes addressed by [`ScopeId`].
#[derive(Debug, Clone)]
pub struct ScopeArena<V> {
    entries: Vec<Entry<V>>,
    free: Vec<u32>,
    live: usize,
    limits: ScopeLimits,
}

impl<V> Default for ScopeArena<V> {
    fn default() -> Self {
        Self::with_limits(ScopeLimits::default())
    }
}

impl<V> ScopeArena<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ScopeLimits) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
            limits,
        }
    }

    #[inline]
    pub fn limits(&self) -> ScopeLimits {
        self.limits
    }

    /// Number of live scopes.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: ScopeId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: ScopeId) -> Result<&Scope<V>, ScopeError> {
        self.entries
            .get(id.index())
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.scope.as_ref())
            .ok_or(ScopeError::StaleHandle(id))
    }

    pub fn get_mut(&mut self, id: ScopeId) -> Result<&mut Scope<V>, ScopeError> {
        self.entries
            .get_mut(id.index())
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.scope.as_mut())
            .ok_or(ScopeError::StaleHandle(id))
    }

    /// Handles of all live scopes, in index order.
    pub fn ids(&self) -> impl Iterator<Item = ScopeId> + '_ {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry.scope.as_ref().map(|_| ScopeId {
                index: index as u32,
                generation: entry.generation,
            })
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &Scope<V>)> + '_ {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry.scope.as_ref().map(|scope| {
                (
                    ScopeId {
                        index: index as u32,
                        generation: entry.generation,
                    },
                    scope,
                )
            })
        })
    }

    /// Reclaim a scope. Its handle and every copy of it become stale.
    pub fn remove(&mut self, id: ScopeId) -> Option<Scope<V>> {
        let entry = self.entries.get_mut(id.index())?;
        if entry.generation != id.generation {
            return None;
        }
        let scope = entry.scope.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(scope)
    }

    fn insert(&mut self, scope: Scope<V>) -> ScopeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.scope = Some(scope);
            return ScopeId {
                index,
                generation: entry.generation,
            };
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            scope: Some(scope),
        });
        ScopeId {
            index,
            generation: 0,
        }
    }

    fn check_parent(&self, kind: ScopeKind, parent: Option<ScopeId>) -> Result<(), ScopeError> {
        match parent {
            Some(parent) => self.get(parent).map(|_| ()),
            None if kind.requires_parent() => Err(ScopeError::MissingParent(kind)),
            None => Ok(()),
        }
    }

    pub fn parent(&self, id: ScopeId) -> Result<Option<ScopeId>, ScopeError> {
        Ok(self.get(id)?.parent)
    }

    /// The scope `depth` parent links above `id`.
    pub fn ancestor(&self, id: ScopeId, depth: u32) -> Result<ScopeId, ScopeError> {
        let mut current = id;
        for _ in 0..depth {
            current = self
                .get(current)?
                .parent
                .ok_or(ScopeError::MissingAncestor { scope: id, depth })?;
        }
        Ok(current)
    }

    /// Find the nearest scope on the chain from `from` that declares `name`.
    pub fn lookup(
        &self,
        from: ScopeId,
        name: InternedString,
    ) -> Result<Option<(ScopeId, Slot)>, ScopeError> {
        let mut current = Some(from);
        let mut depth = 0;
        while let Some(id) = current {
            if depth > self.limits.max_depth {
                return Err(ScopeError::DepthExceeded(self.limits.max_depth));
            }
            let scope = self.get(id)?;
            if let Some(slot) = scope.table.index_of(name) {
                return Ok(Some((id, slot)));
            }
            current = scope.parent;
            depth += 1;
        }
        Ok(None)
    }

    // ========================================================================
    // Construction modes
    // ========================================================================

    /// The root scope. Extensible, and never forwards a declaration.
    pub fn new_global(&mut self) -> ScopeId {
        self.insert(Scope::new(ScopeKind::Global, None))
    }

    /// A function scope. Declares, in order: the function's own name (when
    /// named), `this`, `arguments`, then each parameter.
    pub fn new_function(
        &mut self,
        parent: Option<ScopeId>,
        self_name: Option<InternedString>,
        well_known: &WellKnownNames,
        params: &[InternedString],
    ) -> Result<ScopeId, ScopeError> {
        self.check_parent(ScopeKind::Function, parent)?;
        let mut scope = Scope::new(ScopeKind::Function, parent);
        if let Some(name) = self_name {
            scope.table.declare(name);
        }
        scope.table.declare(well_known.this);
        scope.table.declare(well_known.arguments);
        for &param in params {
            scope.table.declare(param);
        }
        Ok(self.insert(scope))
    }

    /// A catch scope holding only `binding`. Later declarations made against
    /// it land in the parent.
    pub fn new_catch(
        &mut self,
        parent: Option<ScopeId>,
        binding: InternedString,
    ) -> Result<ScopeId, ScopeError> {
        self.check_parent(ScopeKind::Catch, parent)?;
        let mut scope = Scope::new(ScopeKind::Catch, parent);
        scope.table.declare(binding);
        Ok(self.insert(scope))
    }

    /// An empty, extensible scope for code evaluated at run time.
    pub fn new_eval(&mut self, parent: Option<ScopeId>) -> Result<ScopeId, ScopeError> {
        self.check_parent(ScopeKind::Eval, parent)?;
        Ok(self.insert(Scope::new(ScopeKind::Eval, parent)))
    }

    /// Record that code in `id` calls `eval` directly.
    pub fn mark_direct_eval(&mut self, id: ScopeId) -> Result<(), ScopeError> {
        self.get_mut(id)?.direct_eval = true;
        Ok(())
    }

    /// Declare `name` in `id`, forwarding through non-extensible scopes.
    /// Returns the scope that received the declaration and the slot.
    pub fn declare(
        &mut self,
        id: ScopeId,
        name: InternedString,
    ) -> Result<(ScopeId, Slot), ScopeError>
    where
        V: Clone + Default,
    {
        self.declare_hoisted(id, name, None)
    }

    pub fn declare_hoisted(
        &mut self,
        id: ScopeId,
        name: InternedString,
        hoisted: Option<NodeId>,
    ) -> Result<(ScopeId, Slot), ScopeError>
    where
        V: Clone + Default,
    {
        let target = self.declaration_target(id)?;
        if target != id {
            tracing::trace!(from = %id, to = %target, "forwarded declaration");
        }
        let slack = self.limits.growth_slack;
        let slot = self.get_mut(target)?.declare_local(name, hoisted, slack);
        Ok((target, slot))
    }

    /// The nearest extensible scope at or above `id`: where a declaration
    /// made against `id` lands.
    pub fn declaration_target(&self, id: ScopeId) -> Result<ScopeId, ScopeError> {
        let mut current = id;
        let mut depth = 0;
        loop {
            let scope = self.get(current)?;
            if scope.extensible {
                return Ok(current);
            }
            // Non-extensible scopes always have a parent; see `new_catch`.
            current = scope.parent.ok_or(ScopeError::MissingParent(scope.kind))?;
            depth += 1;
            if depth > self.limits.max_depth {
                return Err(ScopeError::DepthExceeded(self.limits.max_depth));
            }
        }
    }
}

// ============================================================================
// Materialized scopes
// ============================================================================

impl<V: Clone + Default> ScopeArena<V> {
    /// A runtime instance built from a fixed name list. The value array has
    /// exactly one slot per name and every slot is immutable.
    pub fn new_runtime_template(
        &mut self,
        parent: Option<ScopeId>,
        names: &[InternedString],
    ) -> Result<ScopeId, ScopeError> {
        self.check_parent(ScopeKind::RuntimeTemplate, parent)?;
        let table = DeclarationTable::from_names(names);
        let immutable_count = table.slot_count();
        let scope = Scope {
            kind: ScopeKind::RuntimeTemplate,
            parent,
            table,
            extensible: true,
            immutable_count,
            direct_eval: false,
            values: Some(vec![V::default(); names.len()]),
        };
        Ok(self.insert(scope))
    }

    /// A materialized catch instance over `parent`. Like a template, but it
    /// keeps the catch policy: declarations made against it at run time land
    /// in the parent.
    pub fn new_catch_instance(
        &mut self,
        parent: Option<ScopeId>,
        names: &[InternedString],
    ) -> Result<ScopeId, ScopeError> {
        self.check_parent(ScopeKind::Catch, parent)?;
        let id = self.new_runtime_template(parent, names)?;
        let scope = self.get_mut(id)?;
        scope.kind = ScopeKind::Catch;
        scope.extensible = false;
        Ok(id)
    }

    /// Force-create an extensible, materialized child for evaluated code.
    pub fn new_eval_instance(&mut self, parent: ScopeId) -> Result<ScopeId, ScopeError> {
        let id = self.new_eval(Some(parent))?;
        self.materialize(id)?;
        Ok(id)
    }

    /// A materialized root scope.
    pub fn new_global_instance(&mut self) -> ScopeId {
        let id = self.new_global();
        if let Ok(scope) = self.get_mut(id) {
            scope.materialize();
        }
        id
    }

    /// Give a descriptor a value array covering its declared slots.
    pub fn materialize(&mut self, id: ScopeId) -> Result<(), ScopeError> {
        self.get_mut(id)?.materialize();
        Ok(())
    }

    /// Make every binding currently declared in `id` undeletable.
    pub fn seal(&mut self, id: ScopeId) -> Result<(), ScopeError> {
        self.get_mut(id)?.seal();
        Ok(())
    }

    fn values(&self, id: ScopeId) -> Result<(&Scope<V>, &[V]), ScopeError> {
        let scope = self.get(id)?;
        let values = scope.values.as_deref().ok_or(ScopeError::Unmaterialized(id))?;
        Ok((scope, values))
    }

    fn values_mut(&mut self, id: ScopeId) -> Result<&mut Vec<V>, ScopeError> {
        self.get_mut(id)?
            .values
            .as_mut()
            .ok_or(ScopeError::Unmaterialized(id))
    }

    pub fn has_value(&self, id: ScopeId, name: InternedString) -> Result<bool, ScopeError> {
        let (scope, _) = self.values(id)?;
        Ok(scope.table.has(name))
    }

    /// The value bound to `name` in `id`, or `None` when `id` has no such
    /// binding. A declared but unassigned slot yields `V::default()`.
    pub fn get_value(&self, id: ScopeId, name: InternedString) -> Result<Option<V>, ScopeError> {
        let (scope, values) = self.values(id)?;
        match scope.table.index_of(name) {
            Some(slot) => values
                .get(slot as usize)
                .cloned()
                .map(Some)
                .ok_or(ScopeError::SlotOutOfRange { scope: id, slot }),
            None => Ok(None),
        }
    }

    /// Store `value` under `name`, declaring the name first if needed.
    pub fn set_value(&mut self, id: ScopeId, name: InternedString, value: V) -> Result<(), ScopeError> {
        self.values(id)?;
        let (target, slot) = match self.get(id)?.table.index_of(name) {
            Some(slot) => (id, slot),
            None => self.declare(id, name)?,
        };
        self.store(target, slot, value)
    }

    /// Delete `name` from `id`. Absent names delete vacuously (`true`);
    /// immutable slots refuse (`false`).
    pub fn delete(&mut self, id: ScopeId, name: InternedString) -> Result<bool, ScopeError> {
        let (scope, _) = self.values(id)?;
        let Some(slot) = scope.table.index_of(name) else {
            return Ok(true);
        };
        if slot < scope.immutable_count {
            return Ok(false);
        }
        let scope = self.get_mut(id)?;
        scope.table.remove(name);
        if let Some(value) = scope.values.as_mut().and_then(|values| values.get_mut(slot as usize)) {
            *value = V::default();
        }
        Ok(true)
    }

    pub fn load(&self, id: ScopeId, slot: Slot) -> Result<V, ScopeError> {
        let (_, values) = self.values(id)?;
        values
            .get(slot as usize)
            .cloned()
            .ok_or(ScopeError::SlotOutOfRange { scope: id, slot })
    }

    pub fn store(&mut self, id: ScopeId, slot: Slot, value: V) -> Result<(), ScopeError> {
        let values = self.values_mut(id)?;
        let target = values
            .get_mut(slot as usize)
            .ok_or(ScopeError::SlotOutOfRange { scope: id, slot })?;
        *target = value;
        Ok(())
    }
}
