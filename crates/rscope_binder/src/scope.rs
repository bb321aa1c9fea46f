//! Scope records.
//!
//! All scope kinds share one record. What differs between kinds is captured
//! by the pure functions on [`ScopeKind`]; the constructors on
//! [`ScopeArena`](crate::ScopeArena) apply them.

use crate::table::{DeclarationTable, Slot};
use rscope_ast::NodeId;
use rscope_core::intern::InternedString;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// The root of a script. Resolved by name.
    Global,
    Function,
    /// Holds exactly the exception binding; forwards all other declarations.
    Catch,
    /// Top level of code evaluated at run time.
    Eval,
    /// A materialized activation built from a fixed name list.
    RuntimeTemplate,
}

impl ScopeKind {
    /// Whether declarations land in this scope rather than its parent.
    #[inline]
    pub fn is_extensible(self) -> bool {
        !matches!(self, ScopeKind::Catch)
    }

    #[inline]
    pub fn requires_parent(self) -> bool {
        matches!(self, ScopeKind::Catch | ScopeKind::RuntimeTemplate)
    }

    /// Whether a name found here can be addressed by slot at compile time.
    /// Global and eval scopes can gain or lose bindings while code runs.
    #[inline]
    pub fn is_statically_closed(self) -> bool {
        matches!(
            self,
            ScopeKind::Function | ScopeKind::Catch | ScopeKind::RuntimeTemplate
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Global => "global",
            ScopeKind::Function => "function",
            ScopeKind::Catch => "catch",
            ScopeKind::Eval => "eval",
            ScopeKind::RuntimeTemplate => "runtime-template",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scope: declaration table, parent link, and (once materialized) values.
///
/// `V` is the value type of materialized instances. Compile-time descriptors
/// use `()` and never allocate a value array.
#[derive(Debug, Clone)]
pub struct Scope<V> {
    pub(crate) kind: ScopeKind,
    pub(crate) parent: Option<crate::ScopeId>,
    pub(crate) table: DeclarationTable,
    pub(crate) extensible: bool,
    /// Slots below this bound cannot be deleted.
    pub(crate) immutable_count: Slot,
    /// Set on descriptors whose code calls `eval` directly.
    pub(crate) direct_eval: bool,
    pub(crate) values: Option<Vec<V>>,
}

impl<V> Scope<V> {
    pub(crate) fn new(kind: ScopeKind, parent: Option<crate::ScopeId>) -> Self {
        Self {
            kind,
            parent,
            table: DeclarationTable::new(),
            extensible: kind.is_extensible(),
            immutable_count: 0,
            direct_eval: false,
            values: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    #[inline]
    pub fn parent(&self) -> Option<crate::ScopeId> {
        self.parent
    }

    #[inline]
    pub fn table(&self) -> &DeclarationTable {
        &self.table
    }

    #[inline]
    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    #[inline]
    pub fn immutable_count(&self) -> Slot {
        self.immutable_count
    }

    /// Whether code running here may declare names the descriptor does not
    /// list. Names missing from such a scope cannot be addressed by slot.
    #[inline]
    pub fn has_direct_eval(&self) -> bool {
        self.direct_eval
    }

    #[inline]
    pub fn is_materialized(&self) -> bool {
        self.values.is_some()
    }

    pub fn values(&self) -> Option<&[V]> {
        self.values.as_deref()
    }

    #[inline]
    pub fn index_of(&self, name: InternedString) -> Option<Slot> {
        self.table.index_of(name)
    }

    #[inline]
    pub fn declared_count(&self) -> usize {
        self.table.len()
    }
}

impl<V: Clone + Default> Scope<V> {
    /// Declare directly in this scope, growing the value array when needed.
    pub(crate) fn declare_local(
        &mut self,
        name: InternedString,
        hoisted: Option<NodeId>,
        growth_slack: u32,
    ) -> Slot {
        let slot = self.table.declare_hoisted(name, hoisted);
        if let Some(values) = &mut self.values {
            let needed = slot as usize + 1;
            if needed > values.len() {
                let extra = (growth_slack as usize).max(values.len());
                values.resize(needed + extra, V::default());
            }
        }
        slot
    }

    /// Give this scope a value array covering every declared slot.
    pub(crate) fn materialize(&mut self) {
        if self.values.is_none() {
            self.values = Some(vec![V::default(); self.table.slot_count() as usize]);
        }
    }

    /// Make every currently declared slot immutable.
    pub(crate) fn seal(&mut self) {
        let bound = self.table.slot_count();
        self.immutable_count = self.immutable_count.max(bound);
        self.table.retire_free_below(self.immutable_count);
    }
}
