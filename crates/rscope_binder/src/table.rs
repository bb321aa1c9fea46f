//! Declaration tables: the ordered name-to-slot mapping owned by a scope.

use rscope_ast::NodeId;
use rscope_core::intern::InternedString;
use rustc_hash::FxHashMap;

/// Index of a binding in its scope's value array.
pub type Slot = u32;

/// One declared binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub name: InternedString,
    /// The function declaration whose closure initializes this slot on entry.
    pub hoisted: Option<NodeId>,
}

/// Name-to-slot table.
///
/// Slots are handed out in declaration order and never move. Removing a
/// binding leaves a hole whose index is reused by the next new declaration.
#[derive(Debug, Clone, Default)]
pub struct DeclarationTable {
    entries: Vec<Option<Declaration>>,
    by_name: FxHashMap<InternedString, Slot>,
    free: Vec<Slot>,
}

impl DeclarationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from an ordered name list. Repeated names share a slot.
    pub fn from_names(names: &[InternedString]) -> Self {
        let mut table = Self {
            entries: Vec::with_capacity(names.len()),
            by_name: FxHashMap::default(),
            free: Vec::new(),
        };
        table.by_name.reserve(names.len());
        for &name in names {
            table.declare(name);
        }
        table
    }

    /// Declare `name`, returning its slot. Declaring an existing name returns
    /// the slot it already has.
    pub fn declare(&mut self, name: InternedString) -> Slot {
        self.declare_hoisted(name, None)
    }

    /// Declare `name` with an optional hoisted function initializer. A later
    /// initializer for an existing name replaces the earlier one.
    pub fn declare_hoisted(&mut self, name: InternedString, hoisted: Option<NodeId>) -> Slot {
        if let Some(&slot) = self.by_name.get(&name) {
            if let (Some(node), Some(Some(entry))) = (hoisted, self.entries.get_mut(slot as usize)) {
                entry.hoisted = Some(node);
            }
            return slot;
        }

        let declaration = Some(Declaration { name, hoisted });
        let slot = match self.free.pop() {
            Some(slot) => {
                self.entries[slot as usize] = declaration;
                slot
            }
            None => {
                self.entries.push(declaration);
                (self.entries.len() - 1) as Slot
            }
        };
        self.by_name.insert(name, slot);
        slot
    }

    #[inline]
    pub fn has(&self, name: InternedString) -> bool {
        self.by_name.contains_key(&name)
    }

    #[inline]
    pub fn index_of(&self, name: InternedString) -> Option<Slot> {
        self.by_name.get(&name).copied()
    }

    /// Remove `name`, returning the slot it occupied. Immutability is enforced
    /// by the owning scope, not here.
    pub fn remove(&mut self, name: InternedString) -> Option<Slot> {
        let slot = self.by_name.remove(&name)?;
        self.entries[slot as usize] = None;
        self.free.push(slot);
        Some(slot)
    }

    /// Declared names ordered by slot.
    pub fn names(&self) -> Vec<InternedString> {
        self.entries.iter().flatten().map(|entry| entry.name).collect()
    }

    /// Live declarations with their slots, ordered by slot.
    pub fn declarations(&self) -> impl Iterator<Item = (Slot, &Declaration)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|entry| (slot as Slot, entry)))
    }

    pub fn get(&self, slot: Slot) -> Option<&Declaration> {
        self.entries.get(slot as usize)?.as_ref()
    }

    /// Number of declared names.
    #[inline]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// One past the highest slot ever handed out, holes included.
    #[inline]
    pub fn slot_count(&self) -> Slot {
        self.entries.len() as Slot
    }

    /// Stop reusing holes below `bound`.
    pub(crate) fn retire_free_below(&mut self, bound: Slot) {
        self.free.retain(|&slot| slot >= bound);
    }
}
