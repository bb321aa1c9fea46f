//! Name interning.
//!
//! Every identifier that reaches a declaration table is interned, so that
//! table lookups and chain walks compare integer keys. The interner is shared
//! between the compiler and the runtime: code compiled for `eval` at run time
//! must produce the same keys as the code that materialized the scopes it runs
//! against.

use lasso::{Key, Spur, ThreadedRodeo};
use std::fmt;
use std::sync::Arc;

/// An interned name. A lightweight `u32` handle into a [`StringInterner`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InternedString(Spur);

impl InternedString {
    #[inline]
    pub fn from_spur(spur: Spur) -> Self {
        Self(spur)
    }

    #[inline]
    pub fn as_spur(self) -> Spur {
        self.0
    }

    /// Raw index of this name, useful for stable ordering in reports.
    #[inline]
    pub fn index(self) -> usize {
        self.0.into_usize()
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0.into_usize())
    }
}

/// Names the compiler and runtime refer to directly.
#[derive(Debug, Clone, Copy)]
pub struct WellKnownNames {
    /// The implicit receiver binding of every function scope.
    pub this: InternedString,
    /// The implicit arguments-collection binding of every function scope.
    pub arguments: InternedString,
    /// The callee name that marks a direct eval call.
    pub eval: InternedString,
    pub undefined: InternedString,
}

/// Thread-safe string interner.
///
/// Cloning is cheap and yields a handle to the same table.
#[derive(Clone)]
pub struct StringInterner {
    rodeo: Arc<ThreadedRodeo>,
    well_known: WellKnownNames,
}

impl StringInterner {
    pub fn new() -> Self {
        let rodeo = ThreadedRodeo::new();
        let well_known = WellKnownNames {
            this: InternedString::from_spur(rodeo.get_or_intern_static("this")),
            arguments: InternedString::from_spur(rodeo.get_or_intern_static("arguments")),
            eval: InternedString::from_spur(rodeo.get_or_intern_static("eval")),
            undefined: InternedString::from_spur(rodeo.get_or_intern_static("undefined")),
        };
        Self {
            rodeo: Arc::new(rodeo),
            well_known,
        }
    }

    /// Intern a string, returning the existing handle if it was seen before.
    #[inline]
    pub fn intern(&self, s: &str) -> InternedString {
        InternedString::from_spur(self.rodeo.get_or_intern(s))
    }

    /// Look up an already-interned string without interning it.
    #[inline]
    pub fn get(&self, s: &str) -> Option<InternedString> {
        self.rodeo.get(s).map(InternedString::from_spur)
    }

    #[inline]
    pub fn resolve(&self, key: InternedString) -> &str {
        self.rodeo.resolve(&key.as_spur())
    }

    #[inline]
    pub fn well_known(&self) -> WellKnownNames {
        self.well_known
    }

    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringInterner")
            .field("len", &self.len())
            .finish()
    }
}

/// Display wrapper for an [`InternedString`].
pub struct DisplayInterned<'a> {
    pub key: InternedString,
    pub interner: &'a StringInterner,
}

impl<'a> fmt::Display for DisplayInterned<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interner.resolve(self.key))
    }
}
