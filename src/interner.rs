//! Identifier interning for problem models.
//!
//! Every identifier discovered in a problem (word tokens, equation symbols,
//! known-value names) is interned once into a [`SymbolTable`], which hands out
//! dense [`VarId`] handles. Expressions hold handles, not strings, so
//! substitution and solving never compare names.
//!
//! Each `Problem` owns its table. Handles from one table mean nothing in another.

use std::collections::HashMap;
use std::fmt;

/// Handle to an interned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    /// Position of this handle in its table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of interned identifiers (case-sensitive).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    names: Vec<String>,
    ids: HashMap<String, VarId>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning its handle.
    ///
    /// If the name has been interned before, the existing handle is returned.
    pub fn intern(&mut self, name: impl AsRef<str>) -> VarId {
        let name = name.as_ref();
        if let Some(&id) = self.ids.get(name) {
            return id;
        }

        // handles are dense: the next handle is the current length
        let id = VarId(u32::try_from(self.names.len()).unwrap_or(u32::MAX));
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Look up the handle for `name` without interning it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.ids.get(name).copied()
    }

    /// The identifier behind `id`, or `"?"` for a handle from another table.
    #[must_use]
    pub fn name(&self, id: VarId) -> &str {
        self.names.get(id.index()).map_or("?", String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over `(handle, name)` pairs in interning order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (VarId(i as u32), name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_same_string_returns_same_id() {
        let mut table = SymbolTable::new();

        let a1 = table.intern("hello");
        let a2 = table.intern("hello");

        assert_eq!(a1, a2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_intern_different_strings() {
        let mut table = SymbolTable::new();

        let a = table.intern("hello");
        let b = table.intern("world");

        assert_ne!(a, b);
        assert_eq!(table.name(a), "hello");
        assert_eq!(table.name(b), "world");
    }

    #[test]
    fn test_intern_is_case_sensitive() {
        let mut table = SymbolTable::new();

        let lower = table.intern("x");
        let upper = table.intern("X");

        assert_ne!(lower, upper);
    }

    #[test]
    fn test_intern_with_string() {
        let mut table = SymbolTable::new();

        let owned = String::from("test");
        let id1 = table.intern(&owned);
        let id2 = table.intern("test");

        assert_eq!(id1, id2);
    }

    #[test]
    fn test_get_does_not_intern() {
        let table = SymbolTable::new();
        assert_eq!(table.get("x"), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_iter_preserves_interning_order() {
        let mut table = SymbolTable::new();
        table.intern("b");
        table.intern("a");
        table.intern("b");

        let names: Vec<&str> = table.iter().map(|(_, name)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_foreign_handle_renders_placeholder() {
        let mut big = SymbolTable::new();
        big.intern("a");
        let foreign = big.intern("b");

        let mut small = SymbolTable::new();
        small.intern("only");
        assert_eq!(small.name(foreign), "?");
    }
}
