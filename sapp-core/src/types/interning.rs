//! Content-addressed interning of [`SharedText`] rows.

use crate::types::collections::FxHashMap;
use crate::types::entities::{SharedText, SharedTextKind};
use crate::types::placeholder::DbId;

/// Interns `(kind, contents)` pairs for the duration of a single pipeline
/// run. A given pair exists at most once (I2); repeated insertions silently
/// map to the same handle.
#[derive(Default)]
pub struct SharedTextInterner {
    by_key: FxHashMap<(SharedTextKind, String), DbId>,
    rows: Vec<SharedText>,
}

impl SharedTextInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stable handle for `(kind, contents)`, interning a new
    /// row if this is the first sighting.
    pub fn get_or_add(&mut self, kind: SharedTextKind, contents: &str) -> DbId {
        let key = (kind, contents.to_string());
        if let Some(id) = self.by_key.get(&key) {
            return id.clone();
        }
        let id = DbId::new();
        self.rows.push(SharedText {
            id: id.clone(),
            kind,
            contents: contents.to_string(),
        });
        self.by_key.insert(key, id.clone());
        id
    }

    /// Looks up the handle without interning, for callers that must not
    /// create a new row (e.g. a read-only query path).
    pub fn get(&self, kind: SharedTextKind, contents: &str) -> Option<&DbId> {
        self.by_key.get(&(kind, contents.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All interned rows, in insertion order, ready for bulk persistence.
    pub fn rows(&self) -> &[SharedText] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<SharedText> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_insertion_returns_same_handle() {
        let mut interner = SharedTextInterner::new();
        let a = interner.get_or_add(SharedTextKind::Callable, "foo.bar");
        let b = interner.get_or_add(SharedTextKind::Callable, "foo.bar");
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_kind_same_contents_are_distinct_rows() {
        let mut interner = SharedTextInterner::new();
        let a = interner.get_or_add(SharedTextKind::Callable, "x");
        let b = interner.get_or_add(SharedTextKind::Filename, "x");
        assert_ne!(a, b);
        assert_eq!(interner.len(), 2);
    }
}
