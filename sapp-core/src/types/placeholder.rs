//! Deferred primary-key handles: `DbId` denotes a row that may not have a
//! concrete integer key yet.
//!
//! Modeled as the tagged value the design notes call for —
//! `Pending(local_id) | Resolved(int)` — but the state cell is shared
//! (`Rc<RefCell<_>>`) rather than addressed through an external arena, since
//! references to the same placeholder are handed out freely across the
//! parser, graph builder and persistence engine before resolution happens.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::UnresolvedIdError;

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Unresolved,
    Int(i64),
    Placeholder(u64),
}

#[derive(Debug)]
struct Inner {
    local_id: u64,
    target: Target,
    frozen: bool,
}

/// A handle that denotes a future primary key.
///
/// Two states: *unresolved* (no integer yet) and *resolved to `v`* (an
/// integer). A resolved placeholder may itself point at another
/// placeholder — exactly one level of indirection is followed when reading.
#[derive(Clone)]
pub struct DbId {
    inner: Rc<RefCell<Inner>>,
    // Kept alongside `inner.local_id` so placeholders resolved to another
    // placeholder can still report *their own* identity without borrowing.
    local_id: u64,
    // The single allowed indirection hop (§4.1: "transitively point to
    // another placeholder, one level"). Separate cell so `resolve_to` never
    // needs two simultaneous mutable borrows of `inner`.
    linked: Rc<RefCell<Option<DbId>>>,
}

impl DbId {
    /// A fresh, unresolved placeholder with a process-unique local id.
    pub fn new() -> Self {
        let local_id = NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Rc::new(RefCell::new(Inner {
                local_id,
                target: Target::Unresolved,
                frozen: false,
            })),
            local_id,
            linked: Rc::new(RefCell::new(None)),
        }
    }

    /// A placeholder that is already resolved to `value`.
    pub fn from_int(value: i64) -> Self {
        let placeholder = Self::new();
        placeholder.resolve_to_int(value);
        placeholder
    }

    /// The process-unique local id, valid before and after resolution. This
    /// is what keys the merge-phase dedup maps (§4.6.2) when items may not
    /// yet have a concrete row id.
    pub fn local_id(&self) -> u64 {
        self.local_id
    }

    /// Resolve this placeholder to a concrete integer.
    pub fn resolve_to_int(&self, value: i64) {
        let mut inner = self.inner.borrow_mut();
        debug_assert!(!inner.frozen, "resolving a frozen placeholder");
        inner.target = Target::Int(value);
    }

    /// Resolve this placeholder to point at another placeholder (one level
    /// of indirection — used when a race is lost and the winner's id must
    /// be adopted, §4.6.2).
    pub fn resolve_to(&self, other: &DbId) {
        let mut inner = self.inner.borrow_mut();
        debug_assert!(!inner.frozen, "resolving a frozen placeholder");
        inner.target = Target::Placeholder(other.local_id);
        drop(inner);
        // `other` may itself already be resolved; if so, collapse the
        // indirection immediately so `resolved()` never has to chase a
        // second hop.
        if let Some(v) = other.resolved() {
            self.inner.borrow_mut().target = Target::Int(v);
        } else {
            *self.linked.borrow_mut() = Some(other.clone());
        }
    }

    /// `Some(v)` after following at most one indirection, else `None`.
    pub fn resolved(&self) -> Option<i64> {
        match self.inner.borrow().target {
            Target::Unresolved => None,
            Target::Int(v) => Some(v),
            Target::Placeholder(_) => self
                .linked
                .borrow()
                .as_ref()
                .and_then(|other| other.resolved()),
        }
    }

    /// Fails with `UnresolvedIdError` when the placeholder has no value yet.
    pub fn as_int(&self) -> Result<i64, UnresolvedIdError> {
        self.resolved().ok_or(UnresolvedIdError {
            local_id: self.local_id,
        })
    }

    /// Marks the value final. Used after conflict resolution so later code
    /// paths can assert stability; resolving a frozen placeholder again is
    /// a bug and panics in debug builds.
    pub fn freeze(&self) {
        self.inner.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.borrow().frozen
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved().is_some()
    }
}

impl Default for DbId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolved() {
            Some(v) => write!(f, "DbId(#{} = {v})", self.local_id),
            None => write!(f, "DbId(#{} = <unresolved>)", self.local_id),
        }
    }
}

impl PartialEq for DbId {
    fn eq(&self, other: &Self) -> bool {
        self.local_id == other.local_id
    }
}
impl Eq for DbId {}

impl Hash for DbId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.local_id.hash(state);
    }
}
