//! Shared types, identifier placeholders, interning, hashing, and error
//! taxonomy used by every crate in the ingestion workspace.

pub mod errors;
pub mod hash;
pub mod types;

pub use types::collections::{FxHashMap, FxHashSet};
pub use types::entities::{
    Issue, IssueInstance, IssueInstanceFixInfo, IssueStatus, Run, RunKind, RunStatus, SharedText,
    SharedTextKind, SourceLocation, TraceFrame, TraceFrameAnnotation, TraceFrameLeafAssoc,
    TraceKind,
};
pub use types::interning::SharedTextInterner;
pub use types::placeholder::DbId;
