//! Core entity structs (§3.2). Every foreign reference is a [`DbId`] so
//! records can be constructed before their final row ids exist.

use crate::types::collections::FxHashSet;
use crate::types::placeholder::DbId;

/// The semantic tag distinguishing otherwise-identical interned strings
/// (§3.2, §4.2). Unique key is `(kind, contents)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedTextKind {
    Callable,
    Filename,
    Message,
    Feature,
    Source,
    SourceDetail,
    Sink,
    SinkDetail,
}

/// A `(kind, contents)` pair, interned at most once per run (I2).
#[derive(Debug, Clone)]
pub struct SharedText {
    pub id: DbId,
    pub kind: SharedTextKind,
    pub contents: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Incomplete,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Pysa,
    MarianaTrench,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeStatus {
    Unpurged,
    Purged,
}

/// One ingestion of an analysis output (§3.2). Exactly one per pipeline
/// invocation.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: DbId,
    pub job_id: Option<String>,
    pub date: i64,
    pub status: RunStatus,
    pub commit_hash: Option<String>,
    pub branch: Option<String>,
    pub repository: Option<String>,
    pub kind: RunKind,
    pub purge_status: PurgeStatus,
    pub finished_time: Option<i64>,
}

impl Run {
    pub fn new(kind: RunKind, date: i64) -> Self {
        Self {
            id: DbId::new(),
            job_id: None,
            date,
            status: RunStatus::Incomplete,
            commit_hash: None,
            branch: None,
            repository: None,
            kind,
            purge_status: PurgeStatus::Unpurged,
            finished_time: None,
        }
    }

    /// Transition to `Finished` with the given epoch-second timestamp
    /// (§4.6.3). No-op if already finished.
    pub fn finish(&mut self, finished_time: i64) {
        self.status = RunStatus::Finished;
        self.finished_time = Some(finished_time);
    }
}

/// Triage state of a stable [`Issue`], independent of the [`Run`] lifecycle.
/// Newly-ingested issues are always `Uncategorized`; the remaining variants
/// are assigned later by the (out-of-scope) UI triage surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStatus {
    Uncategorized,
    BadPractice,
    FalsePositive,
    ValidBug,
    DoNotCare,
}

/// An Issue, identified by a deterministic `handle` (I3, I7).
#[derive(Debug, Clone)]
pub struct Issue {
    pub id: DbId,
    pub handle: String,
    pub code: i64,
    pub callable: DbId,
    pub status: IssueStatus,
    pub first_seen: i64,
    pub first_seen_instance: Option<DbId>,
}

/// A single file location `(line, begin_col, end_col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: i64,
    pub begin_column: i64,
    pub end_column: i64,
}

/// A specific sighting of an [`Issue`] within a [`Run`] (§3.2).
#[derive(Debug, Clone)]
pub struct IssueInstance {
    pub id: DbId,
    pub run_id: DbId,
    pub issue_id: DbId,
    pub location: SourceLocation,
    pub filename_id: DbId,
    pub callable_id: DbId,
    pub message_id: DbId,
    pub fix_info_id: Option<DbId>,
    pub min_trace_length_to_sources: i64,
    pub min_trace_length_to_sinks: i64,
    pub callable_count: i64,
    pub is_new: bool,
}

/// Optional suggested-fix text, one-to-one with an [`IssueInstance`].
#[derive(Debug, Clone)]
pub struct IssueInstanceFixInfo {
    pub id: DbId,
    pub issue_instance_id: DbId,
    pub fix_info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    Precondition,
    Postcondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFrameReachability {
    Unreachable,
    Reachable,
}

/// A `(lower, upper]`-style interval plus whether the frame "ignores"
/// intervals entirely when filtering traversal (§4.4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInterval {
    pub lower: i64,
    pub upper: i64,
    pub preserves_type_context: bool,
}

/// `(caller_leaf, callee_leaf, transform)` — a trace entering this frame
/// with `caller_leaf` exits with `callee_leaf`, attributed to `transform`
/// (§4.4.3).
#[derive(Debug, Clone)]
pub struct LeafMapping {
    pub caller_leaf: DbId,
    pub callee_leaf: DbId,
    pub transform: DbId,
}

impl PartialEq for LeafMapping {
    fn eq(&self, other: &Self) -> bool {
        self.caller_leaf == other.caller_leaf
            && self.callee_leaf == other.callee_leaf
            && self.transform == other.transform
    }
}
impl Eq for LeafMapping {}

impl std::hash::Hash for LeafMapping {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.caller_leaf.hash(state);
        self.callee_leaf.hash(state);
        self.transform.hash(state);
    }
}

/// A directed edge `caller:caller_port -> callee:callee_port` (§3.2).
#[derive(Debug, Clone)]
pub struct TraceFrame {
    pub id: DbId,
    pub run_id: DbId,
    pub kind: TraceKind,
    pub caller_id: DbId,
    pub caller_port: String,
    pub callee_id: DbId,
    pub callee_port: String,
    pub filename_id: DbId,
    pub callee_location: SourceLocation,
    pub titos: Vec<SourceLocation>,
    pub type_interval: Option<TypeInterval>,
    pub reachability: TraceFrameReachability,
    pub leaf_mapping: FxHashSet<LeafMapping>,
}

impl TraceFrame {
    /// True when `callee_port` is a leaf port (I4): exactly `leaf`,
    /// `source`, `sink`, or starting with `anchor:`, `producer:`, `leaf:`,
    /// `source:`, `sink:`.
    pub fn has_leaf_callee_port(&self) -> bool {
        is_leaf_port(&self.callee_port)
    }
}

/// Shared leaf-port classification used by both [`TraceFrame`] and the
/// parser's port canonicalization (I4).
pub fn is_leaf_port(port: &str) -> bool {
    matches!(port, "leaf" | "source" | "sink")
        || port.starts_with("anchor:")
        || port.starts_with("producer:")
        || port.starts_with("leaf:")
        || port.starts_with("source:")
        || port.starts_with("sink:")
}

/// `(frame, leaf shared-text, trace_length)` (§3.2).
#[derive(Debug, Clone)]
pub struct TraceFrameLeafAssoc {
    pub trace_frame_id: DbId,
    pub leaf_id: DbId,
    pub trace_length: i64,
}

/// Many-to-many association between an issue instance and a shared-text
/// row (e.g. a feature or a source/sink detail).
#[derive(Debug, Clone)]
pub struct IssueInstanceSharedTextAssoc {
    pub issue_instance_id: DbId,
    pub shared_text_id: DbId,
}

/// Many-to-many association between an issue instance and a trace frame.
#[derive(Debug, Clone)]
pub struct IssueInstanceTraceFrameAssoc {
    pub issue_instance_id: DbId,
    pub trace_frame_id: DbId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFrameAnnotationKind {
    Feature,
}

/// A side-trace annotation attached to a frame at a specific location.
#[derive(Debug, Clone)]
pub struct TraceFrameAnnotation {
    pub id: DbId,
    pub trace_frame_id: DbId,
    pub location: SourceLocation,
    pub kind: TraceFrameAnnotationKind,
    pub message: String,
    pub leaf_id: Option<DbId>,
}

/// Links a [`TraceFrameAnnotation`] to a further [`TraceFrame`] beyond the
/// one it is directly attached to — the annotation's optional linked leaf,
/// when that leaf is itself reachable via another frame. Named explicitly in
/// the §4.6.1 insert order; population is a no-op by default (DESIGN.md).
#[derive(Debug, Clone)]
pub struct TraceFrameAnnotationTraceFrameAssoc {
    pub trace_frame_annotation_id: DbId,
    pub trace_frame_id: DbId,
}

/// Per-class type-interval table, populated from the
/// `class_type_intervals_filename` metadata key when present (§6.1).
#[derive(Debug, Clone)]
pub struct ClassTypeInterval {
    pub class_name: String,
    pub interval: TypeInterval,
}

/// Cross-meta-run dedup index slot (§4.6.1). Populated only when the
/// caller explicitly opts in; a no-op by default (§4.6.3, DESIGN.md).
#[derive(Debug, Clone)]
pub struct MetaRunIssueInstanceIndex {
    pub meta_run_id: DbId,
    pub issue_instance_id: DbId,
}
