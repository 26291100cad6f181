//! Parse Record types — the tool-independent output of the parser
//! front-end (§4.3).

use sapp_core::types::entities::SourceLocation;
use smallvec::SmallVec;

/// A feature observed on a trace condition or frame. Mariana-Trench
/// "always" features are pre-rendered as `always-<name>` by the variant
/// parser before reaching this type (§6.2 `Features.from_json`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFeature(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceAnnotationKind {
    Feature,
}

/// A side-trace annotation attached at a specific source line.
#[derive(Debug, Clone)]
pub struct ParseTraceAnnotation {
    pub location: SourceLocation,
    pub kind: TraceAnnotationKind,
    pub message: String,
    pub leaf_kind: Option<String>,
}

/// One hop of a precondition or postcondition trace.
#[derive(Debug, Clone)]
pub struct ParseCondition {
    pub caller: String,
    pub caller_port: String,
    pub filename: String,
    pub callee: String,
    pub callee_port: String,
    pub callee_location: SourceLocation,
    pub titos: Vec<SourceLocation>,
    /// `(kind_name, distance)`.
    pub leaves: SmallVec<[(String, i64); 4]>,
    /// `(lower, upper, preserves_type_context)`.
    pub type_interval: Option<(i64, i64, bool)>,
    pub features: Vec<TraceFeature>,
    pub annotations: Vec<ParseTraceAnnotation>,
}

/// `(name, kind, distance)` — an initial source or final sink observed
/// directly on the issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeafSighting {
    pub name: String,
    pub kind: String,
    pub distance: i64,
}

/// A single issue emitted by the analyzer, normalized to a tool-independent
/// shape (§4.3).
#[derive(Debug, Clone)]
pub struct ParseIssue {
    pub code: i64,
    pub callable: String,
    pub handle: String,
    pub message: String,
    pub filename: String,
    pub callable_line: i64,
    pub line: i64,
    pub begin_column: i64,
    pub end_column: i64,
    pub preconditions: Vec<ParseCondition>,
    pub postconditions: Vec<ParseCondition>,
    pub initial_sources: rustc_hash::FxHashSet<LeafSighting>,
    pub final_sinks: rustc_hash::FxHashSet<LeafSighting>,
    pub features: Vec<String>,
    pub fix_info: Option<String>,
}

/// The full output of parsing one Analysis Output: an ordered sequence of
/// issues plus conditions bucketed by `(caller, caller_port)`, matching the
/// shape the model generator expects (§4.4).
#[derive(Debug, Clone, Default)]
pub struct ParseStream {
    pub issues: Vec<ParseIssue>,
    pub preconditions: rustc_hash::FxHashMap<(String, String), Vec<ParseCondition>>,
    pub postconditions: rustc_hash::FxHashMap<(String, String), Vec<ParseCondition>>,
}

impl ParseStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: ParseStream) {
        self.issues.extend(other.issues);
        for (key, mut conditions) in other.preconditions {
            self.preconditions.entry(key).or_default().append(&mut conditions);
        }
        for (key, mut conditions) in other.postconditions {
            self.postconditions.entry(key).or_default().append(&mut conditions);
        }
    }
}
