//! The Trace Graph (§3.2): interned strings, issues, instances, frames and
//! their associations, for the duration of a single pipeline run.

use sapp_core::types::entities::{
    ClassTypeInterval, Issue, IssueInstance, IssueInstanceFixInfo, IssueInstanceSharedTextAssoc,
    IssueInstanceTraceFrameAssoc, MetaRunIssueInstanceIndex, Run, TraceFrame,
    TraceFrameAnnotation, TraceFrameAnnotationTraceFrameAssoc, TraceFrameLeafAssoc,
};
use sapp_core::types::interning::SharedTextInterner;

/// Everything the model generator produces for one run, ready to hand to
/// the bulk persistence engine in the §4.6.1 class order.
#[derive(Debug)]
pub struct TraceGraph {
    pub interner: SharedTextInterner,
    pub run: Run,
    pub issues: Vec<Issue>,
    pub issue_instances: Vec<IssueInstance>,
    pub issue_instance_fix_infos: Vec<IssueInstanceFixInfo>,
    pub trace_frames: Vec<TraceFrame>,
    pub issue_instance_shared_text_assocs: Vec<IssueInstanceSharedTextAssoc>,
    pub issue_instance_trace_frame_assocs: Vec<IssueInstanceTraceFrameAssoc>,
    pub trace_frame_leaf_assocs: Vec<TraceFrameLeafAssoc>,
    pub trace_frame_annotations: Vec<TraceFrameAnnotation>,
    /// Always empty unless a caller populates it explicitly; no operation in
    /// this crate writes to it (DESIGN.md).
    pub trace_frame_annotation_trace_frame_assocs: Vec<TraceFrameAnnotationTraceFrameAssoc>,
    /// Loaded from `class_type_intervals_filename` metadata when present,
    /// otherwise left empty.
    pub class_type_intervals: Vec<ClassTypeInterval>,
    /// Always empty unless a caller opts in explicitly (DESIGN.md).
    pub meta_run_issue_instance_index: Vec<MetaRunIssueInstanceIndex>,
}

impl TraceGraph {
    pub fn new(run: Run) -> Self {
        Self {
            interner: SharedTextInterner::new(),
            run,
            issues: Vec::new(),
            issue_instances: Vec::new(),
            issue_instance_fix_infos: Vec::new(),
            trace_frames: Vec::new(),
            issue_instance_shared_text_assocs: Vec::new(),
            issue_instance_trace_frame_assocs: Vec::new(),
            trace_frame_leaf_assocs: Vec::new(),
            trace_frame_annotations: Vec::new(),
            trace_frame_annotation_trace_frame_assocs: Vec::new(),
            class_type_intervals: Vec::new(),
            meta_run_issue_instance_index: Vec::new(),
        }
    }

    pub fn num_issues(&self) -> usize {
        self.issues.len()
    }

    pub fn num_trace_frames(&self) -> usize {
        self.trace_frames.len()
    }
}
