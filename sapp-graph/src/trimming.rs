//! `TrimTraceGraph` (§4.4.6, §4.7): drops frames unreachable from any issue
//! instance, starting from the synthetic root frames and following
//! `callee_id`/`callee_port` edges forward.

use sapp_core::types::collections::{FxHashMap, FxHashSet};
use sapp_core::types::entities::{TraceFrameReachability, TraceKind};

use crate::graph::TraceGraph;

/// Walk the graph forward from every frame an issue instance is directly
/// associated with, marking every frame reached along the way `Reachable`,
/// then drop everything left `Unreachable` along with its leaf/annotation
/// associations.
pub fn trim_trace_graph(mut graph: TraceGraph) -> TraceGraph {
    let mut by_id: FxHashMap<u64, usize> = FxHashMap::default();
    let mut by_caller: FxHashMap<(TraceKind, u64, String), Vec<usize>> = FxHashMap::default();
    for (idx, frame) in graph.trace_frames.iter().enumerate() {
        by_id.insert(frame.id.local_id(), idx);
        by_caller
            .entry((frame.kind, frame.caller_id.local_id(), frame.caller_port.clone()))
            .or_default()
            .push(idx);
    }

    let mut reachable: FxHashSet<u64> = FxHashSet::default();
    let mut stack: Vec<u64> = Vec::new();
    for assoc in &graph.issue_instance_trace_frame_assocs {
        let local_id = assoc.trace_frame_id.local_id();
        if reachable.insert(local_id) {
            stack.push(local_id);
        }
    }

    while let Some(frame_local_id) = stack.pop() {
        let idx = match by_id.get(&frame_local_id) {
            Some(idx) => *idx,
            None => continue,
        };
        let frame = &graph.trace_frames[idx];
        let key = (frame.kind, frame.callee_id.local_id(), frame.callee_port.clone());
        if let Some(next_indices) = by_caller.get(&key) {
            for &next_idx in next_indices {
                let next_local_id = graph.trace_frames[next_idx].id.local_id();
                if reachable.insert(next_local_id) {
                    stack.push(next_local_id);
                }
            }
        }
    }

    for frame in graph.trace_frames.iter_mut() {
        if reachable.contains(&frame.id.local_id()) {
            frame.reachability = TraceFrameReachability::Reachable;
        }
    }

    graph.trace_frames.retain(|frame| reachable.contains(&frame.id.local_id()));
    graph
        .trace_frame_leaf_assocs
        .retain(|assoc| reachable.contains(&assoc.trace_frame_id.local_id()));
    graph
        .trace_frame_annotations
        .retain(|assoc| reachable.contains(&assoc.trace_frame_id.local_id()));

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapp_core::types::entities::{Run, RunKind};
    use sapp_parser::types::ParseStream;

    use crate::builder::ModelGenerator;

    fn location(line: i64) -> sapp_core::types::entities::SourceLocation {
        sapp_core::types::entities::SourceLocation {
            line,
            begin_column: 1,
            end_column: 1,
        }
    }

    fn condition(caller: &str, caller_port: &str, callee: &str, callee_port: &str) -> sapp_parser::types::ParseCondition {
        sapp_parser::types::ParseCondition {
            caller: caller.to_string(),
            caller_port: caller_port.to_string(),
            filename: "a.py".to_string(),
            callee: callee.to_string(),
            callee_port: callee_port.to_string(),
            callee_location: location(10),
            titos: Vec::new(),
            leaves: smallvec::smallvec![("Sink:Leak".to_string(), 0)],
            type_interval: None,
            features: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// A hop reachable from the synthetic root frame survives trimming,
    /// reachability is stamped on it, and a disconnected condition left in
    /// the bucket never becomes a frame in the first place (the generator
    /// only materializes frames while following a traversal), so the graph
    /// it hands to trimming is already frame-minimal.
    #[test]
    fn reachable_frame_survives_and_is_stamped() {
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        let mut issue = sapp_parser::types::ParseIssue {
            code: 6001,
            callable: "a.foo".to_string(),
            handle: "a.foo:6001:0:0:0".to_string(),
            message: "m".to_string(),
            filename: "a.py".to_string(),
            callable_line: 1,
            line: 5,
            begin_column: 1,
            end_column: 10,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            initial_sources: FxHashSet::default(),
            final_sinks: FxHashSet::default(),
            features: Vec::new(),
            fix_info: None,
        };
        issue.preconditions.push(condition("a.foo", "root", "a.bar", "formal(0)"));

        let mut stream = ParseStream::new();
        stream.issues.push(issue);
        // an orphaned bucket entry the traversal never reaches
        stream
            .preconditions
            .insert(("a.unrelated".to_string(), "formal(0)".to_string()), vec![condition("a.unrelated", "formal(0)", "a.sink", "sink")]);

        let (graph, _summary) = ModelGenerator::generate(run, stream);
        assert_eq!(graph.num_trace_frames(), 1);

        let trimmed = trim_trace_graph(graph);
        assert_eq!(trimmed.num_trace_frames(), 1);
        assert!(trimmed.trace_frames[0].reachability == TraceFrameReachability::Reachable);
    }

    /// A frame with no path back to any `IssueInstanceTraceFrameAssoc` root
    /// is dropped, along with its leaf and annotation associations.
    #[test]
    fn frame_disconnected_from_every_root_is_dropped() {
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        let mut graph = TraceGraph::new(run);

        let root_caller = graph.interner.get_or_add(sapp_core::types::entities::SharedTextKind::Callable, "a.foo");
        let shared_callee = graph.interner.get_or_add(sapp_core::types::entities::SharedTextKind::Callable, "a.bar");
        let orphan_caller = graph.interner.get_or_add(sapp_core::types::entities::SharedTextKind::Callable, "a.orphan");
        let orphan_callee = graph.interner.get_or_add(sapp_core::types::entities::SharedTextKind::Callable, "a.void");
        let filename = graph.interner.get_or_add(sapp_core::types::entities::SharedTextKind::Filename, "a.py");

        let root_frame = sapp_core::types::entities::TraceFrame {
            id: sapp_core::types::placeholder::DbId::new(),
            run_id: graph.run.id.clone(),
            kind: TraceKind::Precondition,
            caller_id: root_caller,
            caller_port: "root".to_string(),
            callee_id: shared_callee,
            callee_port: "sink".to_string(),
            filename_id: filename.clone(),
            callee_location: location(1),
            titos: Vec::new(),
            type_interval: None,
            reachability: TraceFrameReachability::Unreachable,
            leaf_mapping: FxHashSet::default(),
        };
        let root_frame_id = root_frame.id.clone();

        let orphan_frame = sapp_core::types::entities::TraceFrame {
            id: sapp_core::types::placeholder::DbId::new(),
            run_id: graph.run.id.clone(),
            kind: TraceKind::Precondition,
            caller_id: orphan_caller,
            caller_port: "root".to_string(),
            callee_id: orphan_callee,
            callee_port: "sink".to_string(),
            filename_id: filename,
            callee_location: location(1),
            titos: Vec::new(),
            type_interval: None,
            reachability: TraceFrameReachability::Unreachable,
            leaf_mapping: FxHashSet::default(),
        };
        let orphan_frame_id = orphan_frame.id.clone();

        graph.trace_frames.push(root_frame);
        graph.trace_frames.push(orphan_frame);
        graph.trace_frame_leaf_assocs.push(sapp_core::types::entities::TraceFrameLeafAssoc {
            trace_frame_id: orphan_frame_id,
            leaf_id: sapp_core::types::placeholder::DbId::from_int(1),
            trace_length: 0,
        });
        graph
            .issue_instance_trace_frame_assocs
            .push(sapp_core::types::entities::IssueInstanceTraceFrameAssoc {
                issue_instance_id: sapp_core::types::placeholder::DbId::from_int(2),
                trace_frame_id: root_frame_id,
            });

        let trimmed = trim_trace_graph(graph);
        assert_eq!(trimmed.num_trace_frames(), 1);
        assert_eq!(trimmed.trace_frames[0].caller_port, "root");
        assert!(trimmed.trace_frame_leaf_assocs.is_empty());
    }
}
