//! The Model Generator (§4.4): turns a [`ParseStream`] into a [`TraceGraph`]
//! plus [`Summary`].
//!
//! Grounded on `examples/original_source/sapp/pipeline/model_generator.py`.
//! The transitive traversal in `generate_transitive_trace_frames` is a LIFO
//! stack, matching the original's `queue.pop()` despite the `queue` name.

use sapp_core::types::collections::{FxHashMap, FxHashSet};
use sapp_core::types::entities::{
    is_leaf_port, Issue, IssueInstance, IssueInstanceFixInfo, IssueInstanceSharedTextAssoc,
    IssueInstanceTraceFrameAssoc, IssueStatus, LeafMapping, Run, SharedTextKind, SourceLocation,
    TraceFrame, TraceFrameAnnotation, TraceFrameAnnotationKind, TraceFrameLeafAssoc,
    TraceFrameReachability, TraceKind, TypeInterval,
};
use sapp_core::types::placeholder::DbId;
use sapp_parser::types::{ParseCondition, ParseIssue, ParseStream, ParseTraceAnnotation, TraceFeature};

use crate::graph::TraceGraph;
use crate::leaf_mapping;
use crate::summary::Summary;

/// TITOs beyond this count are truncated and noted in `Summary.big_tito`
/// rather than carried in full (mirrors the original's `TITO_LIMIT`).
const TITO_LIMIT: usize = 200;

/// Builds a [`TraceGraph`] from a [`ParseStream`], one call per run.
pub struct ModelGenerator {
    graph: TraceGraph,
    preconditions: FxHashMap<(String, String), Vec<ParseCondition>>,
    postconditions: FxHashMap<(String, String), Vec<ParseCondition>>,
    /// `(kind, caller local_id, caller_port) -> indices into graph.trace_frames`,
    /// populated for every frame ever added, synthetic or hop (so later
    /// lookups for the same key share frames already generated).
    frame_index: FxHashMap<(TraceKind, u64, String), Vec<usize>>,
    /// Frame local_id -> leaf ids already propagated past it, so repeated
    /// traversal of a shared frame only processes newly-arrived leaves.
    visited_frames: FxHashMap<u64, FxHashSet<DbId>>,
    /// Callable `DbId.local_id() -> name`, so a caller/callee id can be
    /// turned back into the text key the precondition/postcondition
    /// buckets are indexed by.
    callable_text: FxHashMap<u64, String>,
    /// `(frame local_id, line)` pairs already given a `TraceFrameAnnotation`.
    seen_annotation_lines: FxHashSet<(u64, i64)>,
    missing_traces: FxHashMap<TraceKind, FxHashSet<(String, String)>>,
    big_tito: FxHashSet<(String, String, usize)>,
}

impl ModelGenerator {
    pub fn new(run: Run) -> Self {
        Self {
            graph: TraceGraph::new(run),
            preconditions: FxHashMap::default(),
            postconditions: FxHashMap::default(),
            frame_index: FxHashMap::default(),
            visited_frames: FxHashMap::default(),
            callable_text: FxHashMap::default(),
            seen_annotation_lines: FxHashSet::default(),
            missing_traces: FxHashMap::default(),
            big_tito: FxHashSet::default(),
        }
    }

    /// Entry point (§4.4.1): consumes a [`ParseStream`], producing a
    /// populated [`TraceGraph`] and its [`Summary`].
    pub fn generate(run: Run, stream: ParseStream) -> (TraceGraph, Summary) {
        let callable_counts = compute_callable_counts(&stream.issues);
        let mut generator = Self::new(run);
        generator.preconditions = stream.preconditions;
        generator.postconditions = stream.postconditions;

        for issue in stream.issues {
            generator.generate_issue(issue, &callable_counts);
        }

        generator.finish()
    }

    fn finish(self) -> (TraceGraph, Summary) {
        let mut summary = Summary::new(self.graph.run.clone());
        summary.missing_traces = self.missing_traces;
        summary.big_tito = self.big_tito;
        if !self.preconditions.is_empty() {
            summary
                .trace_entries
                .insert(TraceKind::Precondition, self.preconditions);
        }
        if !self.postconditions.is_empty() {
            summary
                .trace_entries
                .insert(TraceKind::Postcondition, self.postconditions);
        }
        (self.graph, summary)
    }

    fn intern(&mut self, kind: SharedTextKind, contents: &str) -> DbId {
        self.graph.interner.get_or_add(kind, contents)
    }

    fn intern_callable(&mut self, callable: &str) -> DbId {
        let id = self.intern(SharedTextKind::Callable, callable);
        self.callable_text.entry(id.local_id()).or_insert_with(|| callable.to_string());
        id
    }

    /// §4.4.1: one Issue plus its synthetic root frames.
    fn generate_issue(&mut self, entry: ParseIssue, callable_counts: &FxHashMap<String, i64>) {
        let mut instance_frame_ids: Vec<DbId> = Vec::new();
        let mut final_sink_leaf_ids: FxHashSet<DbId> = FxHashSet::default();
        let mut initial_source_leaf_ids: FxHashSet<DbId> = FxHashSet::default();

        for cond in &entry.preconditions {
            let (frame_id, caller_leaf_ids) = self.generate_issue_trace(TraceKind::Precondition, &entry, cond);
            final_sink_leaf_ids.extend(caller_leaf_ids);
            instance_frame_ids.push(frame_id);
        }
        for cond in &entry.postconditions {
            let (frame_id, caller_leaf_ids) = self.generate_issue_trace(TraceKind::Postcondition, &entry, cond);
            initial_source_leaf_ids.extend(caller_leaf_ids);
            instance_frame_ids.push(frame_id);
        }

        let callable_id = self.intern_callable(&entry.callable);
        let filename_id = self.intern(SharedTextKind::Filename, &entry.filename);
        let message_id = self.intern(SharedTextKind::Message, &entry.message);

        let issue_id = DbId::new();
        let instance_id = DbId::new();

        let issue = Issue {
            id: issue_id.clone(),
            handle: entry.handle.clone(),
            code: entry.code,
            callable: callable_id.clone(),
            status: IssueStatus::Uncategorized,
            first_seen: self.graph.run.date,
            first_seen_instance: Some(instance_id.clone()),
        };
        self.graph.issues.push(issue);

        let fix_info_id = entry.fix_info.as_ref().map(|text| {
            let id = DbId::new();
            self.graph.issue_instance_fix_infos.push(IssueInstanceFixInfo {
                id: id.clone(),
                issue_instance_id: instance_id.clone(),
                fix_info: text.clone(),
            });
            id
        });

        let instance = IssueInstance {
            id: instance_id.clone(),
            run_id: self.graph.run.id.clone(),
            issue_id,
            location: SourceLocation {
                line: entry.line,
                begin_column: entry.begin_column,
                end_column: entry.end_column,
            },
            filename_id,
            callable_id,
            message_id,
            fix_info_id,
            min_trace_length_to_sources: min_leaf_distance(&entry.postconditions),
            min_trace_length_to_sinks: min_leaf_distance(&entry.preconditions),
            callable_count: *callable_counts.get(&entry.callable).unwrap_or(&0),
            is_new: true,
        };

        for sighting in &entry.final_sinks {
            let id = self.intern(SharedTextKind::SinkDetail, &sighting.name);
            self.graph.issue_instance_shared_text_assocs.push(IssueInstanceSharedTextAssoc {
                issue_instance_id: instance_id.clone(),
                shared_text_id: id,
            });
        }
        for sighting in &entry.initial_sources {
            let id = self.intern(SharedTextKind::SourceDetail, &sighting.name);
            self.graph.issue_instance_shared_text_assocs.push(IssueInstanceSharedTextAssoc {
                issue_instance_id: instance_id.clone(),
                shared_text_id: id,
            });
        }
        for id in final_sink_leaf_ids.into_iter().chain(initial_source_leaf_ids) {
            self.graph.issue_instance_shared_text_assocs.push(IssueInstanceSharedTextAssoc {
                issue_instance_id: instance_id.clone(),
                shared_text_id: id,
            });
        }
        for feature in &entry.features {
            let id = self.intern(SharedTextKind::Feature, feature);
            self.graph.issue_instance_shared_text_assocs.push(IssueInstanceSharedTextAssoc {
                issue_instance_id: instance_id.clone(),
                shared_text_id: id,
            });
        }
        for frame_id in instance_frame_ids {
            self.graph.issue_instance_trace_frame_assocs.push(IssueInstanceTraceFrameAssoc {
                issue_instance_id: instance_id.clone(),
                trace_frame_id: frame_id,
            });
        }

        self.graph.issue_instances.push(instance);
    }

    /// §4.4.2: the synthetic root frame for one issue-attached condition,
    /// followed by the transitive traversal it seeds. Returns the frame id
    /// and the caller-side leaf ids observed at this hop (folded into the
    /// issue's final-sink / initial-source sets by the caller).
    fn generate_issue_trace(
        &mut self,
        kind: TraceKind,
        issue: &ParseIssue,
        cond: &ParseCondition,
    ) -> (DbId, FxHashSet<DbId>) {
        let titos = self.truncate_titos(&issue.filename, &issue.callable, cond.titos.clone());
        let idx = self.generate_raw_trace_frame(
            kind,
            &cond.filename,
            &issue.callable,
            &cond.caller_port,
            &cond.callee,
            &cond.callee_port,
            cond.callee_location,
            titos,
            &cond.leaves,
            cond.type_interval,
            &cond.annotations,
            &cond.features,
        );
        let frame_id = self.graph.trace_frames[idx].id.clone();
        let (caller_leaf_ids, callee_leaf_ids) = leaf_sets(&self.graph.trace_frames[idx].leaf_mapping);
        self.generate_transitive_trace_frames(kind, idx, callee_leaf_ids);
        (frame_id, caller_leaf_ids)
    }

    /// §4.4.2: one hop read from the precondition/postcondition buckets.
    fn generate_trace_frame(&mut self, kind: TraceKind, cond: &ParseCondition) -> usize {
        let titos = self.truncate_titos(&cond.filename, &cond.caller, cond.titos.clone());
        self.generate_raw_trace_frame(
            kind,
            &cond.filename,
            &cond.caller,
            &cond.caller_port,
            &cond.callee,
            &cond.callee_port,
            cond.callee_location,
            titos,
            &cond.leaves,
            cond.type_interval,
            &cond.annotations,
            &cond.features,
        )
    }

    /// §4.4.2 LIFO traversal: pops the most recently pushed `(frame, leaves)`
    /// pair, propagates `leaves` through frames found at the callee's
    /// `(kind, callee_id, callee_port)` key via `compute_next_leaf_kinds`,
    /// pruning leaves already delivered to a shared frame (`visited_frames`).
    fn generate_transitive_trace_frames(&mut self, kind: TraceKind, start_idx: usize, outgoing: FxHashSet<DbId>) {
        let mut stack: Vec<(usize, FxHashSet<DbId>)> = vec![(start_idx, outgoing)];

        while let Some((idx, mut outgoing)) = stack.pop() {
            if outgoing.is_empty() {
                continue;
            }

            let frame_local_id = self.graph.trace_frames[idx].id.local_id();
            match self.visited_frames.get_mut(&frame_local_id) {
                Some(seen) => {
                    outgoing.retain(|id| !seen.contains(id));
                    if outgoing.is_empty() {
                        continue;
                    }
                    seen.extend(outgoing.iter().cloned());
                }
                None => {
                    self.visited_frames.insert(frame_local_id, outgoing.clone());
                }
            }

            let callee_id = self.graph.trace_frames[idx].callee_id.clone();
            let callee_port = self.graph.trace_frames[idx].callee_port.clone();
            for next_idx in self.get_or_populate_trace_frames(kind, &callee_id, &callee_port) {
                let mapping = self.graph.trace_frames[next_idx].leaf_mapping.clone();
                let next_leaves = leaf_mapping::compute_next_leaf_kinds(&outgoing, &mapping);
                stack.push((next_idx, next_leaves));
            }
        }
    }

    /// §4.4.2: frames already indexed under `(kind, caller_id, caller_port)`
    /// are returned as-is; otherwise the matching conditions bucket is
    /// drained and turned into frames, or the key is recorded as missing
    /// unless it names a leaf port (I4 — leaves never resolve further).
    fn get_or_populate_trace_frames(&mut self, kind: TraceKind, caller_id: &DbId, caller_port: &str) -> Vec<usize> {
        let index_key = (kind, caller_id.local_id(), caller_port.to_string());
        if let Some(existing) = self.frame_index.get(&index_key) {
            return existing.clone();
        }

        let callable = self.callable_text.get(&caller_id.local_id()).cloned().unwrap_or_default();
        let text_key = (callable, caller_port.to_string());

        let bucket = match kind {
            TraceKind::Precondition => &mut self.preconditions,
            TraceKind::Postcondition => &mut self.postconditions,
        };
        let conditions = bucket.remove(&text_key).unwrap_or_default();

        if conditions.is_empty() {
            if !is_leaf_port(caller_port) {
                self.missing_traces.entry(kind).or_default().insert(text_key);
            }
            self.frame_index.insert(index_key, Vec::new());
            return Vec::new();
        }

        let indices: Vec<usize> = conditions.into_iter().map(|cond| self.generate_trace_frame(kind, &cond)).collect();
        self.frame_index.insert(index_key, indices.clone());
        indices
    }

    /// §4.4.2/§4.4.3: constructs one [`TraceFrame`] plus its leaf, feature
    /// and annotation associations. Registers the frame under its own
    /// `(kind, caller_id, caller_port)` key so later lookups for the same
    /// key — from a different issue, or a deeper hop — share it.
    #[allow(clippy::too_many_arguments)]
    fn generate_raw_trace_frame(
        &mut self,
        kind: TraceKind,
        filename: &str,
        caller: &str,
        caller_port: &str,
        callee: &str,
        callee_port: &str,
        callee_location: SourceLocation,
        titos: Vec<SourceLocation>,
        leaves: &[(String, i64)],
        type_interval: Option<(i64, i64, bool)>,
        annotations: &[ParseTraceAnnotation],
        features: &[TraceFeature],
    ) -> usize {
        let leaf_kind = if kind == TraceKind::Postcondition {
            SharedTextKind::Source
        } else {
            SharedTextKind::Sink
        };

        let caller_id = self.intern_callable(caller);
        let callee_id = self.intern_callable(callee);
        let filename_id = self.intern(SharedTextKind::Filename, filename);

        let mut leaf_mapping = FxHashSet::default();
        let mut leaf_text_ids = Vec::with_capacity(leaves.len());
        for (leaf, depth) in leaves {
            let leaf_id = self.intern(leaf_kind, leaf);
            let caller_leaf = self.intern(leaf_kind, leaf_mapping::caller_side_view(leaf));
            leaf_mapping.insert(LeafMapping {
                caller_leaf,
                callee_leaf: leaf_id.clone(),
                transform: leaf_id.clone(),
            });
            leaf_text_ids.push((leaf_id, *depth));
        }

        let type_interval = type_interval.map(|(lower, upper, preserves_type_context)| TypeInterval {
            lower,
            upper,
            preserves_type_context,
        });

        let frame_id = DbId::new();
        let frame = TraceFrame {
            id: frame_id.clone(),
            run_id: self.graph.run.id.clone(),
            kind,
            caller_id,
            caller_port: caller_port.to_string(),
            callee_id,
            callee_port: callee_port.to_string(),
            filename_id,
            callee_location,
            titos,
            type_interval,
            reachability: TraceFrameReachability::Unreachable,
            leaf_mapping,
        };
        let idx = self.add_trace_frame(frame);

        for (leaf_id, depth) in leaf_text_ids {
            self.graph.trace_frame_leaf_assocs.push(TraceFrameLeafAssoc {
                trace_frame_id: frame_id.clone(),
                leaf_id,
                trace_length: depth,
            });
        }
        for feature in features {
            let feature_id = self.intern(SharedTextKind::Feature, &feature.0);
            self.graph.trace_frame_leaf_assocs.push(TraceFrameLeafAssoc {
                trace_frame_id: frame_id.clone(),
                leaf_id: feature_id,
                trace_length: 0,
            });
        }

        self.generate_trace_annotations(idx, annotations, kind);
        idx
    }

    fn add_trace_frame(&mut self, frame: TraceFrame) -> usize {
        let key = (frame.kind, frame.caller_id.local_id(), frame.caller_port.clone());
        let idx = self.graph.trace_frames.len();
        self.graph.trace_frames.push(frame);
        self.frame_index.entry(key).or_default().push(idx);
        idx
    }

    /// §4.4.5: one `TraceFrameAnnotation` per distinct `(frame, line)`.
    fn generate_trace_annotations(&mut self, frame_idx: usize, annotations: &[ParseTraceAnnotation], kind: TraceKind) {
        if annotations.is_empty() {
            return;
        }
        let frame_id = self.graph.trace_frames[frame_idx].id.clone();
        let frame_local_id = frame_id.local_id();
        let leaf_kind = if kind == TraceKind::Postcondition {
            SharedTextKind::Source
        } else {
            SharedTextKind::Sink
        };

        for annotation in annotations {
            if !self.seen_annotation_lines.insert((frame_local_id, annotation.location.line)) {
                continue;
            }
            let leaf_id = annotation.leaf_kind.as_deref().map(|lk| self.intern(leaf_kind, lk));
            self.graph.trace_frame_annotations.push(TraceFrameAnnotation {
                id: DbId::new(),
                trace_frame_id: frame_id.clone(),
                location: annotation.location,
                kind: TraceFrameAnnotationKind::Feature,
                message: annotation.message.clone(),
                leaf_id,
            });
        }
    }

    fn truncate_titos(&mut self, filename: &str, callable: &str, titos: Vec<SourceLocation>) -> Vec<SourceLocation> {
        if titos.len() <= TITO_LIMIT {
            return titos;
        }
        let key = (filename.to_string(), callable.to_string(), titos.len());
        if self.big_tito.insert(key.clone()) {
            tracing::info!(filename = %key.0, callable = %key.1, tito_count = key.2, "truncating oversized TITO list");
        }
        let mut truncated = titos;
        truncated.truncate(TITO_LIMIT);
        truncated
    }
}

fn leaf_sets(mapping: &FxHashSet<LeafMapping>) -> (FxHashSet<DbId>, FxHashSet<DbId>) {
    let caller = mapping.iter().map(|lm| lm.caller_leaf.clone()).collect();
    let callee = mapping.iter().map(|lm| lm.callee_leaf.clone()).collect();
    (caller, callee)
}

fn min_leaf_distance(conditions: &[ParseCondition]) -> i64 {
    conditions.iter().flat_map(|c| c.leaves.iter().map(|(_, d)| *d)).min().unwrap_or(0)
}

fn compute_callable_counts(issues: &[ParseIssue]) -> FxHashMap<String, i64> {
    let mut counts = FxHashMap::default();
    for issue in issues {
        *counts.entry(issue.callable.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapp_core::types::entities::RunKind;
    use smallvec::smallvec;

    fn location(line: i64) -> SourceLocation {
        SourceLocation {
            line,
            begin_column: 1,
            end_column: 1,
        }
    }

    fn leaf_condition(caller: &str, caller_port: &str, callee: &str, callee_port: &str, leaf: &str, distance: i64) -> ParseCondition {
        ParseCondition {
            caller: caller.to_string(),
            caller_port: caller_port.to_string(),
            filename: "a.py".to_string(),
            callee: callee.to_string(),
            callee_port: callee_port.to_string(),
            callee_location: location(10),
            titos: Vec::new(),
            leaves: smallvec![(leaf.to_string(), distance)],
            type_interval: None,
            features: Vec::new(),
            annotations: Vec::new(),
        }
    }

    fn base_issue(callable: &str) -> ParseIssue {
        ParseIssue {
            code: 6001,
            callable: callable.to_string(),
            handle: format!("{callable}:6001:0:0:0"),
            message: "tainted data flows to sink".to_string(),
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
        }
    }

    /// S4: a two-hop precondition chain, where the second hop is only
    /// reachable through the buckets rather than attached to the issue.
    #[test]
    fn s4_pre_and_post_correlation_through_shared_frames() {
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        let mut issue = base_issue("a.foo");
        issue
            .preconditions
            .push(leaf_condition("a.foo", "root", "a.bar", "formal(0)", "Sink:Leak", 0));

        let mut stream = ParseStream::new();
        stream.preconditions.insert(
            ("a.bar".to_string(), "formal(0)".to_string()),
            vec![leaf_condition("a.bar", "formal(0)", "a.sink", "sink", "Sink:Leak", 1)],
        );
        stream.issues.push(issue);

        let (graph, summary) = ModelGenerator::generate(run, stream);
        assert_eq!(graph.num_issues(), 1);
        assert_eq!(graph.num_trace_frames(), 2);
        assert_eq!(summary.num_missing(TraceKind::Precondition), 0);
    }

    /// Frames beyond a leaf port are never queried against the buckets, and
    /// so never appear as missing.
    #[test]
    fn leaf_callee_port_does_not_trigger_a_missing_trace() {
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        let mut issue = base_issue("a.foo");
        issue
            .postconditions
            .push(leaf_condition("a.foo", "root", "a.Source", "source", "Source:Input", 0));

        let mut stream = ParseStream::new();
        stream.issues.push(issue);

        let (graph, summary) = ModelGenerator::generate(run, stream);
        assert_eq!(graph.num_trace_frames(), 1);
        assert_eq!(summary.num_missing(TraceKind::Postcondition), 0);
    }

    /// A requested-but-absent non-leaf hop is recorded as missing.
    #[test]
    fn unresolved_non_leaf_hop_is_recorded_as_missing() {
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        let mut issue = base_issue("a.foo");
        issue
            .preconditions
            .push(leaf_condition("a.foo", "root", "a.bar", "formal(0)", "Sink:Leak", 0));

        let stream = {
            let mut stream = ParseStream::new();
            stream.issues.push(issue);
            stream
        };

        let (graph, summary) = ModelGenerator::generate(run, stream);
        assert_eq!(graph.num_trace_frames(), 1);
        assert_eq!(summary.num_missing(TraceKind::Precondition), 1);
    }

    /// P5: leaf ports terminate traversal even if a matching bucket entry
    /// happens to exist — the generator never looks one up for a leaf port.
    #[test]
    fn p5_leaf_port_terminates_traversal_unconditionally() {
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        let mut issue = base_issue("a.foo");
        issue
            .postconditions
            .push(leaf_condition("a.foo", "root", "a.Source", "source", "Source:Input", 0));

        let mut stream = ParseStream::new();
        stream.postconditions.insert(
            ("a.Source".to_string(), "source".to_string()),
            vec![leaf_condition("a.Source", "source", "a.deeper", "formal(0)", "Source:Input", 1)],
        );
        stream.issues.push(issue);

        let (graph, _summary) = ModelGenerator::generate(run, stream);
        assert_eq!(graph.num_trace_frames(), 1);
    }

    /// S5: a transform-kind leaf decomposes across a two-hop precondition
    /// chain, matching by its caller-side view.
    #[test]
    fn s5_transform_kind_propagates_across_a_hop() {
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        let mut issue = base_issue("a.foo");
        issue.preconditions.push(leaf_condition(
            "a.foo",
            "root",
            "a.bar",
            "formal(0)",
            "TaintInTaintOut@Sink:Leak",
            0,
        ));

        let mut stream = ParseStream::new();
        stream.preconditions.insert(
            ("a.bar".to_string(), "formal(0)".to_string()),
            vec![leaf_condition("a.bar", "formal(0)", "a.sink", "sink", "Sink:Leak", 1)],
        );
        stream.issues.push(issue);

        let (graph, summary) = ModelGenerator::generate(run, stream);
        assert_eq!(graph.num_trace_frames(), 2);
        assert_eq!(summary.num_missing(TraceKind::Precondition), 0);
    }

    /// Oversized TITO lists are truncated and noted rather than dropped.
    #[test]
    fn oversized_tito_list_is_truncated_and_recorded() {
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        let mut issue = base_issue("a.foo");
        let mut cond = leaf_condition("a.foo", "root", "a.bar", "formal(0)", "Sink:Leak", 0);
        cond.titos = (0..250).map(|i| location(i)).collect();
        issue.preconditions.push(cond);

        let mut stream = ParseStream::new();
        stream.issues.push(issue);

        let (graph, summary) = ModelGenerator::generate(run, stream);
        assert_eq!(graph.trace_frames[0].titos.len(), TITO_LIMIT);
        assert_eq!(summary.big_tito.len(), 1);
    }
}
