//! The Bulk Persistence Engine (§4.6): reserve primary keys for every row a
//! [`TraceGraph`] contains, insert in the fixed §4.6.1 class order, and
//! resolve the natural-key races on `shared_text` and `issues` via
//! conflict-safe insert + re-merge.
//!
//! Shaped after the teacher's `DriftStorageEngine` (`open`/`open_in_memory`
//! constructors, `with_reader`/`with_writer` escape hatches over a single
//! connection) — this engine flushes every class synchronously within
//! `save`, rather than through a background batch writer, since §5 specifies
//! the engine as single-threaded per run.

use std::path::Path;

use rusqlite::Connection;

use sapp_core::types::collections::FxHashMap;
use sapp_core::types::entities::Run;
use sapp_graph::graph::TraceGraph;

use crate::dialect::Dialect;
use crate::errors::{ConsistencyError, PersistError};
use crate::queries::assocs::{
    insert_class_type_intervals, insert_issue_instance_shared_text_assocs,
    insert_issue_instance_trace_frame_assocs, insert_meta_run_issue_instance_index,
    insert_trace_frame_annotation_trace_frame_assocs, insert_trace_frame_annotations,
    insert_trace_frame_leaf_assocs, ClassTypeIntervalRow, IssueInstanceSharedTextAssocRow,
    IssueInstanceTraceFrameAssocRow, MetaRunIssueInstanceIndexRow,
    TraceFrameAnnotationTraceFrameAssocRow, TraceFrameAnnotationRow, TraceFrameLeafAssocRow,
};
use crate::queries::issue_instances::{
    insert_issue_instance_fix_infos, insert_issue_instances, IssueInstanceFixInfoRow,
    IssueInstanceRow,
};
use crate::queries::issues::{insert_issues_conflict_safe, lookup_issue_ids, IssueRow};
use crate::queries::runs::{finish_run, insert_runs, RunRow};
use crate::queries::shared_text::{insert_shared_text_conflict_safe, lookup_shared_text_ids, SharedTextRow};
use crate::queries::trace_frames::{insert_trace_frames, TraceFrameRow};
use crate::reservation::{reserve_id_range, DEFAULT_ALLOWED_RANGE};
use crate::schema;

/// Rows are inserted in chunks no larger than this (§4.6.2 "batches of
/// ≤ 30,000") so a single run never holds one oversized statement open.
const MAX_SAVE_BATCH: usize = 30_000;

/// Per-run tally returned by [`BulkPersistenceEngine::save`]: the concrete
/// run id and how many rows actually landed in each class, keyed by table
/// name — the output of the `DatabaseSaver` pipeline step (§4.7).
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub inserted_counts: FxHashMap<&'static str, usize>,
}

pub struct BulkPersistenceEngine {
    conn: Connection,
    dialect: Dialect,
}

impl BulkPersistenceEngine {
    pub fn open(path: &Path) -> Result<Self, PersistError> {
        let conn = Connection::open(path)?;
        schema::ensure_schema(&conn)?;
        Ok(Self { conn, dialect: Dialect::Sqlite })
    }

    pub fn open_in_memory() -> Result<Self, PersistError> {
        let conn = Connection::open_in_memory()?;
        schema::ensure_schema(&conn)?;
        Ok(Self { conn, dialect: Dialect::Sqlite })
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Read-only access to the underlying connection, for query-path
    /// consumers (`sapp_query`) that never need to mutate state.
    pub fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.conn)
    }

    /// Mutable access for callers that need to drive the connection
    /// directly (schema migration, ad hoc maintenance queries).
    pub fn with_writer<T>(&mut self, f: impl FnOnce(&mut Connection) -> T) -> T {
        f(&mut self.conn)
    }

    /// Persist an entire [`TraceGraph`] and finalize its [`Run`], returning
    /// the per-class insert tally (§4.6.1, §4.6.2, §4.6.3).
    pub fn save(&mut self, mut graph: TraceGraph, finished_time: i64) -> Result<RunSummary, PersistError> {
        let mut counts: FxHashMap<&'static str, usize> = FxHashMap::default();

        let run_id = self.save_run(&graph.run)?;
        counts.insert("runs", 1);

        counts.insert("shared_text", self.save_shared_text(&mut graph)?);
        counts.insert("issues", self.save_issues(&mut graph, run_id)?);
        counts.insert("issue_instance_fix_info", self.reserve_and_insert_fix_infos(&mut graph)?);
        counts.insert("issue_instances", self.reserve_and_insert_instances(&mut graph, run_id)?);
        counts.insert("issue_instance_shared_text_assoc", self.save_issue_instance_shared_text_assocs(&graph)?);
        counts.insert("trace_frames", self.reserve_and_insert_trace_frames(&mut graph, run_id)?);
        counts.insert("issue_instance_trace_frame_assoc", self.save_issue_instance_trace_frame_assocs(&graph)?);
        counts.insert("trace_frame_annotation", self.reserve_and_insert_annotations(&mut graph)?);
        counts.insert("trace_frame_leaf_assoc", self.save_trace_frame_leaf_assocs(&graph)?);
        counts.insert("trace_frame_annotation_trace_frame_assoc", self.save_annotation_frame_assocs(&graph)?);
        counts.insert("class_type_interval", self.save_class_type_intervals(&graph)?);
        counts.insert("meta_run_issue_instance_index", self.save_meta_run_index(&graph)?);

        finish_run(&self.conn, run_id, finished_time)?;

        Ok(RunSummary { run_id, inserted_counts: counts })
    }

    fn save_run(&mut self, run: &Run) -> Result<i64, PersistError> {
        let (next, _) = reserve_id_range(&mut self.conn, "runs", 1, DEFAULT_ALLOWED_RANGE)?;
        let id = next + 1;
        run.id.resolve_to_int(id);
        run.id.freeze();
        insert_runs(&self.conn, &[RunRow::from_entity(run, id)])?;
        Ok(id)
    }

    /// Phase A+B for `shared_text` (§4.6.2): merge by `(kind, contents)`,
    /// reserve ids for the really-new rows, insert conflict-safely, then
    /// re-merge so a losing writer's placeholder resolves to the winner.
    fn save_shared_text(&mut self, graph: &mut TraceGraph) -> Result<usize, PersistError> {
        let keys: Vec<(String, String)> = graph
            .interner
            .rows()
            .iter()
            .map(|row| (crate::queries::encoding::shared_text_kind_to_str(row.kind).to_string(), row.contents.clone()))
            .collect();
        let existing = lookup_shared_text_ids(&self.conn, &keys)?;

        let mut really_new_indices = Vec::new();
        for (idx, row) in graph.interner.rows().iter().enumerate() {
            let key = (crate::queries::encoding::shared_text_kind_to_str(row.kind).to_string(), row.contents.clone());
            match existing.get(&key) {
                Some(&id) => {
                    row.id.resolve_to_int(id);
                    row.id.freeze();
                }
                None => really_new_indices.push(idx),
            }
        }

        let rows = graph.interner.rows();
        let (next, _) = reserve_id_range(&mut self.conn, "shared_text", really_new_indices.len() as i64, DEFAULT_ALLOWED_RANGE)?;
        let mut sql_rows = Vec::with_capacity(really_new_indices.len());
        for (offset, &idx) in really_new_indices.iter().enumerate() {
            let id = next + 1 + offset as i64;
            rows[idx].id.resolve_to_int(id);
            sql_rows.push(SharedTextRow::from_entity(&rows[idx], id));
        }

        for chunk in sql_rows.chunks(MAX_SAVE_BATCH) {
            insert_shared_text_conflict_safe(&self.conn, chunk, self.dialect)?;
        }

        // Re-merge: resolve every really-new key against whatever is in the
        // table now, in case a concurrent writer won the race.
        let really_new_keys: Vec<(String, String)> = really_new_indices
            .iter()
            .map(|&idx| (crate::queries::encoding::shared_text_kind_to_str(rows[idx].kind).to_string(), rows[idx].contents.clone()))
            .collect();
        let resolved = lookup_shared_text_ids(&self.conn, &really_new_keys)?;
        let mut unresolved = 0;
        for &idx in &really_new_indices {
            let key = (crate::queries::encoding::shared_text_kind_to_str(rows[idx].kind).to_string(), rows[idx].contents.clone());
            match resolved.get(&key) {
                Some(&winner_id) => {
                    rows[idx].id.resolve_to_int(winner_id);
                    rows[idx].id.freeze();
                }
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            return Err(ConsistencyError { table_name: "shared_text".to_string(), unsaved_count: unresolved }.into());
        }

        Ok(really_new_indices.len())
    }

    fn save_issues(&mut self, graph: &mut TraceGraph, _run_id: i64) -> Result<usize, PersistError> {
        let handles: Vec<String> = graph.issues.iter().map(|issue| issue.handle.clone()).collect();
        let existing = lookup_issue_ids(&self.conn, &handles)?;

        let mut really_new_indices = Vec::new();
        for (idx, issue) in graph.issues.iter().enumerate() {
            match existing.get(&issue.handle) {
                Some(&id) => {
                    issue.id.resolve_to_int(id);
                    issue.id.freeze();
                }
                None => really_new_indices.push(idx),
            }
        }

        let (next, _) = reserve_id_range(&mut self.conn, "issues", really_new_indices.len() as i64, DEFAULT_ALLOWED_RANGE)?;
        let mut sql_rows = Vec::with_capacity(really_new_indices.len());
        for (offset, &idx) in really_new_indices.iter().enumerate() {
            let id = next + 1 + offset as i64;
            let issue = &graph.issues[idx];
            issue.id.resolve_to_int(id);
            let callable = issue.callable.as_int()?;
            // `first_seen_instance` points forward to a not-yet-reserved
            // `IssueInstance` row; left NULL here and backfilled once that
            // class runs (see `reserve_and_insert_instances`).
            sql_rows.push(IssueRow::from_entity(issue, id, callable, None));
        }
        for chunk in sql_rows.chunks(MAX_SAVE_BATCH) {
            insert_issues_conflict_safe(&self.conn, chunk, self.dialect)?;
        }

        let really_new_handles: Vec<String> = really_new_indices.iter().map(|&idx| graph.issues[idx].handle.clone()).collect();
        let resolved = lookup_issue_ids(&self.conn, &really_new_handles)?;
        let mut unresolved = 0;
        for &idx in &really_new_indices {
            let issue = &graph.issues[idx];
            match resolved.get(&issue.handle) {
                Some(&winner_id) => {
                    issue.id.resolve_to_int(winner_id);
                    issue.id.freeze();
                }
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            return Err(ConsistencyError { table_name: "issues".to_string(), unsaved_count: unresolved }.into());
        }

        Ok(really_new_indices.len())
    }

    /// Reserves and freezes ids for `issue_instance_fix_info` only (§4.6.1
    /// class order). Its FK points *forward* to `IssueInstance`, which has
    /// not been reserved yet at this point in the order, so the actual
    /// `INSERT` is deferred to [`Self::reserve_and_insert_instances`], which
    /// runs directly afterwards and can resolve both sides.
    fn reserve_and_insert_fix_infos(&mut self, graph: &mut TraceGraph) -> Result<usize, PersistError> {
        let count = graph.issue_instance_fix_infos.len();
        let (next, _) = reserve_id_range(&mut self.conn, "issue_instance_fix_info", count as i64, DEFAULT_ALLOWED_RANGE)?;
        for (offset, fix_info) in graph.issue_instance_fix_infos.iter().enumerate() {
            fix_info.id.resolve_to_int(next + 1 + offset as i64);
            fix_info.id.freeze();
        }
        Ok(count)
    }

    fn reserve_and_insert_instances(&mut self, graph: &mut TraceGraph, run_id: i64) -> Result<usize, PersistError> {
        let count = graph.issue_instances.len();
        let (next, _) = reserve_id_range(&mut self.conn, "issue_instances", count as i64, DEFAULT_ALLOWED_RANGE)?;
        for (offset, instance) in graph.issue_instances.iter().enumerate() {
            instance.id.resolve_to_int(next + 1 + offset as i64);
            instance.id.freeze();
        }

        // Now that every instance id is concrete, the fix-info rows
        // (reserved in the previous class, ids already frozen) can finally
        // be serialized and inserted — their only dependency was this id.
        let mut fix_info_rows = Vec::with_capacity(graph.issue_instance_fix_infos.len());
        for fix_info in &graph.issue_instance_fix_infos {
            let id = fix_info.id.as_int()?;
            let issue_instance_id = fix_info.issue_instance_id.as_int()?;
            fix_info_rows.push(IssueInstanceFixInfoRow::from_entity(fix_info, id, issue_instance_id));
        }
        for chunk in fix_info_rows.chunks(MAX_SAVE_BATCH) {
            insert_issue_instance_fix_infos(&self.conn, chunk)?;
        }

        let mut rows = Vec::with_capacity(count);
        for instance in &graph.issue_instances {
            let id = instance.id.as_int()?;
            let issue_id = instance.issue_id.as_int()?;
            let filename_id = instance.filename_id.as_int()?;
            let callable_id = instance.callable_id.as_int()?;
            let message_id = instance.message_id.as_int()?;
            let fix_info_id = instance.fix_info_id.as_ref().map(|d| d.as_int()).transpose()?;
            rows.push(IssueInstanceRow::from_entity(instance, id, run_id, issue_id, filename_id, callable_id, message_id, fix_info_id));
        }
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            insert_issue_instances(&self.conn, chunk)?;
        }

        for issue in &graph.issues {
            if let Some(first_seen_instance) = &issue.first_seen_instance {
                crate::queries::issues::update_first_seen_instance(&self.conn, issue.id.as_int()?, first_seen_instance.as_int()?)?;
            }
        }

        Ok(count)
    }

    fn save_issue_instance_shared_text_assocs(&mut self, graph: &TraceGraph) -> Result<usize, PersistError> {
        let mut rows = Vec::with_capacity(graph.issue_instance_shared_text_assocs.len());
        for assoc in &graph.issue_instance_shared_text_assocs {
            let issue_instance_id = assoc.issue_instance_id.as_int()?;
            let shared_text_id = assoc.shared_text_id.as_int()?;
            rows.push(IssueInstanceSharedTextAssocRow::from_entity(assoc, issue_instance_id, shared_text_id));
        }
        let mut inserted = 0;
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            inserted += insert_issue_instance_shared_text_assocs(&self.conn, chunk)?;
        }
        Ok(inserted)
    }

    fn reserve_and_insert_trace_frames(&mut self, graph: &mut TraceGraph, run_id: i64) -> Result<usize, PersistError> {
        let count = graph.trace_frames.len();
        let (next, _) = reserve_id_range(&mut self.conn, "trace_frames", count as i64, DEFAULT_ALLOWED_RANGE)?;
        let mut rows = Vec::with_capacity(count);
        for (offset, frame) in graph.trace_frames.iter().enumerate() {
            let id = next + 1 + offset as i64;
            frame.id.resolve_to_int(id);
            frame.id.freeze();
            let caller_id = frame.caller_id.as_int()?;
            let callee_id = frame.callee_id.as_int()?;
            let filename_id = frame.filename_id.as_int()?;
            rows.push(TraceFrameRow::from_entity(frame, id, run_id, caller_id, callee_id, filename_id));
        }
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            insert_trace_frames(&self.conn, chunk)?;
        }
        Ok(count)
    }

    fn save_issue_instance_trace_frame_assocs(&mut self, graph: &TraceGraph) -> Result<usize, PersistError> {
        let mut rows = Vec::with_capacity(graph.issue_instance_trace_frame_assocs.len());
        for assoc in &graph.issue_instance_trace_frame_assocs {
            let issue_instance_id = assoc.issue_instance_id.as_int()?;
            let trace_frame_id = assoc.trace_frame_id.as_int()?;
            rows.push(IssueInstanceTraceFrameAssocRow::from_entity(assoc, issue_instance_id, trace_frame_id));
        }
        let mut inserted = 0;
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            inserted += insert_issue_instance_trace_frame_assocs(&self.conn, chunk)?;
        }
        Ok(inserted)
    }

    fn reserve_and_insert_annotations(&mut self, graph: &mut TraceGraph) -> Result<usize, PersistError> {
        let count = graph.trace_frame_annotations.len();
        let (next, _) = reserve_id_range(&mut self.conn, "trace_frame_annotation", count as i64, DEFAULT_ALLOWED_RANGE)?;
        let mut rows = Vec::with_capacity(count);
        for (offset, annotation) in graph.trace_frame_annotations.iter().enumerate() {
            let id = next + 1 + offset as i64;
            annotation.id.resolve_to_int(id);
            annotation.id.freeze();
            let trace_frame_id = annotation.trace_frame_id.as_int()?;
            let leaf_id = annotation.leaf_id.as_ref().map(|d| d.as_int()).transpose()?;
            rows.push(TraceFrameAnnotationRow::from_entity(annotation, id, trace_frame_id, leaf_id));
        }
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            insert_trace_frame_annotations(&self.conn, chunk)?;
        }
        Ok(count)
    }

    fn save_trace_frame_leaf_assocs(&mut self, graph: &TraceGraph) -> Result<usize, PersistError> {
        let mut rows = Vec::with_capacity(graph.trace_frame_leaf_assocs.len());
        for assoc in &graph.trace_frame_leaf_assocs {
            let trace_frame_id = assoc.trace_frame_id.as_int()?;
            let leaf_id = assoc.leaf_id.as_int()?;
            rows.push(TraceFrameLeafAssocRow::from_entity(assoc, trace_frame_id, leaf_id));
        }
        let mut inserted = 0;
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            inserted += insert_trace_frame_leaf_assocs(&self.conn, chunk)?;
        }
        Ok(inserted)
    }

    fn save_annotation_frame_assocs(&mut self, graph: &TraceGraph) -> Result<usize, PersistError> {
        let mut rows = Vec::with_capacity(graph.trace_frame_annotation_trace_frame_assocs.len());
        for assoc in &graph.trace_frame_annotation_trace_frame_assocs {
            let annotation_id = assoc.trace_frame_annotation_id.as_int()?;
            let trace_frame_id = assoc.trace_frame_id.as_int()?;
            rows.push(TraceFrameAnnotationTraceFrameAssocRow::from_entity(assoc, annotation_id, trace_frame_id));
        }
        let mut inserted = 0;
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            inserted += insert_trace_frame_annotation_trace_frame_assocs(&self.conn, chunk)?;
        }
        Ok(inserted)
    }

    fn save_class_type_intervals(&mut self, graph: &TraceGraph) -> Result<usize, PersistError> {
        let rows: Vec<_> = graph.class_type_intervals.iter().map(ClassTypeIntervalRow::from_entity).collect();
        let mut inserted = 0;
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            inserted += insert_class_type_intervals(&self.conn, chunk)?;
        }
        Ok(inserted)
    }

    fn save_meta_run_index(&mut self, graph: &TraceGraph) -> Result<usize, PersistError> {
        let mut rows = Vec::with_capacity(graph.meta_run_issue_instance_index.len());
        for entry in &graph.meta_run_issue_instance_index {
            let meta_run_id = entry.meta_run_id.as_int()?;
            let issue_instance_id = entry.issue_instance_id.as_int()?;
            rows.push(MetaRunIssueInstanceIndexRow::from_entity(entry, meta_run_id, issue_instance_id));
        }
        let mut inserted = 0;
        for chunk in rows.chunks(MAX_SAVE_BATCH) {
            inserted += insert_meta_run_issue_instance_index(&self.conn, chunk)?;
        }
        Ok(inserted)
    }
}
