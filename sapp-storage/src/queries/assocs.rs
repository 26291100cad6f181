//! Association and auxiliary tables (§3.2, §4.6.1): join rows between
//! issue instances/trace frames and their shared-text leaves, plus the
//! per-class type-interval and meta-run index tables. None of these carry a
//! natural key a racing writer could collide on, so every insert here is
//! plain.

use rusqlite::{params, Connection};

use crate::errors::DatabaseOperationalError;
use crate::queries::encoding::annotation_kind_to_str;
use sapp_core::types::entities::{
    ClassTypeInterval, IssueInstanceSharedTextAssoc, IssueInstanceTraceFrameAssoc,
    MetaRunIssueInstanceIndex, TraceFrameAnnotation, TraceFrameAnnotationTraceFrameAssoc,
    TraceFrameLeafAssoc,
};

pub struct IssueInstanceSharedTextAssocRow {
    pub issue_instance_id: i64,
    pub shared_text_id: i64,
}

impl IssueInstanceSharedTextAssocRow {
    pub fn from_entity(_assoc: &IssueInstanceSharedTextAssoc, issue_instance_id: i64, shared_text_id: i64) -> Self {
        Self { issue_instance_id, shared_text_id }
    }
}

pub fn insert_issue_instance_shared_text_assocs(conn: &Connection, rows: &[IssueInstanceSharedTextAssocRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO issue_instance_shared_text_assoc (issue_instance_id, shared_text_id) VALUES (?1, ?2)",
    )?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![row.issue_instance_id, row.shared_text_id])?;
    }
    Ok(inserted)
}

pub struct IssueInstanceTraceFrameAssocRow {
    pub issue_instance_id: i64,
    pub trace_frame_id: i64,
}

impl IssueInstanceTraceFrameAssocRow {
    pub fn from_entity(_assoc: &IssueInstanceTraceFrameAssoc, issue_instance_id: i64, trace_frame_id: i64) -> Self {
        Self { issue_instance_id, trace_frame_id }
    }
}

pub fn insert_issue_instance_trace_frame_assocs(conn: &Connection, rows: &[IssueInstanceTraceFrameAssocRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO issue_instance_trace_frame_assoc (issue_instance_id, trace_frame_id) VALUES (?1, ?2)",
    )?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![row.issue_instance_id, row.trace_frame_id])?;
    }
    Ok(inserted)
}

pub struct TraceFrameLeafAssocRow {
    pub trace_frame_id: i64,
    pub leaf_id: i64,
    pub trace_length: i64,
}

impl TraceFrameLeafAssocRow {
    pub fn from_entity(assoc: &TraceFrameLeafAssoc, trace_frame_id: i64, leaf_id: i64) -> Self {
        Self { trace_frame_id, leaf_id, trace_length: assoc.trace_length }
    }
}

pub fn insert_trace_frame_leaf_assocs(conn: &Connection, rows: &[TraceFrameLeafAssocRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO trace_frame_leaf_assoc (trace_frame_id, leaf_id, trace_length) VALUES (?1, ?2, ?3)",
    )?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![row.trace_frame_id, row.leaf_id, row.trace_length])?;
    }
    Ok(inserted)
}

pub struct TraceFrameAnnotationRow {
    pub id: i64,
    pub trace_frame_id: i64,
    pub line: i64,
    pub begin_column: i64,
    pub end_column: i64,
    pub kind: String,
    pub message: String,
    pub leaf_id: Option<i64>,
}

impl TraceFrameAnnotationRow {
    pub fn from_entity(annotation: &TraceFrameAnnotation, id: i64, trace_frame_id: i64, leaf_id: Option<i64>) -> Self {
        Self {
            id,
            trace_frame_id,
            line: annotation.location.line,
            begin_column: annotation.location.begin_column,
            end_column: annotation.location.end_column,
            kind: annotation_kind_to_str(annotation.kind).to_string(),
            message: annotation.message.clone(),
            leaf_id,
        }
    }
}

pub fn insert_trace_frame_annotations(conn: &Connection, rows: &[TraceFrameAnnotationRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO trace_frame_annotation (id, trace_frame_id, line, begin_column, end_column, kind, message, leaf_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    let mut inserted = 0;
    for row in rows {
        stmt.execute(params![row.id, row.trace_frame_id, row.line, row.begin_column, row.end_column, row.kind, row.message, row.leaf_id])?;
        inserted += 1;
    }
    Ok(inserted)
}

pub struct TraceFrameAnnotationTraceFrameAssocRow {
    pub trace_frame_annotation_id: i64,
    pub trace_frame_id: i64,
}

impl TraceFrameAnnotationTraceFrameAssocRow {
    pub fn from_entity(_assoc: &TraceFrameAnnotationTraceFrameAssoc, trace_frame_annotation_id: i64, trace_frame_id: i64) -> Self {
        Self { trace_frame_annotation_id, trace_frame_id }
    }
}

/// No production code path populates this table today (DESIGN.md); the
/// insert function exists so the class-order loop in the persistence engine
/// treats every §4.6.1 entity uniformly, empty slices included.
pub fn insert_trace_frame_annotation_trace_frame_assocs(conn: &Connection, rows: &[TraceFrameAnnotationTraceFrameAssocRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO trace_frame_annotation_trace_frame_assoc (trace_frame_annotation_id, trace_frame_id) VALUES (?1, ?2)",
    )?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![row.trace_frame_annotation_id, row.trace_frame_id])?;
    }
    Ok(inserted)
}

pub struct ClassTypeIntervalRow {
    pub class_name: String,
    pub lower: i64,
    pub upper: i64,
    pub preserves_type_context: bool,
}

impl ClassTypeIntervalRow {
    pub fn from_entity(interval: &ClassTypeInterval) -> Self {
        Self {
            class_name: interval.class_name.clone(),
            lower: interval.interval.lower,
            upper: interval.interval.upper,
            preserves_type_context: interval.interval.preserves_type_context,
        }
    }
}

pub fn insert_class_type_intervals(conn: &Connection, rows: &[ClassTypeIntervalRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO class_type_interval (class_name, lower, upper, preserves_type_context) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(class_name) DO UPDATE SET lower = excluded.lower, upper = excluded.upper, preserves_type_context = excluded.preserves_type_context",
    )?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![row.class_name, row.lower, row.upper, row.preserves_type_context])?;
    }
    Ok(inserted)
}

pub struct MetaRunIssueInstanceIndexRow {
    pub meta_run_id: i64,
    pub issue_instance_id: i64,
}

impl MetaRunIssueInstanceIndexRow {
    pub fn from_entity(_row: &MetaRunIssueInstanceIndex, meta_run_id: i64, issue_instance_id: i64) -> Self {
        Self { meta_run_id, issue_instance_id }
    }
}

/// Always called with an empty slice unless a caller opts in (DESIGN.md).
pub fn insert_meta_run_issue_instance_index(conn: &Connection, rows: &[MetaRunIssueInstanceIndexRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO meta_run_issue_instance_index (meta_run_id, issue_instance_id) VALUES (?1, ?2)",
    )?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![row.meta_run_id, row.issue_instance_id])?;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_issue_instance_shared_text_assoc_row() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::ensure_schema(&conn).unwrap();
        let inserted = insert_issue_instance_shared_text_assocs(&conn, &[IssueInstanceSharedTextAssocRow { issue_instance_id: 1, shared_text_id: 2 }]).unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn insert_trace_frame_leaf_assoc_row() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::ensure_schema(&conn).unwrap();
        let inserted = insert_trace_frame_leaf_assocs(&conn, &[TraceFrameLeafAssocRow { trace_frame_id: 1, leaf_id: 2, trace_length: 0 }]).unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn class_type_interval_upsert_replaces_existing_row() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::ensure_schema(&conn).unwrap();
        insert_class_type_intervals(&conn, &[ClassTypeIntervalRow { class_name: "A".to_string(), lower: 0, upper: 1, preserves_type_context: true }]).unwrap();
        insert_class_type_intervals(&conn, &[ClassTypeIntervalRow { class_name: "A".to_string(), lower: 2, upper: 3, preserves_type_context: false }]).unwrap();
        let upper: i64 = conn.query_row("SELECT upper FROM class_type_interval WHERE class_name = 'A'", [], |row| row.get(0)).unwrap();
        assert_eq!(upper, 3);
    }
}
