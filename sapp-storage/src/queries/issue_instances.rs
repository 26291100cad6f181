//! `issue_instances` and `issue_instance_fix_info` (§3.2). Every instance is
//! freshly created per run, so neither table has a natural key a racing
//! writer could collide on — plain inserts, no conflict handling.

use rusqlite::{params, Connection};

use crate::errors::DatabaseOperationalError;
use sapp_core::types::entities::{IssueInstance, IssueInstanceFixInfo};

pub struct IssueInstanceRow {
    pub id: i64,
    pub run_id: i64,
    pub issue_id: i64,
    pub line: i64,
    pub begin_column: i64,
    pub end_column: i64,
    pub filename_id: i64,
    pub callable_id: i64,
    pub message_id: i64,
    pub fix_info_id: Option<i64>,
    pub min_trace_length_to_sources: i64,
    pub min_trace_length_to_sinks: i64,
    pub callable_count: i64,
    pub is_new: bool,
}

impl IssueInstanceRow {
    #[allow(clippy::too_many_arguments)]
    pub fn from_entity(instance: &IssueInstance, id: i64, run_id: i64, issue_id: i64, filename_id: i64, callable_id: i64, message_id: i64, fix_info_id: Option<i64>) -> Self {
        Self {
            id,
            run_id,
            issue_id,
            line: instance.location.line,
            begin_column: instance.location.begin_column,
            end_column: instance.location.end_column,
            filename_id,
            callable_id,
            message_id,
            fix_info_id,
            min_trace_length_to_sources: instance.min_trace_length_to_sources,
            min_trace_length_to_sinks: instance.min_trace_length_to_sinks,
            callable_count: instance.callable_count,
            is_new: instance.is_new,
        }
    }
}

pub fn insert_issue_instances(conn: &Connection, rows: &[IssueInstanceRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO issue_instances (
            id, run_id, issue_id, line, begin_column, end_column, filename_id, callable_id,
            message_id, fix_info_id, min_trace_length_to_sources, min_trace_length_to_sinks,
            callable_count, is_new
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
    )?;
    let mut inserted = 0;
    for row in rows {
        stmt.execute(params![
            row.id,
            row.run_id,
            row.issue_id,
            row.line,
            row.begin_column,
            row.end_column,
            row.filename_id,
            row.callable_id,
            row.message_id,
            row.fix_info_id,
            row.min_trace_length_to_sources,
            row.min_trace_length_to_sinks,
            row.callable_count,
            row.is_new,
        ])?;
        inserted += 1;
    }
    Ok(inserted)
}

pub struct IssueInstanceFixInfoRow {
    pub id: i64,
    pub issue_instance_id: i64,
    pub fix_info: String,
}

impl IssueInstanceFixInfoRow {
    pub fn from_entity(fix_info: &IssueInstanceFixInfo, id: i64, issue_instance_id: i64) -> Self {
        Self { id, issue_instance_id, fix_info: fix_info.fix_info.clone() }
    }
}

pub fn insert_issue_instance_fix_infos(conn: &Connection, rows: &[IssueInstanceFixInfoRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached("INSERT INTO issue_instance_fix_info (id, issue_instance_id, fix_info) VALUES (?1, ?2, ?3)")?;
    let mut inserted = 0;
    for row in rows {
        stmt.execute(params![row.id, row.issue_instance_id, row.fix_info])?;
        inserted += 1;
    }
    Ok(inserted)
}

pub fn count_issue_instances(conn: &Connection) -> Result<i64, DatabaseOperationalError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM issue_instances", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_issue_instance_and_fix_info() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::ensure_schema(&conn).unwrap();
        let row = IssueInstanceRow {
            id: 1,
            run_id: 1,
            issue_id: 1,
            line: 5,
            begin_column: 1,
            end_column: 10,
            filename_id: 1,
            callable_id: 1,
            message_id: 1,
            fix_info_id: Some(1),
            min_trace_length_to_sources: 0,
            min_trace_length_to_sinks: 0,
            callable_count: 1,
            is_new: true,
        };
        insert_issue_instances(&conn, &[row]).unwrap();
        insert_issue_instance_fix_infos(&conn, &[IssueInstanceFixInfoRow { id: 1, issue_instance_id: 1, fix_info: "patch it".to_string() }]).unwrap();
        assert_eq!(count_issue_instances(&conn).unwrap(), 1);
    }
}
