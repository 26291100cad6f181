//! `trace_frames` table (§3.2). Every frame is freshly generated per run, so
//! like `issue_instances` this is a plain insert with no conflict handling.

use rusqlite::{params, Connection};

use crate::errors::DatabaseOperationalError;
use crate::queries::encoding::{encode_titos, reachability_to_str, trace_kind_to_str};
use sapp_core::types::entities::TraceFrame;

pub struct TraceFrameRow {
    pub id: i64,
    pub run_id: i64,
    pub kind: String,
    pub caller_id: i64,
    pub caller_port: String,
    pub callee_id: i64,
    pub callee_port: String,
    pub filename_id: i64,
    pub callee_line: i64,
    pub callee_begin_column: i64,
    pub callee_end_column: i64,
    pub titos: String,
    pub type_interval_lower: Option<i64>,
    pub type_interval_upper: Option<i64>,
    pub type_interval_preserves_type_context: Option<bool>,
    pub reachability: String,
}

impl TraceFrameRow {
    pub fn from_entity(frame: &TraceFrame, id: i64, run_id: i64, caller_id: i64, callee_id: i64, filename_id: i64) -> Self {
        Self {
            id,
            run_id,
            kind: trace_kind_to_str(frame.kind).to_string(),
            caller_id,
            caller_port: frame.caller_port.clone(),
            callee_id,
            callee_port: frame.callee_port.clone(),
            filename_id,
            callee_line: frame.callee_location.line,
            callee_begin_column: frame.callee_location.begin_column,
            callee_end_column: frame.callee_location.end_column,
            titos: encode_titos(&frame.titos),
            type_interval_lower: frame.type_interval.map(|t| t.lower),
            type_interval_upper: frame.type_interval.map(|t| t.upper),
            type_interval_preserves_type_context: frame.type_interval.map(|t| t.preserves_type_context),
            reachability: reachability_to_str(frame.reachability).to_string(),
        }
    }
}

pub fn insert_trace_frames(conn: &Connection, rows: &[TraceFrameRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO trace_frames (
            id, run_id, kind, caller_id, caller_port, callee_id, callee_port, filename_id,
            callee_line, callee_begin_column, callee_end_column, titos,
            type_interval_lower, type_interval_upper, type_interval_preserves_type_context, reachability
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    )?;
    let mut inserted = 0;
    for row in rows {
        stmt.execute(params![
            row.id,
            row.run_id,
            row.kind,
            row.caller_id,
            row.caller_port,
            row.callee_id,
            row.callee_port,
            row.filename_id,
            row.callee_line,
            row.callee_begin_column,
            row.callee_end_column,
            row.titos,
            row.type_interval_lower,
            row.type_interval_upper,
            row.type_interval_preserves_type_context,
            row.reachability,
        ])?;
        inserted += 1;
    }
    Ok(inserted)
}

pub fn count_trace_frames(conn: &Connection) -> Result<i64, DatabaseOperationalError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM trace_frames", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapp_core::types::entities::{TraceFrameReachability, TraceKind};

    #[test]
    fn insert_a_trace_frame_row() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::ensure_schema(&conn).unwrap();
        let row = TraceFrameRow {
            id: 1,
            run_id: 1,
            kind: trace_kind_to_str(TraceKind::Precondition).to_string(),
            caller_id: 1,
            caller_port: "root".to_string(),
            callee_id: 2,
            callee_port: "formal(0)".to_string(),
            filename_id: 1,
            callee_line: 10,
            callee_begin_column: 1,
            callee_end_column: 5,
            titos: String::new(),
            type_interval_lower: None,
            type_interval_upper: None,
            type_interval_preserves_type_context: None,
            reachability: reachability_to_str(TraceFrameReachability::Unreachable).to_string(),
        };
        insert_trace_frames(&conn, &[row]).unwrap();
        assert_eq!(count_trace_frames(&conn).unwrap(), 1);
    }
}
