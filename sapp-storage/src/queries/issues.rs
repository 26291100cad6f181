//! `issues` table (§3.2, I3, I7). Unique key `handle` — like `shared_text`,
//! subject to cross-run races, so it also goes through the conflict-safe
//! insert + re-merge path (§4.6.2).

use rusqlite::{params, Connection};

use crate::dialect::Dialect;
use crate::errors::DatabaseOperationalError;
use crate::queries::encoding::issue_status_to_str;
use sapp_core::types::collections::FxHashMap;
use sapp_core::types::entities::Issue;

pub struct IssueRow {
    pub id: i64,
    pub handle: String,
    pub code: i64,
    pub callable: i64,
    pub status: String,
    pub first_seen: i64,
    pub first_seen_instance: Option<i64>,
}

impl IssueRow {
    pub fn from_entity(issue: &Issue, id: i64, callable: i64, first_seen_instance: Option<i64>) -> Self {
        Self {
            id,
            handle: issue.handle.clone(),
            code: issue.code,
            callable,
            status: issue_status_to_str(issue.status).to_string(),
            first_seen: issue.first_seen,
            first_seen_instance,
        }
    }
}

pub fn insert_issues_conflict_safe(conn: &Connection, rows: &[IssueRow], dialect: Dialect) -> Result<usize, DatabaseOperationalError> {
    let sql = format!(
        "INSERT INTO issues (id, handle, code, callable, status, first_seen, first_seen_instance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) {}",
        dialect.conflict_safe_insert_suffix()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![row.id, row.handle, row.code, row.callable, row.status, row.first_seen, row.first_seen_instance])?;
    }
    Ok(inserted)
}

/// Resolves every `handle` already present in the table (§4.6.2 merge).
pub fn lookup_issue_ids(conn: &Connection, handles: &[String]) -> Result<FxHashMap<String, i64>, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached("SELECT id FROM issues WHERE handle = ?1")?;
    let mut found = FxHashMap::default();
    for handle in handles {
        if let Ok(id) = stmt.query_row(params![handle], |row| row.get::<_, i64>(0)) {
            found.insert(handle.clone(), id);
        }
    }
    Ok(found)
}

pub fn count_issues(conn: &Connection) -> Result<i64, DatabaseOperationalError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?)
}

/// Backfills `first_seen_instance` once the referenced `IssueInstance` has
/// a concrete id (§4.6.1: `Issue` is inserted before `IssueInstance`, so
/// this forward reference cannot be resolved at insert time).
pub fn update_first_seen_instance(conn: &Connection, id: i64, first_seen_instance: i64) -> Result<(), DatabaseOperationalError> {
    conn.prepare_cached("UPDATE issues SET first_seen_instance = ?1 WHERE id = ?2")?
        .execute(params![first_seen_instance, id])?;
    Ok(())
}
