//! Per-entity insert/merge functions (§3.2, §4.6), one module per table,
//! following the `prepare_cached` + row-mapper + `collect_rows` idiom used
//! throughout this codebase's query layer.

pub mod assocs;
pub mod encoding;
pub mod issue_instances;
pub mod issues;
pub mod runs;
pub mod shared_text;
pub mod trace_frames;

use rusqlite::MappedRows;

use crate::errors::DatabaseOperationalError;

/// Drains a `query_map` iterator into a `Vec`, converting the first row
/// error encountered into this crate's error type.
pub(crate) fn collect_rows<T>(rows: MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>) -> Result<Vec<T>, DatabaseOperationalError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
