//! `shared_text` table (§3.2, §4.2). Unique key `(kind, contents)` — the
//! one table besides `issues` where concurrent runs can race to intern the
//! same row, so inserts go through the conflict-safe path (§4.6.2).

use rusqlite::{params, Connection};

use crate::dialect::Dialect;
use crate::errors::DatabaseOperationalError;
use crate::queries::collect_rows;
use crate::queries::encoding::shared_text_kind_to_str;
use sapp_core::types::collections::FxHashMap;
use sapp_core::types::entities::SharedText;

pub struct SharedTextRow {
    pub id: i64,
    pub kind: String,
    pub contents: String,
}

impl SharedTextRow {
    pub fn from_entity(text: &SharedText, id: i64) -> Self {
        Self {
            id,
            kind: shared_text_kind_to_str(text.kind).to_string(),
            contents: text.contents.clone(),
        }
    }
}

/// Insert `rows`, silently skipping any whose `(kind, contents)` already
/// exists (a racing writer interned it first).
pub fn insert_shared_text_conflict_safe(conn: &Connection, rows: &[SharedTextRow], dialect: Dialect) -> Result<usize, DatabaseOperationalError> {
    let sql = format!(
        "INSERT INTO shared_text (id, kind, contents) VALUES (?1, ?2, ?3) {}",
        dialect.conflict_safe_insert_suffix()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![row.id, row.kind, row.contents])?;
    }
    Ok(inserted)
}

/// Resolves every `(kind, contents)` key already present in the table,
/// regardless of who inserted it — the merge step of the two-phase save
/// (§4.6.2).
pub fn lookup_shared_text_ids(conn: &Connection, keys: &[(String, String)]) -> Result<FxHashMap<(String, String), i64>, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached("SELECT id FROM shared_text WHERE kind = ?1 AND contents = ?2")?;
    let mut found = FxHashMap::default();
    for (kind, contents) in keys {
        if let Ok(id) = stmt.query_row(params![kind, contents], |row| row.get::<_, i64>(0)) {
            found.insert((kind.clone(), contents.clone()), id);
        }
    }
    Ok(found)
}

pub fn read_all(conn: &Connection) -> Result<Vec<SharedTextRow>, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached("SELECT id, kind, contents FROM shared_text")?;
    let rows = stmt.query_map([], map_row)?;
    collect_rows(rows)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SharedTextRow> {
    Ok(SharedTextRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        contents: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapp_core::types::entities::SharedTextKind;

    #[test]
    fn conflict_safe_insert_skips_existing_key_and_merge_resolves_it() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::ensure_schema(&conn).unwrap();
        insert_shared_text_conflict_safe(
            &conn,
            &[SharedTextRow { id: 1, kind: "callable".to_string(), contents: "a.foo".to_string() }],
            Dialect::Sqlite,
        )
        .unwrap();
        // a racing writer tries to claim the same key under a different id
        insert_shared_text_conflict_safe(
            &conn,
            &[SharedTextRow { id: 2, kind: "callable".to_string(), contents: "a.foo".to_string() }],
            Dialect::Sqlite,
        )
        .unwrap();
        let resolved = lookup_shared_text_ids(&conn, &[("callable".to_string(), "a.foo".to_string())]).unwrap();
        assert_eq!(resolved.get(&("callable".to_string(), "a.foo".to_string())), Some(&1));
        assert_eq!(read_all(&conn).unwrap().len(), 1);
    }

    #[test]
    fn from_entity_maps_kind_and_contents() {
        let text = SharedText { id: sapp_core::types::placeholder::DbId::new(), kind: SharedTextKind::Filename, contents: "a.py".to_string() };
        let row = SharedTextRow::from_entity(&text, 5);
        assert_eq!(row.kind, "filename");
        assert_eq!(row.contents, "a.py");
    }
}
