//! `runs` table (§3.2). One row per ingestion; never involved in a key race
//! since each run gets a freshly reserved id.

use rusqlite::{params, Connection};

use crate::errors::DatabaseOperationalError;
use crate::queries::encoding::{purge_status_to_str, run_kind_to_str, run_status_to_str};
#[cfg(test)]
use crate::queries::encoding::run_status_from_str;

pub struct RunRow {
    pub id: i64,
    pub job_id: Option<String>,
    pub date: i64,
    pub status: String,
    pub commit_hash: Option<String>,
    pub branch: Option<String>,
    pub repository: Option<String>,
    pub kind: String,
    pub purge_status: String,
    pub finished_time: Option<i64>,
}

impl RunRow {
    pub fn from_entity(run: &sapp_core::types::entities::Run, id: i64) -> Self {
        Self {
            id,
            job_id: run.job_id.clone(),
            date: run.date,
            status: run_status_to_str(run.status).to_string(),
            commit_hash: run.commit_hash.clone(),
            branch: run.branch.clone(),
            repository: run.repository.clone(),
            kind: run_kind_to_str(run.kind).to_string(),
            purge_status: purge_status_to_str(run.purge_status).to_string(),
            finished_time: run.finished_time,
        }
    }
}

pub fn insert_runs(conn: &Connection, rows: &[RunRow]) -> Result<usize, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO runs (id, job_id, date, status, commit_hash, branch, repository, kind, purge_status, finished_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    let mut inserted = 0;
    for row in rows {
        stmt.execute(params![
            row.id,
            row.job_id,
            row.date,
            row.status,
            row.commit_hash,
            row.branch,
            row.repository,
            row.kind,
            row.purge_status,
            row.finished_time,
        ])?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Transitions a run to `Finished` (§4.6.3), stamping `finished_time`.
pub fn finish_run(conn: &Connection, id: i64, finished_time: i64) -> Result<(), DatabaseOperationalError> {
    conn.prepare_cached("UPDATE runs SET status = ?1, finished_time = ?2 WHERE id = ?3")?
        .execute(params![run_status_to_str(sapp_core::types::entities::RunStatus::Finished), finished_time, id])?;
    Ok(())
}

pub fn read_run(conn: &Connection, id: i64) -> Result<Option<RunRow>, DatabaseOperationalError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, job_id, date, status, commit_hash, branch, repository, kind, purge_status, finished_time FROM runs WHERE id = ?1",
    )?;
    let row = stmt
        .query_row(params![id], |row| {
            Ok(RunRow {
                id: row.get(0)?,
                job_id: row.get(1)?,
                date: row.get(2)?,
                status: row.get(3)?,
                commit_hash: row.get(4)?,
                branch: row.get(5)?,
                repository: row.get(6)?,
                kind: row.get(7)?,
                purge_status: row.get(8)?,
                finished_time: row.get(9)?,
            })
        })
        .ok();
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapp_core::types::entities::{Run, RunKind};

    #[test]
    fn insert_and_read_back_a_run() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::ensure_schema(&conn).unwrap();
        let mut run = Run::new(RunKind::Pysa, 1_700_000_000);
        run.finish(1_700_000_100);
        insert_runs(&conn, &[RunRow::from_entity(&run, 1)]).unwrap();
        let row = read_run(&conn, 1).unwrap().unwrap();
        assert_eq!(row.finished_time, Some(1_700_000_100));
        assert_eq!(run_status_from_str(&row.status), sapp_core::types::entities::RunStatus::Finished);
    }

    #[test]
    fn finish_run_updates_status_and_timestamp() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::ensure_schema(&conn).unwrap();
        let run = Run::new(RunKind::Pysa, 1_700_000_000);
        insert_runs(&conn, &[RunRow::from_entity(&run, 1)]).unwrap();
        finish_run(&conn, 1, 1_700_000_555).unwrap();
        let row = read_run(&conn, 1).unwrap().unwrap();
        assert_eq!(row.status, "finished");
        assert_eq!(row.finished_time, Some(1_700_000_555));
    }
}
