//! Schema definition and setup (§3.2, §9). One `CREATE TABLE IF NOT EXISTS`
//! per entity class plus the `primary_keys` bookkeeping table the
//! reservation protocol reads and writes (§4.5).

use rusqlite::Connection;

use crate::errors::DatabaseOperationalError;

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS primary_keys (
        table_name TEXT PRIMARY KEY,
        current_id INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS runs (
        id INTEGER PRIMARY KEY,
        job_id TEXT,
        date INTEGER NOT NULL,
        status TEXT NOT NULL,
        commit_hash TEXT,
        branch TEXT,
        repository TEXT,
        kind TEXT NOT NULL,
        purge_status TEXT NOT NULL,
        finished_time INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS shared_text (
        id INTEGER PRIMARY KEY,
        kind TEXT NOT NULL,
        contents TEXT NOT NULL,
        UNIQUE(kind, contents)
    )",
    "CREATE TABLE IF NOT EXISTS issues (
        id INTEGER PRIMARY KEY,
        handle TEXT NOT NULL UNIQUE,
        code INTEGER NOT NULL,
        callable INTEGER NOT NULL,
        status TEXT NOT NULL,
        first_seen INTEGER NOT NULL,
        first_seen_instance INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS issue_instance_fix_info (
        id INTEGER PRIMARY KEY,
        issue_instance_id INTEGER NOT NULL,
        fix_info TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS issue_instances (
        id INTEGER PRIMARY KEY,
        run_id INTEGER NOT NULL,
        issue_id INTEGER NOT NULL,
        line INTEGER NOT NULL,
        begin_column INTEGER NOT NULL,
        end_column INTEGER NOT NULL,
        filename_id INTEGER NOT NULL,
        callable_id INTEGER NOT NULL,
        message_id INTEGER NOT NULL,
        fix_info_id INTEGER,
        min_trace_length_to_sources INTEGER NOT NULL,
        min_trace_length_to_sinks INTEGER NOT NULL,
        callable_count INTEGER NOT NULL,
        is_new INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS issue_instance_shared_text_assoc (
        issue_instance_id INTEGER NOT NULL,
        shared_text_id INTEGER NOT NULL,
        PRIMARY KEY (issue_instance_id, shared_text_id)
    )",
    "CREATE TABLE IF NOT EXISTS trace_frames (
        id INTEGER PRIMARY KEY,
        run_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        caller_id INTEGER NOT NULL,
        caller_port TEXT NOT NULL,
        callee_id INTEGER NOT NULL,
        callee_port TEXT NOT NULL,
        filename_id INTEGER NOT NULL,
        callee_line INTEGER NOT NULL,
        callee_begin_column INTEGER NOT NULL,
        callee_end_column INTEGER NOT NULL,
        titos TEXT NOT NULL,
        type_interval_lower INTEGER,
        type_interval_upper INTEGER,
        type_interval_preserves_type_context INTEGER,
        reachability TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS issue_instance_trace_frame_assoc (
        issue_instance_id INTEGER NOT NULL,
        trace_frame_id INTEGER NOT NULL,
        PRIMARY KEY (issue_instance_id, trace_frame_id)
    )",
    "CREATE TABLE IF NOT EXISTS trace_frame_annotation (
        id INTEGER PRIMARY KEY,
        trace_frame_id INTEGER NOT NULL,
        line INTEGER NOT NULL,
        begin_column INTEGER NOT NULL,
        end_column INTEGER NOT NULL,
        kind TEXT NOT NULL,
        message TEXT NOT NULL,
        leaf_id INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS trace_frame_leaf_assoc (
        trace_frame_id INTEGER NOT NULL,
        leaf_id INTEGER NOT NULL,
        trace_length INTEGER NOT NULL,
        PRIMARY KEY (trace_frame_id, leaf_id)
    )",
    "CREATE TABLE IF NOT EXISTS trace_frame_annotation_trace_frame_assoc (
        trace_frame_annotation_id INTEGER NOT NULL,
        trace_frame_id INTEGER NOT NULL,
        PRIMARY KEY (trace_frame_annotation_id, trace_frame_id)
    )",
    "CREATE TABLE IF NOT EXISTS class_type_interval (
        class_name TEXT PRIMARY KEY,
        lower INTEGER NOT NULL,
        upper INTEGER NOT NULL,
        preserves_type_context INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS meta_run_issue_instance_index (
        meta_run_id INTEGER NOT NULL,
        issue_instance_id INTEGER NOT NULL,
        PRIMARY KEY (meta_run_id, issue_instance_id)
    )",
    // Out-of-scope collaborators (§1 Non-goals): the read-path UI owns these
    // tables end to end. Only their shapes are persisted here so the schema
    // is complete; this crate never writes to them.
    "CREATE TABLE IF NOT EXISTS warning_messages (
        code INTEGER PRIMARY KEY,
        message TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS filters (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        json TEXT NOT NULL
    )",
];

/// Create every table the persistence engine needs if it does not already
/// exist. Idempotent; safe to call at the start of every run.
pub fn ensure_schema(conn: &Connection) -> Result<(), DatabaseOperationalError> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }
    Ok(())
}
