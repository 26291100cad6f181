//! The "previously-seen" suppression filter (§4.3, S6).
//!
//! Grounded on `examples/original_source/sapp/pipeline/base_parser.py`'s
//! `_is_existing_issue`.

use sapp_core::hash::compute_diff_handle;
use sapp_core::types::collections::{FxHashMap, FxHashSet};

use crate::types::ParseStream;

/// Maps `filename -> (new_line -> [old_line, ...])`, used to re-derive a
/// diff handle for lines that moved between runs.
pub type LineMap = FxHashMap<String, FxHashMap<i64, Vec<i64>>>;

/// An incoming issue is suppressed if its new handle is already known, or
/// any diff handle derived from a remapped old line is known.
pub fn is_previously_seen(
    new_handle: &str,
    old_handles: &FxHashSet<String>,
    linemap: Option<&LineMap>,
    filename: &str,
    new_line: i64,
    code: i64,
) -> bool {
    if old_handles.contains(new_handle) {
        return true;
    }
    let Some(linemap) = linemap else {
        return false;
    };
    let Some(old_lines) = linemap.get(filename).and_then(|per_file| per_file.get(&new_line)) else {
        return false;
    };
    old_lines
        .iter()
        .any(|&old_line| old_handles.contains(&compute_diff_handle(filename, old_line, code)))
}

/// Drops every issue from `stream` that [`is_previously_seen`] against
/// `old_handles`/`linemap` (S6). Preconditions/postconditions are left
/// untouched — they are only ever reached transitively from a surviving
/// issue's synthetic root frame (§4.4.1), so an excluded issue's conditions
/// simply go unused.
pub fn filter_previously_seen(mut stream: ParseStream, old_handles: &FxHashSet<String>, linemap: Option<&LineMap>) -> ParseStream {
    if old_handles.is_empty() {
        return stream;
    }
    stream.issues.retain(|issue| {
        !is_previously_seen(&issue.handle, old_handles, linemap, &issue.filename, issue.line, issue.code)
    });
    stream
}
