//! Deterministic handle computation (§6.4).
//!
//! Every computed handle is truncated so the hex digest plus its separator
//! always fit within a 255-byte column: 16 hex chars + 1 for `:` = 17.

use xxhash_rust::xxh64::xxh64;

const HASH_SEED: u64 = 0;
const HEX_DIGEST_LEN: usize = 16;
const SUFFIX_LEN: usize = HEX_DIGEST_LEN + 1; // ":" + hex
const MAX_HANDLE_LEN: usize = 255;

/// `key[: 255 - 17] + ":" + lowercase_hex(xxhash64(key))`.
pub fn compute_handle_from_key(key: &str) -> String {
    let hex = format!("{:016x}", xxh64(key.as_bytes(), HASH_SEED));
    debug_assert_eq!(hex.len(), HEX_DIGEST_LEN);
    let prefix_budget = MAX_HANDLE_LEN - SUFFIX_LEN;
    let prefix = truncate_at_char_boundary(key, prefix_budget);
    format!("{prefix}:{hex}")
}

/// Truncates `s` to at most `max_bytes` bytes without splitting a UTF-8
/// character.
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `compute_handle_from_key(f"{callable}:{line}|{start}|{end}:{code}")`.
pub fn compute_master_handle(callable: &str, line: i64, start: i64, end: i64, code: i64) -> String {
    compute_handle_from_key(&format!("{callable}:{line}|{start}|{end}:{code}"))
}

/// `compute_handle_from_key(f"{filename}:{old_line}:{code}")`.
pub fn compute_diff_handle(filename: &str, old_line: i64, code: i64) -> String {
    compute_handle_from_key(&format!("{filename}:{old_line}:{code}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_always_seventeen_chars() {
        let handle = compute_master_handle("foo.bar", 1, 12, 13, 1);
        let (_, suffix) = handle.rsplit_once(':').expect("handle has a colon");
        assert_eq!(suffix.len(), HEX_DIGEST_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn deterministic_across_calls() {
        let a = compute_master_handle("foo.bar", 1, 12, 13, 1);
        let b = compute_master_handle("foo.bar", 1, 12, 13, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_inputs_produce_distinct_handles() {
        let a = compute_master_handle("foo.bar", 1, 12, 13, 1);
        let b = compute_master_handle("foo.bar", 2, 12, 13, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn long_key_is_truncated_to_255_bytes() {
        let long_callable = "x".repeat(400);
        let handle = compute_master_handle(&long_callable, 1, 1, 1, 1);
        assert_eq!(handle.len(), MAX_HANDLE_LEN);
    }

    #[test]
    fn diff_handle_matches_master_handle_formula_shape() {
        let handle = compute_diff_handle("foo.py", 9, 1);
        assert_eq!(handle.len(), "foo.py:9:1".len() + 1 + HEX_DIGEST_LEN);
    }
}
