//! Kind-name and port canonicalization shared by both parser variants
//! (§4.3 "Key algorithmic decisions").

use std::sync::OnceLock;

use regex::Regex;

fn argument_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"argument\((-?\d+)\)").expect("valid regex"))
}

/// CRTEX rewrites `argument(n)` to `formal(n)`.
pub fn to_crtex(port: &str) -> String {
    argument_pattern()
        .replace_all(port, "formal($1)")
        .into_owned()
}

/// Port canonicalization: lowercase root segment; `leaf -> leaf_kind`;
/// `return -> result`; `Anchor.X -> anchor:<crtex(X)>`;
/// `Producer.<id>.X -> producer:<id>:<crtex(X)>`.
pub fn canonicalize_port(raw: &str, leaf_kind: &str) -> String {
    let mut elements: Vec<String> = raw.split('.').map(str::to_string).collect();
    if elements.is_empty() {
        return String::new();
    }
    elements[0] = elements[0].to_lowercase();
    match elements[0].as_str() {
        "leaf" => leaf_kind.to_string(),
        "return" => "result".to_string(),
        "anchor" => {
            let remainder = elements[1..].join(".");
            let canonical = canonicalize_port(&remainder, "unreachable_leaf_kind_anchor");
            format!("anchor:{}", to_crtex(&canonical))
        }
        "producer" if elements.len() >= 3 => {
            let producer_id = elements[1].clone();
            let remainder = elements[2..].join(".");
            let canonical = canonicalize_port(&remainder, leaf_kind);
            format!("producer:{producer_id}:{}", to_crtex(&canonical))
        }
        _ => elements.join("."),
    }
}

/// `Partial:<name>:<label>`.
pub fn canonicalize_partial_kind(name: &str, label: &str) -> String {
    format!("Partial:{name}:{label}")
}

/// `<local>@<global>:<base>` — each transform component optional, base
/// required.
pub fn canonicalize_transform_kind(local: Option<&str>, global: Option<&str>, base: &str) -> String {
    match (local, global) {
        (Some(l), Some(g)) => format!("{l}@{g}:{base}"),
        (Some(l), None) => format!("{l}@:{base}"),
        (None, Some(g)) => format!("@{g}:{base}"),
        (None, None) => base.to_string(),
    }
}

/// Derive a source path from a callable name when the JSON position lacks
/// one: strip the leading `L`, everything from the first `;`, and any `$`
/// suffix.
pub fn derive_path_from_callable(callable_name: &str) -> String {
    let before_semicolon = callable_name.split(';').next().unwrap_or("");
    let before_dollar = before_semicolon.split('$').next().unwrap_or("");
    before_dollar.chars().skip(1).collect()
}

/// Zero-based JSON positions become one-based: `begin = raw_start + 1`;
/// `end = max(raw_end + 1, begin)`.
pub fn adjust_columns(raw_start: i64, raw_end: i64) -> (i64, i64) {
    let begin = raw_start + 1;
    let end = (raw_end + 1).max(begin);
    (begin, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crtex_rewrites_argument_to_formal() {
        assert_eq!(to_crtex("Argument(0)".to_lowercase().as_str()), "formal(0)".to_string());
        assert_eq!(to_crtex("argument(-1)"), "formal(-1)");
        assert_eq!(to_crtex("formal(0)"), "formal(0)");
    }

    #[test]
    fn anchor_port_is_normalized() {
        let result = canonicalize_port("Anchor.Argument(0)", "source");
        assert_eq!(result, "anchor:formal(0)");
    }

    #[test]
    fn producer_port_is_normalized() {
        let result = canonicalize_port("Producer.3.Argument(1)", "sink");
        assert_eq!(result, "producer:3:formal(1)");
    }

    #[test]
    fn leaf_port_uses_supplied_leaf_kind() {
        assert_eq!(canonicalize_port("Leaf", "source"), "source");
    }

    #[test]
    fn return_port_becomes_result() {
        assert_eq!(canonicalize_port("Return", "source"), "result");
    }

    #[test]
    fn path_is_derived_from_callable_name() {
        assert_eq!(derive_path_from_callable("Lcom/example/Foo;.bar:()V"), "com/example/Foo");
    }

    #[test]
    fn column_adjustment_is_monotone() {
        assert_eq!(adjust_columns(0, 0), (1, 1));
        assert_eq!(adjust_columns(5, 2), (6, 6));
    }
}
