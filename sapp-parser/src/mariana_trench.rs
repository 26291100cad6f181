//! Mariana-Trench v0.2 variant (§6.2).
//!
//! One JSON object per line, one method model each; non-method (e.g.
//! field) models are skipped. A model carries zero or more of `issues`,
//! `sinks`, `generations` (postconditions), `effect_sinks`, `propagation`.
//! `propagation` frames carry no SAPP-level trace information today and are
//! intentionally not modeled further.

use sapp_core::hash::compute_handle_from_key;
use sapp_core::types::collections::FxHashSet;
use sapp_core::types::entities::SourceLocation;
use serde_json::Value;
use smallvec::{smallvec, SmallVec};

use crate::analysis_output::Metadata;
use crate::canonicalize::{adjust_columns, canonicalize_port, derive_path_from_callable};
use crate::errors::ParseError;
use crate::types::{LeafSighting, ParseCondition, ParseIssue, ParseStream, TraceFeature};

const LAMBDA_MARKERS: [&str; 2] = ["$$Lambda$", "$$ExternalSyntheticLambda"];

/// Parses a complete Mariana-Trench jsonlines document into a
/// [`ParseStream`].
pub fn parse(contents: &str, metadata: &Metadata) -> Result<ParseStream, ParseError> {
    let mut stream = ParseStream::new();
    for (line_no, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let model: Value = serde_json::from_str(trimmed)
            .map_err(|source| ParseError::MalformedJson { line: line_no + 1, source })?;
        let Some(method) = model.get("method") else {
            // Non-method (e.g. field) models are skipped.
            continue;
        };
        let callable = method.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let callable_line = method.get("line").and_then(Value::as_i64).unwrap_or(0);

        if let Some(issues) = model.get("issues").and_then(Value::as_array) {
            for issue in issues {
                if let Some(parsed) = parse_issue(issue, &callable, callable_line, metadata) {
                    stream.issues.push(parsed);
                }
            }
        }
        for (array_key, leaf_kind, bucket_preconditions) in [
            ("sinks", "sink", true),
            ("effect_sinks", "sink", true),
            ("generations", "source", false),
        ] {
            let Some(frames) = model.get(array_key).and_then(Value::as_array) else {
                continue;
            };
            for frame in frames {
                let Some(condition) = parse_frame(frame, &callable, "result", leaf_kind, &callable) else {
                    continue;
                };
                let key = (condition.caller.clone(), condition.caller_port.clone());
                if bucket_preconditions {
                    stream.preconditions.entry(key).or_default().push(condition);
                } else {
                    stream.postconditions.entry(key).or_default().push(condition);
                }
            }
        }
        // `propagation` frames describe intra-method taint propagation, not
        // a caller/callee trace edge; no SAPP entity corresponds to them.
    }
    Ok(stream)
}

fn parse_issue(issue: &Value, callable: &str, callable_line: i64, metadata: &Metadata) -> Option<ParseIssue> {
    let code = issue.get("code")?.as_i64()?;
    let issue_line = issue.get("line").and_then(Value::as_i64).unwrap_or(-1);
    let callee_sig = issue.get("callee").and_then(Value::as_str).unwrap_or_default();
    let sink_index = issue.get("sink_index").and_then(Value::as_i64).unwrap_or(0);

    let stripped = strip_anonymous_class_numbers(callee_sig, callable_line, issue_line);
    let handle = compute_handle_from_key(&format!("{callable}:{stripped}:{sink_index}:{code}"));

    let message = issue
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| metadata.rules.get(&code).and_then(|r| r.description.clone().or_else(|| r.name.clone())))
        .unwrap_or_default();
    let filename = issue.get("filename").and_then(Value::as_str).unwrap_or_default().to_string();
    let (begin_column, end_column) = adjust_columns(
        issue.get("start").and_then(Value::as_i64).unwrap_or(0),
        issue.get("end").and_then(Value::as_i64).unwrap_or(0),
    );
    let line = issue.get("line").and_then(Value::as_i64).unwrap_or(0);

    let mut preconditions = Vec::new();
    let mut postconditions = Vec::new();
    let mut initial_sources = FxHashSet::default();
    let mut final_sinks = FxHashSet::default();

    if let Some(sinks) = issue.get("sinks").and_then(Value::as_array) {
        for frame in sinks {
            if let Some(condition) = parse_frame(frame, callable, "root", "sink", &filename) {
                record_sightings(&condition, &mut final_sinks);
                preconditions.push(condition);
            }
        }
    }
    if let Some(sources) = issue.get("sources").and_then(Value::as_array) {
        for frame in sources {
            if let Some(condition) = parse_frame(frame, callable, "root", "source", &filename) {
                record_sightings(&condition, &mut initial_sources);
                postconditions.push(condition);
            }
        }
    }

    let features = issue
        .get("features")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    Some(ParseIssue {
        code,
        callable: callable.to_string(),
        handle,
        message,
        filename,
        callable_line,
        line,
        begin_column,
        end_column,
        preconditions,
        postconditions,
        initial_sources,
        final_sinks,
        features,
        fix_info: None,
    })
}

fn record_sightings(condition: &ParseCondition, sightings: &mut FxHashSet<LeafSighting>) {
    for (kind, distance) in &condition.leaves {
        sightings.insert(LeafSighting {
            name: condition.callee.clone(),
            kind: kind.clone(),
            distance: *distance,
        });
    }
}

/// One call-info frame: `Origin` frames terminate directly at the leaf
/// (the callee is represented by the leaf-kind marker, mirroring the Pysa
/// origin-fragment handling); `CallSite`/`PropagationWithTrace` frames
/// resolve to another callable. `Declaration` and trace-less `Propagation`
/// frames are skipped.
fn parse_frame(
    frame: &Value,
    caller: &str,
    caller_port_key: &str,
    leaf_kind: &str,
    default_filename: &str,
) -> Option<ParseCondition> {
    let call_info = frame.get("call_info")?;
    let call_kind = call_info.get("call_kind").and_then(Value::as_str).unwrap_or("CallSite");
    if call_kind == "Declaration" || call_kind == "Propagation" {
        return None;
    }

    let position = call_info.get("position");
    let raw_port = call_info.get("port").and_then(Value::as_str).unwrap_or(leaf_kind);
    let callee_port = canonicalize_port(raw_port, leaf_kind);
    let is_leaf = sapp_core::types::entities::is_leaf_port(&callee_port);

    let callee = if call_kind == "Origin" {
        leaf_kind.to_string()
    } else {
        call_info.get("resolves_to").and_then(Value::as_str).unwrap_or_default().to_string()
    };

    let filename = resolve_filename(position, caller, is_leaf, default_filename);
    let location = position.map(parse_position).unwrap_or(SourceLocation {
        line: 0,
        begin_column: 0,
        end_column: 0,
    });

    let mut leaves: SmallVec<[(String, i64); 4]> = smallvec![];
    let mut features = Vec::new();
    if let Some(kinds) = frame.get("kinds").and_then(Value::as_array) {
        for kind_obj in kinds {
            let kind = kind_obj.get("kind").and_then(Value::as_str).unwrap_or_default().to_string();
            let distance = kind_obj.get("distance").and_then(Value::as_i64).unwrap_or(0);
            leaves.push((kind, distance));
            features.extend(parse_features(kind_obj));
        }
    }

    Some(ParseCondition {
        caller: caller.to_string(),
        caller_port: canonicalize_port(caller_port_key, leaf_kind),
        filename,
        callee,
        callee_port,
        callee_location: location,
        titos: Vec::new(),
        leaves,
        type_interval: None,
        features,
        annotations: Vec::new(),
    })
}

/// `Features.from_json`: `may_features ∪ {"always-"+f for f in
/// always_features}`.
fn parse_features(kind_obj: &Value) -> Vec<TraceFeature> {
    let mut out: Vec<TraceFeature> = kind_obj
        .get("features")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(|s| TraceFeature(s.to_string()))).collect())
        .unwrap_or_default();
    if let Some(always) = kind_obj.get("always_features").and_then(Value::as_array) {
        out.extend(always.iter().filter_map(|v| v.as_str().map(|s| TraceFeature(format!("always-{s}")))));
    }
    out
}

fn parse_position(position: &Value) -> SourceLocation {
    let line = position.get("line").and_then(Value::as_i64).unwrap_or(0);
    let raw_start = position.get("start").and_then(Value::as_i64).unwrap_or(0);
    let raw_end = position.get("end").and_then(Value::as_i64).unwrap_or(0);
    let (begin_column, end_column) = adjust_columns(raw_start, raw_end);
    SourceLocation {
        line,
        begin_column,
        end_column,
    }
}

/// `Position.from_json`: when `path == "unknown"` (or absent) and the call
/// is not a leaf, derive the path from the method signature instead.
fn resolve_filename(position: Option<&Value>, method_name: &str, is_leaf: bool, default_filename: &str) -> String {
    let path = position.and_then(|p| p.get("path")).and_then(Value::as_str);
    match path {
        Some(p) if p != "unknown" => p.to_string(),
        _ if !is_leaf => derive_path_from_callable(method_name),
        _ => default_filename.to_string(),
    }
}

/// Strips compiler-generated anonymous-class digit runs after `$`,
/// `$$Lambda$`, or `$$ExternalSyntheticLambda`, recording the relative
/// issue line when anything was actually stripped (§4.3; grounded on
/// `mariana_trench_parser_objects.py`'s `_strip_anonymous_class_numbers`).
pub fn strip_anonymous_class_numbers(callee_signature: &str, callable_line: i64, issue_line: i64) -> String {
    let Some(semi_idx) = callee_signature.find(';') else {
        return callee_signature.to_string();
    };
    let class_name = &callee_signature[..semi_idx];
    let rest = &callee_signature[semi_idx..];

    let Some(dollar_idx) = class_name.find('$') else {
        return callee_signature.to_string();
    };
    let prefix = &class_name[..=dollar_idx];
    let mut remainder = &class_name[dollar_idx..];
    for marker in LAMBDA_MARKERS {
        if let Some(stripped) = remainder.strip_prefix(marker) {
            remainder = stripped;
            break;
        }
    }
    let digits_len = remainder.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits_len == 0 {
        return callee_signature.to_string();
    }
    let after_digits = &remainder[digits_len..];
    let stripped_classname = format!("{prefix}{after_digits}");

    let relative_line = if issue_line > -1 && issue_line >= callable_line {
        issue_line - callable_line
    } else {
        -1
    };
    format!("{stripped_classname}#{relative_line}{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_anchor_port_normalization() {
        let frame = serde_json::json!({
            "call_info": {
                "call_kind": "CallSite",
                "resolves_to": "LFoo;.consume:(Ljava/lang/String;)V",
                "port": "Anchor.Argument(0)",
                "position": {"path": "Foo.java", "line": 10, "start": 0, "end": 5},
            },
            "kinds": [{"kind": "UserInput", "distance": 0}],
        });
        let condition = parse_frame(&frame, "LFoo;.entry:()V", "result", "sink", "Foo.java").unwrap();
        assert_eq!(condition.callee_port, "anchor:formal(0)");
    }

    #[test]
    fn anonymous_class_numbers_are_stripped() {
        let stripped = strip_anonymous_class_numbers(
            "LFoo$$Lambda$12;.run:()V",
            5,
            8,
        );
        assert_eq!(stripped, "LFoo$;.run:()V".replacen(';', "#3;", 1));
    }

    #[test]
    fn unchanged_signature_without_dollar_is_returned_as_is() {
        let sig = "LFoo;.run:()V";
        assert_eq!(strip_anonymous_class_numbers(sig, 1, 2), sig);
    }

    #[test]
    fn declaration_frames_are_skipped() {
        let frame = serde_json::json!({
            "call_info": {"call_kind": "Declaration"},
        });
        assert!(parse_frame(&frame, "caller", "result", "sink", "f.py").is_none());
    }

    #[test]
    fn non_method_models_are_skipped() {
        let doc = r#"{"field":{"name":"LFoo;.bar:I"}}"#;
        let stream = parse(doc, &Metadata::default()).expect("parses");
        assert!(stream.issues.is_empty());
    }
}
