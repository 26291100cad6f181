//! Pysa/Taint jsonlines variant (§6.2).
//!
//! `{"file_version":3,...}` header; each subsequent line is
//! `{"kind":"model"|"issue", "data":...}`. Only file version 3 is
//! supported.

use sapp_core::hash::compute_master_handle;
use sapp_core::types::entities::SourceLocation;
use serde_json::Value;
use smallvec::{smallvec, SmallVec};

use crate::analysis_output::Metadata;
use crate::canonicalize::adjust_columns;
use crate::errors::ParseError;
use crate::types::{LeafSighting, ParseCondition, ParseIssue, ParseStream, TraceFeature};

const SUPPORTED_FILE_VERSION: i64 = 3;

/// Parses a complete Pysa jsonlines document into a [`ParseStream`].
pub fn parse(contents: &str, metadata: &Metadata) -> Result<ParseStream, ParseError> {
    let mut lines = contents.lines().enumerate().filter(|(_, line)| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with("//")
    });

    let (header_no, header_line) = lines.next().ok_or_else(|| ParseError::SchemaViolation {
        message: "empty Pysa document".to_string(),
        received: String::new(),
    })?;
    let header: Value =
        serde_json::from_str(header_line).map_err(|source| ParseError::MalformedJson { line: header_no + 1, source })?;
    let version = header.get("file_version").and_then(Value::as_i64).unwrap_or(0);
    if version != SUPPORTED_FILE_VERSION {
        return Err(ParseError::UnsupportedFileVersion { version });
    }

    let mut stream = ParseStream::new();
    for (line_no, line) in lines {
        let record: Value = serde_json::from_str(line)
            .map_err(|source| ParseError::MalformedJson { line: line_no + 1, source })?;
        let kind = record.get("kind").and_then(Value::as_str).unwrap_or_default();
        let data = record.get("data").cloned().unwrap_or(Value::Null);
        match kind {
            "issue" => stream.issues.push(parse_issue(&data, metadata)?),
            "model" => merge_model(&mut stream, &data),
            other => {
                return Err(ParseError::UnknownRecordKind {
                    kind: other.to_string(),
                })
            }
        }
    }
    Ok(stream)
}

fn parse_issue(data: &Value, metadata: &Metadata) -> Result<ParseIssue, ParseError> {
    let code = data
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| schema_violation("issue missing code", data))?;
    let callable = data
        .get("callable")
        .and_then(Value::as_str)
        .ok_or_else(|| schema_violation("issue missing callable", data))?
        .to_string();
    let callable_line = data.get("callable_line").and_then(Value::as_i64).unwrap_or(0);
    let line = data.get("line").and_then(Value::as_i64).unwrap_or(0);
    let raw_start = data.get("start").and_then(Value::as_i64).unwrap_or(0);
    let raw_end = data.get("end").and_then(Value::as_i64).unwrap_or(0);
    let filename = data.get("filename").and_then(Value::as_str).unwrap_or_default().to_string();

    let handle = data
        .get("master_handle")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| compute_master_handle(&callable, line - callable_line, raw_start, raw_end, code));

    let message = data
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| metadata.rules.get(&code).and_then(|r| r.name.clone()))
        .unwrap_or_default();

    let features: Vec<String> = data
        .get("features")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let fix_info = data.get("fix_info").and_then(Value::as_str).map(str::to_string);

    let (begin_column, end_column) = adjust_columns(raw_start, raw_end);

    let mut initial_sources = rustc_hash::FxHashSet::default();
    let mut final_sinks = rustc_hash::FxHashSet::default();
    let mut preconditions = Vec::new();
    let mut postconditions = Vec::new();

    if let Some(traces) = data.get("traces").and_then(Value::as_array) {
        for trace in traces {
            let name = trace.get("name").and_then(Value::as_str).unwrap_or_default();
            let (bucket, leaf_kind, sightings) = match name {
                "forward" => (&mut postconditions, "source", &mut initial_sources),
                "backward" => (&mut preconditions, "sink", &mut final_sinks),
                _ => continue,
            };
            if let Some(roots) = trace.get("roots").and_then(Value::as_array) {
                for root in roots {
                    bucket.extend(parse_root(root, &callable, leaf_kind, &filename, Some(sightings)));
                }
            }
        }
    }

    Ok(ParseIssue {
        code,
        callable,
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
        fix_info,
    })
}

/// A model declares reusable pre/postconditions bucketed by
/// `(callable, caller_port)` for the graph builder to consume (§4.4).
fn merge_model(stream: &mut ParseStream, data: &Value) {
    let callable = match data.get("callable").and_then(Value::as_str) {
        Some(c) => c.to_string(),
        None => return,
    };
    let filename = data.get("filename").and_then(Value::as_str).unwrap_or_default().to_string();

    if let Some(sources) = data.get("sources").and_then(Value::as_array) {
        for root in sources {
            for condition in parse_root(root, &callable, "source", &filename, None) {
                let key = (condition.caller.clone(), condition.caller_port.clone());
                stream.postconditions.entry(key).or_default().push(condition);
            }
        }
    }
    if let Some(sinks) = data.get("sinks").and_then(Value::as_array) {
        for root in sinks {
            for condition in parse_root(root, &callable, "sink", &filename, None) {
                let key = (condition.caller.clone(), condition.caller_port.clone());
                stream.preconditions.entry(key).or_default().push(condition);
            }
        }
    }
}

/// One root entry is either an *origin* fragment (`"root"` holds a bare
/// location; leaves terminate the trace directly) or a *call* fragment
/// (`"call"` holds `{position, resolves_to, port}`; yields one
/// [`ParseCondition`] per resolved callee).
fn parse_root(
    root: &Value,
    callable: &str,
    leaf_kind: &str,
    default_filename: &str,
    mut sightings: Option<&mut rustc_hash::FxHashSet<LeafSighting>>,
) -> Vec<ParseCondition> {
    let caller_port = root
        .get("port")
        .and_then(Value::as_str)
        .map(|p| crate::canonicalize::canonicalize_port(p, leaf_kind))
        .unwrap_or_else(|| "root".to_string());
    let kinds = root.get("kinds").and_then(Value::as_array).cloned().unwrap_or_default();

    if let Some(call) = root.get("call") {
        let position = call.get("position");
        let location = position.and_then(parse_location).unwrap_or(SourceLocation {
            line: 0,
            begin_column: 0,
            end_column: 0,
        });
        let filename = position
            .and_then(|p| p.get("filename"))
            .and_then(Value::as_str)
            .unwrap_or(default_filename)
            .to_string();
        let port = call
            .get("port")
            .and_then(Value::as_str)
            .map(|p| crate::canonicalize::canonicalize_port(p, leaf_kind))
            .unwrap_or_default();
        let resolves_to = call.get("resolves_to").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut leaves: SmallVec<[(String, i64); 4]> = smallvec![];
        let mut features = Vec::new();
        for kind_obj in &kinds {
            let (kind, length, _names, kind_features) = parse_kind_entry(kind_obj, &mut sightings);
            leaves.push((kind, length));
            features.extend(kind_features);
        }

        resolves_to
            .iter()
            .filter_map(Value::as_str)
            .map(|callee| ParseCondition {
                caller: callable.to_string(),
                caller_port: caller_port.clone(),
                filename: filename.clone(),
                callee: callee.to_string(),
                callee_port: port.clone(),
                callee_location: location,
                titos: Vec::new(),
                leaves: leaves.clone(),
                type_interval: None,
                features: features.clone(),
                annotations: Vec::new(),
            })
            .collect()
    } else {
        let location = root.get("root").and_then(parse_location).unwrap_or(SourceLocation {
            line: 0,
            begin_column: 0,
            end_column: 0,
        });
        let filename = root
            .get("root")
            .and_then(|r| r.get("filename"))
            .and_then(Value::as_str)
            .unwrap_or(default_filename)
            .to_string();

        let mut conditions = Vec::new();
        for kind_obj in &kinds {
            let (kind, length, names, features) = parse_kind_entry(kind_obj, &mut sightings);
            for name in names {
                conditions.push(ParseCondition {
                    caller: callable.to_string(),
                    caller_port: caller_port.clone(),
                    filename: filename.clone(),
                    callee: name,
                    callee_port: leaf_kind.to_string(),
                    callee_location: location,
                    titos: Vec::new(),
                    leaves: smallvec![(kind.clone(), length)],
                    type_interval: None,
                    features: features.clone(),
                    annotations: Vec::new(),
                });
            }
        }
        conditions
    }
}

/// Returns `(kind, distance, leaf_names, features)` for one `kinds[]`
/// entry, recording `(name, kind, distance)` sightings into `sightings`
/// when present (issue-level `initial_sources`/`final_sinks`, §4.4.1.2).
fn parse_kind_entry(
    kind_obj: &Value,
    sightings: &mut Option<&mut rustc_hash::FxHashSet<LeafSighting>>,
) -> (String, i64, Vec<String>, Vec<TraceFeature>) {
    let kind = kind_obj.get("kind").and_then(Value::as_str).unwrap_or_default().to_string();
    let distance = kind_obj.get("length").and_then(Value::as_i64).unwrap_or(0);
    let names: Vec<String> = kind_obj
        .get("leaves")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|leaf| leaf.get("name").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    if let Some(set) = sightings.as_deref_mut() {
        for name in &names {
            set.insert(LeafSighting {
                name: name.clone(),
                kind: kind.clone(),
                distance,
            });
        }
    }
    let features = kind_obj
        .get("features")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(|s| TraceFeature(s.to_string()))).collect())
        .unwrap_or_default();
    (kind, distance, names, features)
}

fn parse_location(obj: &Value) -> Option<SourceLocation> {
    let line = obj.get("line")?.as_i64()?;
    let raw_start = obj.get("start").and_then(Value::as_i64).unwrap_or(0);
    let raw_end = obj.get("end").and_then(Value::as_i64).unwrap_or(0);
    let (begin_column, end_column) = adjust_columns(raw_start, raw_end);
    Some(SourceLocation {
        line,
        begin_column,
        end_column,
    })
}

fn schema_violation(message: &str, data: &Value) -> ParseError {
    ParseError::SchemaViolation {
        message: message.to_string(),
        received: data.to_string(),
    }
}
