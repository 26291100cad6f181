//! Plain-text encodings for the enum and compound columns every query
//! module needs, kept in one place so the wire format for each enum has a
//! single source of truth.

use sapp_core::types::entities::{
    IssueStatus, PurgeStatus, RunKind, RunStatus, SharedTextKind, SourceLocation,
    TraceFrameAnnotationKind, TraceFrameReachability, TraceKind,
};

pub fn run_status_to_str(v: RunStatus) -> &'static str {
    match v {
        RunStatus::Incomplete => "incomplete",
        RunStatus::Finished => "finished",
    }
}

pub fn run_status_from_str(s: &str) -> RunStatus {
    match s {
        "finished" => RunStatus::Finished,
        _ => RunStatus::Incomplete,
    }
}

pub fn run_kind_to_str(v: RunKind) -> &'static str {
    match v {
        RunKind::Pysa => "pysa",
        RunKind::MarianaTrench => "mariana_trench",
    }
}

pub fn run_kind_from_str(s: &str) -> RunKind {
    match s {
        "mariana_trench" => RunKind::MarianaTrench,
        _ => RunKind::Pysa,
    }
}

pub fn purge_status_to_str(v: PurgeStatus) -> &'static str {
    match v {
        PurgeStatus::Unpurged => "unpurged",
        PurgeStatus::Purged => "purged",
    }
}

pub fn purge_status_from_str(s: &str) -> PurgeStatus {
    match s {
        "purged" => PurgeStatus::Purged,
        _ => PurgeStatus::Unpurged,
    }
}

pub fn issue_status_to_str(v: IssueStatus) -> &'static str {
    match v {
        IssueStatus::Uncategorized => "uncategorized",
        IssueStatus::BadPractice => "bad_practice",
        IssueStatus::FalsePositive => "false_positive",
        IssueStatus::ValidBug => "valid_bug",
        IssueStatus::DoNotCare => "do_not_care",
    }
}

pub fn issue_status_from_str(s: &str) -> IssueStatus {
    match s {
        "bad_practice" => IssueStatus::BadPractice,
        "false_positive" => IssueStatus::FalsePositive,
        "valid_bug" => IssueStatus::ValidBug,
        "do_not_care" => IssueStatus::DoNotCare,
        _ => IssueStatus::Uncategorized,
    }
}

pub fn trace_kind_to_str(v: TraceKind) -> &'static str {
    match v {
        TraceKind::Precondition => "precondition",
        TraceKind::Postcondition => "postcondition",
    }
}

pub fn trace_kind_from_str(s: &str) -> TraceKind {
    match s {
        "postcondition" => TraceKind::Postcondition,
        _ => TraceKind::Precondition,
    }
}

pub fn reachability_to_str(v: TraceFrameReachability) -> &'static str {
    match v {
        TraceFrameReachability::Unreachable => "unreachable",
        TraceFrameReachability::Reachable => "reachable",
    }
}

pub fn reachability_from_str(s: &str) -> TraceFrameReachability {
    match s {
        "reachable" => TraceFrameReachability::Reachable,
        _ => TraceFrameReachability::Unreachable,
    }
}

pub fn annotation_kind_to_str(v: TraceFrameAnnotationKind) -> &'static str {
    match v {
        TraceFrameAnnotationKind::Feature => "feature",
    }
}

pub fn annotation_kind_from_str(_s: &str) -> TraceFrameAnnotationKind {
    TraceFrameAnnotationKind::Feature
}

pub fn shared_text_kind_to_str(v: SharedTextKind) -> &'static str {
    match v {
        SharedTextKind::Callable => "callable",
        SharedTextKind::Filename => "filename",
        SharedTextKind::Message => "message",
        SharedTextKind::Feature => "feature",
        SharedTextKind::Source => "source",
        SharedTextKind::SourceDetail => "source_detail",
        SharedTextKind::Sink => "sink",
        SharedTextKind::SinkDetail => "sink_detail",
    }
}

pub fn shared_text_kind_from_str(s: &str) -> SharedTextKind {
    match s {
        "filename" => SharedTextKind::Filename,
        "message" => SharedTextKind::Message,
        "feature" => SharedTextKind::Feature,
        "source" => SharedTextKind::Source,
        "source_detail" => SharedTextKind::SourceDetail,
        "sink" => SharedTextKind::Sink,
        "sink_detail" => SharedTextKind::SinkDetail,
        _ => SharedTextKind::Callable,
    }
}

/// `"line:begin:end"` entries joined with `;`. TITO lists are
/// write/read-back only; nothing queries into them, so a compact textual
/// form is enough.
pub fn encode_titos(titos: &[SourceLocation]) -> String {
    titos
        .iter()
        .map(|loc| format!("{}:{}:{}", loc.line, loc.begin_column, loc.end_column))
        .collect::<Vec<_>>()
        .join(";")
}

pub fn decode_titos(s: &str) -> Vec<SourceLocation> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(';')
        .filter_map(|entry| {
            let mut parts = entry.split(':');
            let line = parts.next()?.parse().ok()?;
            let begin_column = parts.next()?.parse().ok()?;
            let end_column = parts.next()?.parse().ok()?;
            Some(SourceLocation { line, begin_column, end_column })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titos_round_trip() {
        let titos = vec![
            SourceLocation { line: 1, begin_column: 2, end_column: 3 },
            SourceLocation { line: 4, begin_column: 5, end_column: 6 },
        ];
        assert_eq!(decode_titos(&encode_titos(&titos)), titos);
    }

    #[test]
    fn empty_titos_round_trip() {
        assert_eq!(decode_titos(&encode_titos(&[])), Vec::new());
    }
}
