//! Parser and analysis-output error taxonomy (§7).

use sapp_core::errors::ErrorCode;
use thiserror::Error;

/// Schema or version mismatch in analysis output. Fatal to the current
/// file; the pipeline surfaces the first one.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{message} (received: {received})")]
    SchemaViolation { message: String, received: String },
    #[error("unsupported file_version {version} (only version 3 is supported)")]
    UnsupportedFileVersion { version: i64 },
    #[error("unsupported analyzer tool {tool:?}")]
    UnsupportedTool { tool: String },
    #[error("unknown top-level record kind {kind:?}")]
    UnknownRecordKind { kind: String },
    #[error("malformed JSON on line {line}: {source}")]
    MalformedJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl ErrorCode for ParseError {
    fn error_code(&self) -> &'static str {
        match self {
            ParseError::SchemaViolation { .. } => "schema-violation",
            ParseError::UnsupportedFileVersion { .. } => "unsupported-file-version",
            ParseError::UnsupportedTool { .. } => "unsupported-tool",
            ParseError::UnknownRecordKind { .. } => "unknown-record-kind",
            ParseError::MalformedJson { .. } => "malformed-json",
        }
    }
}

/// Directory/file identifier unresolvable (§7).
#[derive(Debug, Error)]
pub enum AnalysisOutputError {
    #[error("{path} does not exist")]
    NotFound { path: String },
    #[error("no metadata.json found under {directory}")]
    MissingMetadata { directory: String },
    #[error("filename_glob {glob} matched no files under {directory}")]
    EmptyGlob { glob: String, directory: String },
    #[error("{path} is neither a file nor a directory")]
    UnresolvableKind { path: String },
    #[error("invalid glob pattern {pattern}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl ErrorCode for AnalysisOutputError {
    fn error_code(&self) -> &'static str {
        match self {
            AnalysisOutputError::NotFound { .. } => "analysis-output-not-found",
            AnalysisOutputError::MissingMetadata { .. } => "missing-metadata",
            AnalysisOutputError::EmptyGlob { .. } => "empty-glob",
            AnalysisOutputError::UnresolvableKind { .. } => "unresolvable-kind",
            AnalysisOutputError::InvalidGlob { .. } => "invalid-glob",
        }
    }
}
