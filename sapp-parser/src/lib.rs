//! Parser Front-End (§4.3): reads an [`analysis_output::AnalysisOutput`]
//! and produces a tool-independent [`types::ParseStream`].
//!
//! Variant selection mirrors `drift_analysis::parsers::manager::ParserManager`:
//! one dispatch point keyed by the declared tool, rather than a trait object
//! per call site. Shard reads fan out over a `rayon` worker pool (§5) with no
//! shared mutable state between workers — each one parses its file
//! independently and hands back an owned [`types::ParseStream`] for the
//! caller to merge.

pub mod analysis_output;
pub mod canonicalize;
pub mod errors;
pub mod mariana_trench;
pub mod previously_seen;
pub mod pysa;
pub mod types;

use std::fs;

use rayon::prelude::*;

use analysis_output::{AnalysisOutput, Metadata};
use errors::ParseError;
use types::ParseStream;

/// The set of analyzer tools this front-end understands (§4.3). Chosen by
/// `Metadata.tool`; anything else is `ParseError::UnsupportedTool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserVariant {
    Pysa,
    MarianaTrench,
}

impl ParserVariant {
    /// `ParserManager::parser_for`-equivalent: resolves the declared tool
    /// name to a concrete variant. `None`/missing `tool` defaults to Pysa,
    /// matching the upstream parser's historical default.
    pub fn parser_for(tool: Option<&str>) -> Result<Self, ParseError> {
        match tool {
            None | Some("pysa") => Ok(ParserVariant::Pysa),
            Some("mariana_trench") => Ok(ParserVariant::MarianaTrench),
            Some(other) => Err(ParseError::UnsupportedTool { tool: other.to_string() }),
        }
    }

    pub fn parse(&self, contents: &str, metadata: &Metadata) -> Result<ParseStream, ParseError> {
        match self {
            ParserVariant::Pysa => pysa::parse(contents, metadata),
            ParserVariant::MarianaTrench => mariana_trench::parse(contents, metadata),
        }
    }
}

/// Reads and parses every shard of `output`, merging the results into one
/// [`ParseStream`] (§4.3, §5). Shards are read and parsed concurrently; the
/// merge itself runs on the calling thread since `ParseStream::merge` is not
/// commutative-safe to run without ownership of the accumulator.
pub fn parse_analysis_output(output: &AnalysisOutput) -> Result<ParseStream, ParseError> {
    let variant = ParserVariant::parser_for(output.metadata.tool.as_deref())?;
    let file_names = output.file_names().map_err(|source| ParseError::SchemaViolation {
        message: format!("failed to resolve analysis output file names: {source}"),
        received: output.filename_specs.join(","),
    })?;

    tracing::info!(shard_count = file_names.len(), tool = ?output.metadata.tool, "parsing analysis output");

    let shard_results: Vec<Result<ParseStream, ParseError>> = file_names
        .par_iter()
        .map(|path| parse_shard(path, variant, &output.metadata))
        .collect();

    let mut stream = ParseStream::new();
    for result in shard_results {
        stream.merge(result?);
    }
    Ok(stream)
}

fn parse_shard(path: &str, variant: ParserVariant, metadata: &Metadata) -> Result<ParseStream, ParseError> {
    let contents = fs::read_to_string(path).map_err(|source| ParseError::SchemaViolation {
        message: format!("failed to read {path}: {source}"),
        received: path.to_string(),
    })?;
    variant.parse(&contents, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_defaults_to_pysa() {
        assert_eq!(ParserVariant::parser_for(None).unwrap(), ParserVariant::Pysa);
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let err = ParserVariant::parser_for(Some("semgrep")).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedTool { .. }));
    }

    /// Two shards on disk are read and parsed independently and merged into
    /// one stream, exercising the §5 shard worker pool end to end.
    #[test]
    fn parse_analysis_output_merges_multiple_shards() {
        let dir = tempfile::tempdir().unwrap();
        let shard_a = dir.path().join("issues@0.json");
        let shard_b = dir.path().join("issues@1.json");
        let issue_a = r#"{"file_version":3}
{"kind":"issue","data":{"code":6001,"callable":"a.foo","line":5,"start":1,"end":10,"message":"leak a","callable_line":1,"filename":"a.py","traces":[],"features":[]}}"#;
        let issue_b = r#"{"file_version":3}
{"kind":"issue","data":{"code":6001,"callable":"b.bar","line":6,"start":1,"end":10,"message":"leak b","callable_line":1,"filename":"b.py","traces":[],"features":[]}}"#;
        std::fs::write(&shard_a, issue_a).unwrap();
        std::fs::write(&shard_b, issue_b).unwrap();

        let output = AnalysisOutput::from_file_handle_named(
            "issues.json",
            Metadata::default(),
            vec![shard_a.display().to_string(), shard_b.display().to_string()],
        );
        let stream = parse_analysis_output(&output).unwrap();
        assert_eq!(stream.issues.len(), 2);
    }

    #[test]
    fn parse_analysis_output_surfaces_unsupported_tool() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("issues.json");
        std::fs::write(&file, "{}\n").unwrap();
        let metadata = Metadata { tool: Some("semgrep".to_string()), ..Metadata::default() };
        let output = AnalysisOutput::from_file_handle_named("issues.json", metadata, vec![file.display().to_string()]);
        let err = parse_analysis_output(&output).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedTool { .. }));
    }
}
