//! Ingestion pipeline spine (§4.7): a fixed, typed list of steps where each
//! step is `Step<In, Out>: run(input, summary) -> (output, summary)`.
//!
//! Phase timing mirrors `drift_analysis::engine::pipeline::AnalysisPipeline`'s
//! `Instant`-based per-phase measurement, adapted to a typed [`StepTimings`]
//! struct since the steps here are heterogeneous in type rather than four
//! fixed array slots.

use std::time::{Duration, Instant};

use thiserror::Error;

use sapp_core::errors::ErrorCode;
use sapp_core::types::collections::FxHashSet;
use sapp_graph::{Summary, TraceGraph};
use sapp_parser::analysis_output::AnalysisOutput;
use sapp_parser::errors::ParseError;
use sapp_parser::previously_seen::{filter_previously_seen, LineMap};
use sapp_parser::types::ParseStream;
use sapp_storage::{BulkPersistenceEngine, DatabaseOperationalError, PersistError, RunSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Operational(#[from] DatabaseOperationalError),
}

impl ErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            PipelineError::Parse(e) => e.error_code(),
            PipelineError::Persist(e) => e.error_code(),
            PipelineError::Operational(e) => e.error_code(),
        }
    }
}

/// One stage of the ingestion spine. `Summary` threads through every step,
/// unchanged or augmented, per spec §4.7.
pub trait Step<In, Out> {
    fn run(&mut self, input: In, summary: Summary) -> Result<(Out, Summary), PipelineError>;
}

/// `AnalysisOutput -> ParseStream` (§4.3).
pub struct Parser;

impl Step<AnalysisOutput, ParseStream> for Parser {
    fn run(&mut self, input: AnalysisOutput, summary: Summary) -> Result<(ParseStream, Summary), PipelineError> {
        let stream = sapp_parser::parse_analysis_output(&input)?;
        Ok((stream, summary))
    }
}

/// Side effect only: ensures the schema exists. Does not create the `Run`
/// row — that happens inside [`BulkPersistenceEngine::save`] (§4.6).
pub struct CreateDatabase<'e> {
    pub engine: &'e BulkPersistenceEngine,
}

impl<'e> Step<ParseStream, ParseStream> for CreateDatabase<'e> {
    fn run(&mut self, input: ParseStream, summary: Summary) -> Result<(ParseStream, Summary), PipelineError> {
        self.engine.with_reader(|conn| sapp_storage::schema::ensure_schema(conn))?;
        Ok((input, summary))
    }
}

/// `ParseStream -> ParseStream`: drops issues already seen in a prior run
/// (§4.3 "previously-seen filter", S6). A no-op when `old_handles` is empty.
pub struct PreviouslySeenFilter<'p> {
    pub old_handles: &'p FxHashSet<String>,
    pub linemap: Option<&'p LineMap>,
}

impl<'p> Step<ParseStream, ParseStream> for PreviouslySeenFilter<'p> {
    fn run(&mut self, input: ParseStream, summary: Summary) -> Result<(ParseStream, Summary), PipelineError> {
        Ok((filter_previously_seen(input, self.old_handles, self.linemap), summary))
    }
}

/// Decorates every parsed issue with caller-supplied extra feature names
/// (SPEC_FULL.md §4.7) before the model generator consumes the stream.
pub struct AddFeatures<'f> {
    pub extra_features: &'f [String],
}

impl<'f> Step<ParseStream, ParseStream> for AddFeatures<'f> {
    fn run(&mut self, mut input: ParseStream, mut summary: Summary) -> Result<(ParseStream, Summary), PipelineError> {
        if !self.extra_features.is_empty() {
            for issue in &mut input.issues {
                for feature in self.extra_features {
                    if !issue.features.iter().any(|f| f == feature) {
                        issue.features.push(feature.clone());
                    }
                }
            }
            summary.extra_features = self.extra_features.to_vec();
        }
        Ok((input, summary))
    }
}

/// `ParseStream -> TraceGraph` (§4.4). `summary.run` carries the `Run` the
/// generated graph is attached to; `extra_features` recorded by
/// [`AddFeatures`] survives the model generator's own fresh `Summary`.
pub struct ModelGeneratorStep;

impl Step<ParseStream, TraceGraph> for ModelGeneratorStep {
    fn run(&mut self, input: ParseStream, summary: Summary) -> Result<(TraceGraph, Summary), PipelineError> {
        let run = summary.run.clone();
        let extra_features = summary.extra_features.clone();
        let (graph, mut next) = sapp_graph::ModelGenerator::generate(run, input);
        next.extra_features = extra_features;
        Ok((graph, next))
    }
}

/// Drops frames not reachable from any issue instance (§4.4.6).
pub struct TrimTraceGraphStep;

impl Step<TraceGraph, TraceGraph> for TrimTraceGraphStep {
    fn run(&mut self, input: TraceGraph, summary: Summary) -> Result<(TraceGraph, Summary), PipelineError> {
        Ok((sapp_graph::trim_trace_graph(input), summary))
    }
}

/// `TraceGraph -> RunSummary` (§4.6).
pub struct DatabaseSaver<'e> {
    pub engine: &'e mut BulkPersistenceEngine,
    pub finished_time: i64,
}

impl<'e> Step<TraceGraph, RunSummary> for DatabaseSaver<'e> {
    fn run(&mut self, input: TraceGraph, summary: Summary) -> Result<(RunSummary, Summary), PipelineError> {
        let run_summary = self.engine.save(input, self.finished_time)?;
        Ok((run_summary, summary))
    }
}

/// Per-step wall-clock timing for one [`IngestionPipeline::run`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepTimings {
    pub parser: Duration,
    pub create_database: Duration,
    pub add_features: Duration,
    pub model_generator: Duration,
    pub trim_trace_graph: Duration,
    pub database_saver: Duration,
}

impl StepTimings {
    pub fn total(&self) -> Duration {
        self.parser + self.create_database + self.add_features + self.model_generator + self.trim_trace_graph + self.database_saver
    }
}

/// Composes the six ingestion steps statically (spec §9: "prefer static
/// composition over runtime dispatch since the spine is fixed at
/// construction time"). Owns the persistence engine for the lifetime of
/// the run; [`CreateDatabase`] and [`DatabaseSaver`] each borrow it only
/// for the duration of their own step.
pub struct IngestionPipeline {
    engine: BulkPersistenceEngine,
    extra_features: Vec<String>,
    previously_seen_handles: FxHashSet<String>,
    linemap: Option<LineMap>,
}

impl IngestionPipeline {
    pub fn new(engine: BulkPersistenceEngine, extra_features: Vec<String>) -> Self {
        Self {
            engine,
            extra_features,
            previously_seen_handles: FxHashSet::default(),
            linemap: None,
        }
    }

    /// Configures the §4.3/S6 previously-seen suppression filter: issues
    /// whose handle (or a linemap-derived diff handle) is in `old_handles`
    /// are dropped from the stream before the model generator sees it.
    pub fn with_previously_seen(mut self, old_handles: FxHashSet<String>, linemap: Option<LineMap>) -> Self {
        self.previously_seen_handles = old_handles;
        self.linemap = linemap;
        self
    }

    pub fn engine(&self) -> &BulkPersistenceEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut BulkPersistenceEngine {
        &mut self.engine
    }

    /// Runs the full spine against one [`AnalysisOutput`], producing the
    /// persisted [`RunSummary`], the final [`Summary`], and per-step timing.
    pub fn run(
        &mut self,
        output: AnalysisOutput,
        run: sapp_core::types::entities::Run,
        finished_time: i64,
    ) -> Result<(RunSummary, Summary, StepTimings), PipelineError> {
        let mut timings = StepTimings::default();
        let summary = Summary::new(run);

        let t = Instant::now();
        let (stream, summary) = Parser.run(output, summary)?;
        timings.parser = t.elapsed();

        let (stream, summary) = PreviouslySeenFilter {
            old_handles: &self.previously_seen_handles,
            linemap: self.linemap.as_ref(),
        }
        .run(stream, summary)?;

        let t = Instant::now();
        let (stream, summary) = CreateDatabase { engine: &self.engine }.run(stream, summary)?;
        timings.create_database = t.elapsed();

        let t = Instant::now();
        let (stream, summary) = AddFeatures { extra_features: &self.extra_features }.run(stream, summary)?;
        timings.add_features = t.elapsed();

        let t = Instant::now();
        let (graph, summary) = ModelGeneratorStep.run(stream, summary)?;
        timings.model_generator = t.elapsed();

        let t = Instant::now();
        let (graph, summary) = TrimTraceGraphStep.run(graph, summary)?;
        timings.trim_trace_graph = t.elapsed();

        let t = Instant::now();
        let (run_summary, summary) = DatabaseSaver { engine: &mut self.engine, finished_time }.run(graph, summary)?;
        timings.database_saver = t.elapsed();

        tracing::info!(
            run_id = run_summary.run_id,
            total_us = timings.total().as_micros() as u64,
            "ingestion pipeline finished"
        );

        Ok((run_summary, summary, timings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapp_core::types::entities::{Run, RunKind};
    use sapp_parser::analysis_output::Metadata;

    fn write_shard(dir: &std::path::Path, name: &str, contents: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path.display().to_string()
    }

    /// S1-equivalent: one minimal Pysa shard runs end to end through all six
    /// steps and lands in the database with the run finalized.
    #[test]
    fn full_spine_persists_a_minimal_pysa_issue() {
        let dir = tempfile::tempdir().unwrap();
        let shard = write_shard(
            &dir,
            "issues@0.json",
            "{\"file_version\":3}\n{\"kind\":\"issue\",\"data\":{\"code\":6001,\"callable\":\"a.foo\",\"callable_line\":1,\"line\":2,\"start\":1,\"end\":5,\"filename\":\"a.py\",\"message\":\"m\",\"features\":[]}}\n",
        );
        let output = AnalysisOutput::from_file_handle_named("issues.json", Metadata::default(), vec![shard]);

        let engine = BulkPersistenceEngine::open_in_memory().unwrap();
        let mut pipeline = IngestionPipeline::new(engine, vec!["extra:added".to_string()]);
        let run = Run::new(RunKind::Pysa, 1_700_000_000);

        let (run_summary, summary, timings) = pipeline.run(output, run, 1_700_000_100).unwrap();

        assert_eq!(*run_summary.inserted_counts.get("runs").unwrap(), 1);
        assert_eq!(*run_summary.inserted_counts.get("issues").unwrap(), 1);
        assert_eq!(summary.extra_features, vec!["extra:added".to_string()]);
        assert!(timings.total() >= Duration::from_nanos(0));
    }

    /// S6: an issue whose handle is already in the previously-seen set is
    /// suppressed before the model generator runs, so nothing is persisted.
    #[test]
    fn previously_seen_issue_is_excluded_before_the_model_generator() {
        let dir = tempfile::tempdir().unwrap();
        let shard = write_shard(
            &dir,
            "issues@0.json",
            "{\"file_version\":3}\n{\"kind\":\"issue\",\"data\":{\"code\":6001,\"callable\":\"a.foo\",\"callable_line\":1,\"line\":2,\"start\":1,\"end\":5,\"filename\":\"a.py\",\"message\":\"m\",\"features\":[]}}\n",
        );
        let output = AnalysisOutput::from_file_handle_named("issues.json", Metadata::default(), vec![shard]);
        let handle = sapp_core::hash::compute_master_handle("a.foo", 2 - 1, 1, 5, 6001);

        let engine = BulkPersistenceEngine::open_in_memory().unwrap();
        let mut old_handles = FxHashSet::default();
        old_handles.insert(handle);
        let mut pipeline = IngestionPipeline::new(engine, Vec::new()).with_previously_seen(old_handles, None);
        let run = Run::new(RunKind::Pysa, 1_700_000_000);

        let (run_summary, _summary, _timings) = pipeline.run(output, run, 1_700_000_100).unwrap();

        assert_eq!(*run_summary.inserted_counts.get("runs").unwrap(), 1);
        assert!(run_summary.inserted_counts.get("issues").copied().unwrap_or(0) == 0);
    }

    #[test]
    fn add_features_step_is_idempotent_for_already_present_features() {
        let mut issue = sapp_parser::types::ParseIssue {
            code: 1,
            callable: "a.foo".to_string(),
            handle: "h".to_string(),
            message: String::new(),
            filename: "a.py".to_string(),
            callable_line: 1,
            line: 2,
            begin_column: 0,
            end_column: 0,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            initial_sources: Default::default(),
            final_sinks: Default::default(),
            features: vec!["already:there".to_string()],
            fix_info: None,
        };
        let extra = vec!["already:there".to_string(), "new:one".to_string()];
        let mut stream = ParseStream::new();
        stream.issues.push(issue.clone());
        let run = Run::new(RunKind::Pysa, 1);
        let summary = Summary::new(run);

        let (stream, summary) = AddFeatures { extra_features: &extra }.run(stream, summary).unwrap();
        issue.features = stream.issues[0].features.clone();
        assert_eq!(issue.features, vec!["already:there".to_string(), "new:one".to_string()]);
        assert_eq!(summary.extra_features, extra);
    }
}
