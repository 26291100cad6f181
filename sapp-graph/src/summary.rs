//! Per-run summary emitted alongside the trace graph (§4.4.6).

use sapp_core::types::collections::{FxHashMap, FxHashSet};
use sapp_core::types::entities::{Run, TraceKind};
use sapp_parser::types::ParseCondition;

/// `Summary.trace_entries[K]` / `Summary.missing_traces[K]` / `Summary.big_tito`
/// / `Summary.run` (§4.4.6). Flows through the pipeline spine (§4.7) alongside
/// the graph each step produces.
#[derive(Debug, Clone)]
pub struct Summary {
    pub run: Run,
    /// Residual unprocessed conditions at end of run, by `(caller, caller_port)`.
    pub trace_entries: FxHashMap<TraceKind, FxHashMap<(String, String), Vec<ParseCondition>>>,
    /// `(callable, port)` pairs that were requested but not found.
    pub missing_traces: FxHashMap<TraceKind, FxHashSet<(String, String)>>,
    /// `(filename, callable, len)` triples whose TITO list was truncated.
    pub big_tito: FxHashSet<(String, String, usize)>,
    /// Extra feature names applied by the `AddFeatures` pipeline step
    /// (SPEC_FULL.md §4.7) before the model generator ran.
    pub extra_features: Vec<String>,
}

impl Summary {
    pub fn new(run: Run) -> Self {
        Self {
            run,
            trace_entries: FxHashMap::default(),
            missing_traces: FxHashMap::default(),
            big_tito: FxHashSet::default(),
            extra_features: Vec::new(),
        }
    }

    pub fn num_missing(&self, kind: TraceKind) -> usize {
        self.missing_traces.get(&kind).map(FxHashSet::len).unwrap_or(0)
    }
}
