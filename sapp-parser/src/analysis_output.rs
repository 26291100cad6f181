//! Resolution of an *Analysis Output* — a directory of sharded JSON files,
//! a single file, or (for tests) a named in-memory handle — into metadata
//! plus the concrete filename specs to read (§6.1).
//!
//! Grounded on `examples/original_source/sapp/analysis_output.py`.

use std::fs;
use std::path::{Path, PathBuf};

use sapp_core::types::collections::{FxHashMap, FxHashSet};

use crate::errors::AnalysisOutputError;

const METADATA_GLOB: &str = "*metadata.json";

/// A recognized analyzer rule (`rules` metadata key, §6.1).
#[derive(Debug, Clone, Default)]
pub struct Rule {
    pub code: i64,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A single entry of the `partial_flows` metadata key: marks a partial
/// flow's frames with an extra feature when present at ingestion time.
/// This is a supplemental feature beyond the distilled spec's described
/// scope (see DESIGN.md); only the metadata shape is modeled here, not the
/// downstream marking behavior.
#[derive(Debug, Clone)]
pub struct PartialFlowToMark {
    pub kind: String,
    pub feature: String,
}

/// The merged metadata describing one analysis run (§6.1 recognized keys).
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub version: Option<String>,
    pub tool: Option<String>,
    pub commit: Option<String>,
    pub repo_roots: FxHashSet<String>,
    pub job_instance: Option<String>,
    pub repository_name: Option<String>,
    pub project: Option<String>,
    pub rules: FxHashMap<i64, Rule>,
    pub class_type_intervals_filenames: Vec<String>,
    pub category_coverage: Vec<serde_json::Value>,
    pub partial_flows_to_mark: Vec<PartialFlowToMark>,
    pub filename_spec: Option<String>,
    pub filename_glob: Option<String>,
    pub filenames: Vec<String>,
}

impl Metadata {
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut metadata = Metadata::default();
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => return metadata,
        };
        metadata.version = obj.get("version").and_then(|v| v.as_str()).map(str::to_string);
        metadata.tool = obj.get("tool").and_then(|v| v.as_str()).map(str::to_string);
        metadata.commit = obj.get("commit").and_then(|v| v.as_str()).map(str::to_string);
        if let Some(root) = obj
            .get("repo_root")
            .or_else(|| obj.get("root"))
            .and_then(|v| v.as_str())
        {
            metadata.repo_roots.insert(root.to_string());
        }
        metadata.job_instance = obj.get("job_instance").and_then(|v| v.as_str()).map(str::to_string);
        metadata.repository_name = obj
            .get("repository_name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        metadata.project = obj.get("project").and_then(|v| v.as_str()).map(str::to_string);
        if let Some(rules) = obj.get("rules").and_then(|v| v.as_array()) {
            for rule in rules {
                if let Some(code) = rule.get("code").and_then(|v| v.as_i64()) {
                    metadata.rules.insert(
                        code,
                        Rule {
                            code,
                            name: rule.get("name").and_then(|v| v.as_str()).map(str::to_string),
                            description: rule
                                .get("description")
                                .and_then(|v| v.as_str())
                                .map(str::to_string),
                        },
                    );
                }
            }
        }
        if let Some(filename) = obj
            .get("class_type_intervals_filename")
            .and_then(|v| v.as_str())
        {
            metadata.class_type_intervals_filenames.push(filename.to_string());
        }
        if let Some(coverage) = obj.get("category_coverage").and_then(|v| v.as_array()) {
            metadata.category_coverage = coverage.clone();
        }
        if let Some(flows) = obj.get("partial_flows").and_then(|v| v.as_array()) {
            metadata.partial_flows_to_mark = flows
                .iter()
                .filter_map(|f| {
                    Some(PartialFlowToMark {
                        kind: f.get("kind")?.as_str()?.to_string(),
                        feature: f.get("feature")?.as_str()?.to_string(),
                    })
                })
                .collect();
        }
        metadata.filename_spec = obj.get("filename_spec").and_then(|v| v.as_str()).map(str::to_string);
        metadata.filename_glob = obj.get("filename_glob").and_then(|v| v.as_str()).map(str::to_string);
        if let Some(names) = obj.get("filenames").and_then(|v| v.as_array()) {
            metadata.filenames = names
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
        }
        metadata
    }

    /// Shallow merge, used when multiple `*metadata.json` files are
    /// combined (`from_directories`): union repo_roots, first-non-null
    /// wins for scalars, dict-merge rules, list-concat the list fields.
    pub fn merge(&mut self, other: Metadata) {
        self.version = self.version.take().or(other.version);
        self.tool = self.tool.take().or(other.tool);
        self.commit = self.commit.take().or(other.commit);
        self.repo_roots.extend(other.repo_roots);
        self.job_instance = self.job_instance.take().or(other.job_instance);
        self.repository_name = self.repository_name.take().or(other.repository_name);
        self.project = self.project.take().or(other.project);
        for (code, rule) in other.rules {
            self.rules.entry(code).or_insert(rule);
        }
        self.class_type_intervals_filenames
            .extend(other.class_type_intervals_filenames);
        self.category_coverage.extend(other.category_coverage);
        self.partial_flows_to_mark.extend(other.partial_flows_to_mark);
        self.filename_spec = self.filename_spec.take().or(other.filename_spec);
        self.filename_glob = self.filename_glob.take().or(other.filename_glob);
        if self.filenames.is_empty() {
            self.filenames = other.filenames;
        }
    }
}

/// A resolved analysis output: the metadata plus the concrete filename
/// specs to read.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub metadata: Metadata,
    pub directory: Option<PathBuf>,
    pub filename_specs: Vec<String>,
}

impl AnalysisOutput {
    /// Dispatches on whether `spec` names a directory, a file, or a sharded
    /// file pattern (`"@" in basename` with an existing parent directory).
    pub fn from_str(spec: &str) -> Result<Self, AnalysisOutputError> {
        let path = Path::new(spec);
        if path.is_dir() {
            return Self::from_directory(path);
        }
        if path.is_file() {
            return Self::from_file(path);
        }
        let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let parent_exists = path.parent().map(|p| p.is_dir()).unwrap_or(false);
        if basename.contains('@') && parent_exists {
            return Self::from_file(path);
        }
        Err(AnalysisOutputError::NotFound { path: spec.to_string() })
    }

    /// Reads every `*metadata.json` under `directory` (merged shallowly)
    /// and resolves filenames with precedence `filename_spec` >
    /// `filename_glob` > legacy `filenames[0]`.
    pub fn from_directory(directory: &Path) -> Result<Self, AnalysisOutputError> {
        let metadata = read_merged_metadata(directory)?;
        let filename_specs = resolve_filename_specs(directory, &metadata)?;
        Ok(Self {
            metadata,
            directory: Some(directory.to_path_buf()),
            filename_specs,
        })
    }

    /// Merges metadata across multiple directories; only `filename_spec` is
    /// supported in this mode (matching the original's restriction).
    pub fn from_directories(directories: &[PathBuf]) -> Result<Self, AnalysisOutputError> {
        let mut merged = Metadata::default();
        for directory in directories {
            merged.merge(read_merged_metadata(directory)?);
        }
        let spec = merged.filename_spec.clone().ok_or_else(|| {
            AnalysisOutputError::MissingMetadata {
                directory: directories
                    .first()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            }
        })?;
        Ok(Self {
            metadata: merged,
            directory: directories.first().cloned(),
            filename_specs: vec![spec],
        })
    }

    /// A single file, directly (single-shard); no metadata.
    pub fn from_file(file: &Path) -> Result<Self, AnalysisOutputError> {
        if !file.is_file() {
            return Err(AnalysisOutputError::NotFound {
                path: file.display().to_string(),
            });
        }
        Ok(Self {
            metadata: Metadata::default(),
            directory: file.parent().map(|p| p.to_path_buf()),
            filename_specs: vec![file.display().to_string()],
        })
    }

    /// A named in-memory handle, used for testing. Resolves the Open
    /// Question in spec §9: when the caller supplies a named handle and no
    /// explicit specs, default `filename_specs` to `[name]` — deliberately,
    /// not as the original's dead `is []` check.
    pub fn from_file_handle_named(name: &str, metadata: Metadata, filename_specs: Vec<String>) -> Self {
        let filename_specs = if filename_specs.is_empty() {
            vec![name.to_string()]
        } else {
            filename_specs
        };
        Self {
            metadata,
            directory: None,
            filename_specs,
        }
    }

    fn is_sharded(spec: &str) -> bool {
        spec.contains('@')
    }

    /// Every concrete file name this output covers, expanding sharded
    /// specs.
    pub fn file_names(&self) -> Result<Vec<String>, AnalysisOutputError> {
        let mut names = Vec::new();
        for spec in &self.filename_specs {
            if Self::is_sharded(spec) {
                names.extend(expand_sharded_spec(spec));
            } else {
                names.push(remap_filename(spec, self.directory.as_deref()));
            }
        }
        Ok(names)
    }
}

/// Rebases an absolute path recorded in a metadata JSON onto the bundle
/// directory by basename, matching `_get_remapped_filename`.
fn remap_filename(filename: &str, bundle_directory: Option<&Path>) -> String {
    match bundle_directory {
        Some(dir) => {
            let basename = Path::new(filename)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| filename.to_string());
            dir.join(basename).display().to_string()
        }
        None => filename.to_string(),
    }
}

/// Expands a sharded spec (`name@shard_count`-style pattern) into its
/// member filenames. The concrete sharding scheme (`ShardedFile` in the
/// original) is an external collaborator; here every shard sibling present
/// on disk next to the spec's directory is returned.
fn expand_sharded_spec(spec: &str) -> Vec<String> {
    let path = Path::new(spec);
    let (prefix, _) = spec.split_once('@').unwrap_or((spec, ""));
    let prefix_name = Path::new(prefix)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut shards: Vec<String> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with(&prefix_name) {
                Some(entry.path().display().to_string())
            } else {
                None
            }
        })
        .collect();
    shards.sort();
    shards
}

fn read_merged_metadata(directory: &Path) -> Result<Metadata, AnalysisOutputError> {
    let pattern = directory.join(METADATA_GLOB);
    let pattern_str = pattern.to_string_lossy().into_owned();
    let mut merged = Metadata::default();
    let mut found = false;
    for entry in glob::glob(&pattern_str)
        .map_err(|source| AnalysisOutputError::InvalidGlob {
            pattern: pattern_str.clone(),
            source,
        })?
        .flatten()
    {
        if let Ok(contents) = fs::read_to_string(&entry) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&contents) {
                merged.merge(Metadata::from_json(&value));
                found = true;
            }
        }
    }
    if !found {
        return Err(AnalysisOutputError::MissingMetadata {
            directory: directory.display().to_string(),
        });
    }
    Ok(merged)
}

fn resolve_filename_specs(directory: &Path, metadata: &Metadata) -> Result<Vec<String>, AnalysisOutputError> {
    if let Some(spec) = &metadata.filename_spec {
        return Ok(vec![spec.clone()]);
    }
    if let Some(pattern) = &metadata.filename_glob {
        let full_pattern = directory.join(pattern);
        let pattern_str = full_pattern.to_string_lossy().into_owned();
        let matches: Vec<String> = glob::glob(&pattern_str)
            .map_err(|source| AnalysisOutputError::InvalidGlob {
                pattern: pattern_str.clone(),
                source,
            })?
            .flatten()
            .map(|p| p.display().to_string())
            .collect();
        if matches.is_empty() {
            return Err(AnalysisOutputError::EmptyGlob {
                glob: pattern.clone(),
                directory: directory.display().to_string(),
            });
        }
        return Ok(matches);
    }
    if let Some(first) = metadata.filenames.first() {
        let basename = Path::new(first)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| first.clone());
        return Ok(vec![directory.join(basename).display().to_string()]);
    }
    Err(AnalysisOutputError::MissingMetadata {
        directory: directory.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_handle_named_defaults_specs_to_name() {
        let output = AnalysisOutput::from_file_handle_named("issues.json", Metadata::default(), vec![]);
        assert_eq!(output.filename_specs, vec!["issues.json".to_string()]);
    }

    #[test]
    fn file_handle_named_keeps_explicit_specs() {
        let output = AnalysisOutput::from_file_handle_named(
            "issues.json",
            Metadata::default(),
            vec!["explicit.json".to_string()],
        );
        assert_eq!(output.filename_specs, vec!["explicit.json".to_string()]);
    }

    #[test]
    fn metadata_merge_prefers_first_non_null_scalar() {
        let mut a = Metadata {
            tool: Some("pysa".to_string()),
            ..Metadata::default()
        };
        let b = Metadata {
            tool: Some("mariana_trench".to_string()),
            commit: Some("abc123".to_string()),
            ..Metadata::default()
        };
        a.merge(b);
        assert_eq!(a.tool.as_deref(), Some("pysa"));
        assert_eq!(a.commit.as_deref(), Some("abc123"));
    }

    #[test]
    fn metadata_merge_unions_repo_roots() {
        let mut a = Metadata::default();
        a.repo_roots.insert("/repo/a".to_string());
        let mut b = Metadata::default();
        b.repo_roots.insert("/repo/b".to_string());
        a.merge(b);
        assert_eq!(a.repo_roots.len(), 2);
    }

    #[test]
    fn from_directory_errors_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let result = AnalysisOutput::from_directory(dir.path());
        assert!(result.is_err());
    }
}
