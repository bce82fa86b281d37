//! Merging of raw research files into a single deduplicated record.
//!
//! Consolidation is idempotent: feeding the same file twice leaves the
//! consolidated record unchanged. Sources are keyed by their normalised URL
//! and findings by claim plus source.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, ToolError};
use crate::project::ensure_parent;

/// A research file as produced by a search or a note-taking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchFile {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub findings: Vec<FindingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub retrieved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingEntry {
    pub claim: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A source after consolidation, identified by a UUID derived from its
/// normalised URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedSource {
    pub id: Uuid,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub retrieved_at: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Contents of `research/consolidated.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedResearch {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub sources: Vec<ConsolidatedSource>,
    #[serde(default)]
    pub findings: Vec<FindingEntry>,
    #[serde(default)]
    pub ingested_files: Vec<String>,
}

/// Counts of what a merge actually added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub sources_added: usize,
    pub sources_updated: usize,
    pub findings_added: usize,
    pub skipped: usize,
}

impl MergeStats {
    fn absorb(&mut self, other: MergeStats) {
        self.sources_added += other.sources_added;
        self.sources_updated += other.sources_updated;
        self.findings_added += other.findings_added;
        self.skipped += other.skipped;
    }
}

impl ConsolidatedResearch {
    /// Loads the consolidated record; a missing file is an empty record.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Merges one research file. `origin` identifies the file in
    /// `ingested_files`.
    pub fn merge(&mut self, origin: &str, file: &ResearchFile) -> MergeStats {
        let mut stats = MergeStats::default();

        let topic = file
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .map(str::to_string);
        if let Some(topic) = &topic {
            if !self.topics.contains(topic) {
                self.topics.push(topic.clone());
            }
        }

        let mut by_url: HashMap<String, usize> = self
            .sources
            .iter()
            .enumerate()
            .map(|(index, source)| (source.url.clone(), index))
            .collect();

        for entry in &file.sources {
            let url = normalize_url(&entry.url);
            if url.is_empty() {
                warn!(origin, "skipping source without a URL");
                stats.skipped += 1;
                continue;
            }

            match by_url.get(&url).copied() {
                Some(index) => {
                    let existing = &mut self.sources[index];
                    let mut changed = fill_if_blank(&mut existing.title, &entry.title);
                    changed |= fill_if_blank(&mut existing.summary, &entry.summary);
                    changed |= fill_if_blank(&mut existing.retrieved_at, &entry.retrieved_at);
                    if let Some(topic) = &topic {
                        if !existing.topics.contains(topic) {
                            existing.topics.push(topic.clone());
                            changed = true;
                        }
                    }
                    if changed {
                        stats.sources_updated += 1;
                    }
                }
                None => {
                    by_url.insert(url.clone(), self.sources.len());
                    self.sources.push(ConsolidatedSource {
                        id: source_id(&url),
                        title: non_blank(&entry.title),
                        summary: non_blank(&entry.summary),
                        retrieved_at: non_blank(&entry.retrieved_at),
                        topics: topic.iter().cloned().collect(),
                        url,
                    });
                    stats.sources_added += 1;
                }
            }
        }

        for finding in &file.findings {
            let claim = finding.claim.trim();
            if claim.is_empty() {
                stats.skipped += 1;
                continue;
            }
            let source_url = finding
                .source_url
                .as_deref()
                .map(normalize_url)
                .filter(|url| !url.is_empty());
            let duplicate = self
                .findings
                .iter()
                .any(|existing| existing.claim == claim && existing.source_url == source_url);
            if duplicate {
                continue;
            }
            self.findings.push(FindingEntry {
                claim: claim.to_string(),
                source_url,
                category: non_blank(&finding.category),
            });
            stats.findings_added += 1;
        }

        if !self.ingested_files.iter().any(|seen| seen == origin) {
            self.ingested_files.push(origin.to_string());
        }

        stats
    }

    /// Sources grouped by topic; sources without one land under `""`.
    pub fn sources_by_topic(&self) -> BTreeMap<String, Vec<&ConsolidatedSource>> {
        let mut grouped: BTreeMap<String, Vec<&ConsolidatedSource>> = BTreeMap::new();
        for source in &self.sources {
            if source.topics.is_empty() {
                grouped.entry(String::new()).or_default().push(source);
            }
            for topic in &source.topics {
                grouped.entry(topic.clone()).or_default().push(source);
            }
        }
        grouped
    }
}

/// Outcome of a consolidation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationSummary {
    pub output: PathBuf,
    pub files: usize,
    pub stats: MergeStats,
    pub total_sources: usize,
    pub total_findings: usize,
}

/// Merges `inputs` into the consolidated record at `output`. Every input is
/// parsed before anything is written, so a malformed file leaves the
/// existing record untouched.
#[instrument(level = "info", skip_all, fields(output = %output.display(), inputs = inputs.len()))]
pub fn consolidate_files(output: &Path, inputs: &[PathBuf]) -> Result<ConsolidationSummary> {
    let mut parsed = Vec::with_capacity(inputs.len());
    for input in inputs {
        if !input.exists() {
            return Err(ToolError::MissingInput(input.clone()));
        }
        let raw = fs::read_to_string(input)?;
        let file: ResearchFile = serde_json::from_str(&raw).map_err(|err| {
            ToolError::Research(format!("failed to parse '{}': {err}", input.display()))
        })?;
        let origin = fs::canonicalize(input)
            .unwrap_or_else(|_| input.clone())
            .display()
            .to_string();
        parsed.push((origin, file));
    }

    let mut consolidated = ConsolidatedResearch::load(output)?;
    let mut stats = MergeStats::default();
    for (origin, file) in &parsed {
        stats.absorb(consolidated.merge(origin, file));
    }
    consolidated.save(output)?;

    info!(
        sources_added = stats.sources_added,
        findings_added = stats.findings_added,
        total_sources = consolidated.sources.len(),
        "research consolidated"
    );

    Ok(ConsolidationSummary {
        output: output.to_path_buf(),
        files: parsed.len(),
        stats,
        total_sources: consolidated.sources.len(),
        total_findings: consolidated.findings.len(),
    })
}

/// Lists the `*.json` files of a directory in name order. A missing
/// directory has no files.
pub fn list_source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Canonical form of a URL for deduplication: trimmed, fragment dropped,
/// scheme and host lowercased, trailing slashes removed. Userinfo, port,
/// path and query keep their case. Input that does not parse as an absolute
/// URL only gets the trim and fragment rules.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let normalized = match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            String::from(url)
        }
        Err(_) => trimmed.split('#').next().unwrap_or_default().to_string(),
    };

    let stripped = normalized.trim_end_matches('/');
    if stripped.ends_with(':') {
        normalized
    } else {
        stripped.to_string()
    }
}

/// Stable identifier for a normalised URL.
pub fn source_id(normalized_url: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, normalized_url.as_bytes())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn fill_if_blank(slot: &mut Option<String>, incoming: &Option<String>) -> bool {
    if slot.as_deref().is_some_and(|value| !value.trim().is_empty()) {
        return false;
    }
    match non_blank(incoming) {
        Some(value) => {
            *slot = Some(value);
            true
        }
        None => false,
    }
}
