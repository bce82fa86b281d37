use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ToolError};
use crate::project::ensure_parent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Completed,
    Failed,
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryStatus::Completed => write!(f, "completed"),
            HistoryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One attempt at running a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: Uuid,
    pub stage: u8,
    pub status: HistoryStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Contents of `stage_state.json`.
///
/// `completed_stages` only grows and never holds a stage twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageState {
    #[serde(default)]
    pub completed_stages: Vec<u8>,
    #[serde(default)]
    pub artifacts: BTreeMap<u8, Vec<String>>,
    #[serde(default)]
    pub stage_history: Vec<HistoryEntry>,
}

impl StageState {
    /// Loads the state file. A missing file is an empty state; a malformed
    /// one is an error rather than a silent reset.
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

    pub fn is_completed(&self, stage: u8) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Enforces the linear gate: stage N needs N-1, and a completed stage
    /// only runs again when forced.
    pub fn check_can_run(&self, stage: u8, force: bool) -> Result<()> {
        if stage > 0 && !self.is_completed(stage - 1) {
            return Err(ToolError::StageBlocked {
                stage,
                missing: stage - 1,
            });
        }
        if self.is_completed(stage) && !force {
            return Err(ToolError::StageAlreadyCompleted(stage));
        }
        Ok(())
    }

    /// Marks a stage done and replaces its recorded artifacts.
    pub fn mark_completed(&mut self, stage: u8, artifacts: Vec<String>) {
        if !self.is_completed(stage) {
            self.completed_stages.push(stage);
        }
        self.artifacts.insert(stage, artifacts);
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.stage_history.push(entry);
    }

    /// Lowest stage below `stage_count` that has not been completed.
    pub fn next_pending(&self, stage_count: u8) -> Option<u8> {
        (0..stage_count).find(|stage| !self.is_completed(*stage))
    }

    pub fn last_entry_for(&self, stage: u8) -> Option<&HistoryEntry> {
        self.stage_history
            .iter()
            .rev()
            .find(|entry| entry.stage == stage)
    }
}
