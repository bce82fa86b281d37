//! Pass/fail flags recorded next to the stage state after local sheet work.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::project::{ProjectLayout, ensure_parent};

/// Recorded by `model build`; passes once the workbook is written.
pub const MODEL_BUILT: &str = "model_built";
/// Recorded by `audit`; passes when the report has no findings.
pub const FORMULAS_AUDITED: &str = "formulas_audited";
/// Recorded by `research consolidate`; passes once the merge is saved.
pub const RESEARCH_CONSOLIDATED: &str = "research_consolidated";

/// Outcome of the most recent check of one gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRecord {
    pub passed: bool,
    pub checked_at: DateTime<Utc>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Contents of `local_sheet_gates.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSheetGates {
    #[serde(default)]
    pub gates: BTreeMap<String, GateRecord>,
}

impl LocalSheetGates {
    /// Loads the gates file; a missing file means no gate has been checked.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the gates file, creating its directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Overwrites the named gate with a fresh check.
    pub fn record(&mut self, name: &str, passed: bool, detail: Option<String>) {
        self.gates.insert(
            name.to_string(),
            GateRecord {
                passed,
                checked_at: Utc::now(),
                detail,
            },
        );
    }

    /// False for gates that failed or were never checked.
    pub fn is_passed(&self, name: &str) -> bool {
        self.gates.get(name).is_some_and(|gate| gate.passed)
    }
}

/// Read-modify-write of a single gate in the project's gates file.
pub fn record_gate(
    layout: &ProjectLayout,
    name: &str,
    passed: bool,
    detail: Option<String>,
) -> Result<()> {
    let path = layout.gates_path();
    let mut gates = LocalSheetGates::load(&path)?;
    gates.record(name, passed, detail);
    gates.save(&path)?;
    debug!(gate = name, passed, path = %path.display(), "gate recorded");
    Ok(())
}
