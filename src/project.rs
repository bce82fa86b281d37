use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ToolError};

/// Directory under the root that holds every project's working files.
pub const WORKSPACE_DIR: &str = ".tmp";

/// Paths of a single project's working directory, `<root>/.tmp/<project>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    name: String,
}

impl ProjectLayout {
    /// Validates the project name and anchors the layout at `root`. Nothing
    /// is created on disk.
    pub fn new(root: impl Into<PathBuf>, name: &str) -> Result<Self> {
        let trimmed = name.trim();
        let invalid = trimmed.is_empty()
            || trimmed == "."
            || trimmed.contains("..")
            || trimmed.contains(['/', '\\']);
        if invalid {
            return Err(ToolError::InvalidProject(name.to_string()));
        }
        Ok(Self {
            root: root.into(),
            name: trimmed.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR).join(&self.name)
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.dir().join("notes")
    }

    pub fn research_dir(&self) -> PathBuf {
        self.dir().join("research")
    }

    /// Raw research files waiting to be consolidated.
    pub fn sources_dir(&self) -> PathBuf {
        self.research_dir().join("sources")
    }

    pub fn model_dir(&self) -> PathBuf {
        self.dir().join("model")
    }

    pub fn plan_dir(&self) -> PathBuf {
        self.dir().join("plan")
    }

    pub fn publish_dir(&self) -> PathBuf {
        self.dir().join("publish")
    }

    pub fn stage_state_path(&self) -> PathBuf {
        self.notes_dir().join("stage_state.json")
    }

    pub fn gates_path(&self) -> PathBuf {
        self.notes_dir().join("local_sheet_gates.json")
    }

    pub fn workflow_path(&self) -> PathBuf {
        self.notes_dir().join("workflow.json")
    }

    /// Model config used by the workflow when none is given explicitly.
    pub fn default_config_path(&self) -> PathBuf {
        self.dir().join("config.json")
    }

    pub fn consolidated_research_path(&self) -> PathBuf {
        self.research_dir().join("consolidated.json")
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join("financial_model.xlsx")
    }

    pub fn plan_path(&self) -> PathBuf {
        self.plan_dir().join("business_plan.md")
    }

    pub fn publish_payload_path(&self) -> PathBuf {
        self.publish_dir().join("sheets_batch_update.json")
    }

    /// Creates every directory of the layout.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.notes_dir(),
            self.sources_dir(),
            self.model_dir(),
            self.plan_dir(),
            self.publish_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Creates the parent directory of `path` when it has one.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
