use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// Number of stages in the workflow, numbered `0..STAGE_COUNT`.
pub const STAGE_COUNT: u8 = 6;

/// `program` value that resolves to the running executable.
pub const SELF_PROGRAM: &str = "self";

/// Argument that expands into every research source file of the project.
pub const RESEARCH_SOURCES_ARG: &str = "{research_sources}";

/// A subprocess to run as part of a stage. Arguments may carry
/// `{project}`, `{project_dir}`, `{root}` and `{config}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl StepSpec {
    fn own(args: &[&str]) -> Self {
        Self {
            program: SELF_PROGRAM.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

/// A numbered stage: its steps run in order and all must succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    pub id: u8,
    pub name: String,
    pub steps: Vec<StepSpec>,
    /// Paths (with placeholders) recorded when the stage completes and the
    /// file exists.
    pub artifacts: Vec<String>,
}

/// Contents of the optional `workflow.json` override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOverride {
    #[serde(default)]
    pub stages: Vec<StageOverride>,
}

/// Replaces parts of a default stage. Fields left out keep the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOverride {
    pub id: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<StepSpec>>,
    #[serde(default)]
    pub artifacts: Option<Vec<String>>,
}

/// The six built-in stages, each driving one of this tool's own commands.
pub fn default_stages() -> Vec<StageDefinition> {
    let project = ["--project", "{project}", "--root", "{root}"];
    let with_project = |args: &[&str]| {
        let mut all: Vec<&str> = args.to_vec();
        all.extend_from_slice(&project);
        StepSpec::own(&all)
    };

    vec![
        StageDefinition {
            id: 0,
            name: "setup".to_string(),
            steps: vec![StepSpec::own(&["config", "validate", "--config", "{config}"])],
            artifacts: vec!["{config}".to_string()],
        },
        StageDefinition {
            id: 1,
            name: "research".to_string(),
            steps: vec![with_project(&["research", "consolidate", RESEARCH_SOURCES_ARG])],
            artifacts: vec!["{project_dir}/research/consolidated.json".to_string()],
        },
        StageDefinition {
            id: 2,
            name: "model".to_string(),
            steps: vec![with_project(&[
                "model",
                "build",
                "--config",
                "{config}",
                "--output",
                "{project_dir}/model/financial_model.xlsx",
            ])],
            artifacts: vec!["{project_dir}/model/financial_model.xlsx".to_string()],
        },
        StageDefinition {
            id: 3,
            name: "audit".to_string(),
            steps: vec![with_project(&[
                "audit",
                "--input",
                "{project_dir}/model/financial_model.xlsx",
            ])],
            artifacts: vec!["{project_dir}/notes/local_sheet_gates.json".to_string()],
        },
        StageDefinition {
            id: 4,
            name: "plan".to_string(),
            steps: vec![with_project(&["plan", "draft", "--config", "{config}"])],
            artifacts: vec!["{project_dir}/plan/business_plan.md".to_string()],
        },
        StageDefinition {
            id: 5,
            name: "sync".to_string(),
            steps: vec![with_project(&["publish", "--config", "{config}"])],
            artifacts: vec!["{project_dir}/publish/sheets_batch_update.json".to_string()],
        },
    ]
}

/// Default stages with the project's override applied, if it has one.
pub fn load_stages(override_path: &Path) -> Result<Vec<StageDefinition>> {
    let mut stages = default_stages();
    if !override_path.exists() {
        return Ok(stages);
    }

    let raw = fs::read_to_string(override_path)?;
    let overrides: WorkflowOverride = serde_json::from_str(&raw)
        .map_err(|err| ToolError::InvalidWorkflow(format!("{}: {err}", override_path.display())))?;

    for stage_override in overrides.stages {
        let stage = stages
            .iter_mut()
            .find(|stage| stage.id == stage_override.id)
            .ok_or_else(|| {
                ToolError::InvalidWorkflow(format!(
                    "stage {} does not exist (stages are 0..{})",
                    stage_override.id,
                    STAGE_COUNT - 1
                ))
            })?;
        if let Some(name) = stage_override.name {
            stage.name = name;
        }
        if let Some(steps) = stage_override.steps {
            if steps.is_empty() {
                return Err(ToolError::InvalidWorkflow(format!(
                    "stage {} must have at least one step",
                    stage.id
                )));
            }
            stage.steps = steps;
        }
        if let Some(artifacts) = stage_override.artifacts {
            stage.artifacts = artifacts;
        }
    }
    Ok(stages)
}

/// Values substituted into step arguments and artifact paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub project: String,
    pub project_dir: PathBuf,
    pub root: PathBuf,
    pub config: PathBuf,
}

impl Placeholders {
    pub fn expand(&self, template: &str) -> String {
        template
            .replace("{project_dir}", &self.project_dir.display().to_string())
            .replace("{project}", &self.project)
            .replace("{root}", &self.root.display().to_string())
            .replace("{config}", &self.config.display().to_string())
    }
}
