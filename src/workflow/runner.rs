use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, ToolError};
use crate::project::ProjectLayout;
use crate::research::list_source_files;
use crate::workflow::stages::{
    Placeholders, RESEARCH_SOURCES_ARG, SELF_PROGRAM, STAGE_COUNT, StageDefinition, load_stages,
};
use crate::workflow::state::{HistoryEntry, HistoryStatus, StageState};

/// Everything a stage needs to resolve and run its steps.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub layout: ProjectLayout,
    /// Model config handed to the stages through `{config}`.
    pub config: PathBuf,
    /// Executable that `"self"` steps run, normally the current binary.
    pub self_program: PathBuf,
}

impl WorkflowContext {
    fn placeholders(&self) -> Placeholders {
        Placeholders {
            project: self.layout.name().to_string(),
            project_dir: self.layout.dir(),
            root: self.layout.root().to_path_buf(),
            config: self.config.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub force: bool,
    pub dry_run: bool,
}

/// A step with every placeholder substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStep {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for ResolvedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of running (or dry-running) a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRun {
    pub stage: u8,
    pub name: String,
    pub steps: Vec<ResolvedStep>,
    pub artifacts: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Ready,
    Blocked,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageStatus::Completed => "done",
            StageStatus::Ready => "ready",
            StageStatus::Blocked => "blocked",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStatusLine {
    pub stage: u8,
    pub name: String,
    pub status: StageStatus,
    pub last_run: Option<HistoryEntry>,
}

/// Runs one stage after checking its gate. A failing step aborts the stage:
/// nothing is marked complete, no artifacts are recorded, and only a
/// `failed` history entry is kept.
#[instrument(level = "info", skip(context, options), fields(project = context.layout.name()))]
pub fn run_stage(context: &WorkflowContext, stage: u8, options: RunOptions) -> Result<StageRun> {
    let stages = load_stages(&context.layout.workflow_path())?;
    let definition = stages
        .iter()
        .find(|definition| definition.id == stage)
        .ok_or(ToolError::UnknownStage(stage))?;

    let state_path = context.layout.stage_state_path();
    let mut state = StageState::load(&state_path)?;
    state.check_can_run(stage, options.force)?;

    let placeholders = context.placeholders();
    let steps = resolve_steps(definition, context, &placeholders)?;
    let mut run = StageRun {
        stage,
        name: definition.name.clone(),
        steps,
        artifacts: Vec::new(),
        dry_run: options.dry_run,
    };
    if options.dry_run {
        return Ok(run);
    }

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(%run_id, stage, name = %definition.name, "stage started");

    for step in &run.steps {
        debug!(command = %step, "running step");
        let failure = match Command::new(&step.program).args(&step.args).status() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(ToolError::StepFailed {
                stage,
                command: step.to_string(),
                status: status.to_string(),
            }),
            Err(source) => Some(ToolError::StepSpawn {
                command: step.to_string(),
                source,
            }),
        };

        if let Some(error) = failure {
            warn!(%run_id, stage, %error, "stage aborted");
            state.record(HistoryEntry {
                run_id,
                stage,
                status: HistoryStatus::Failed,
                started_at,
                finished_at: Utc::now(),
                detail: Some(error.to_string()),
            });
            state.save(&state_path)?;
            return Err(error);
        }
    }

    run.artifacts = definition
        .artifacts
        .iter()
        .map(|template| placeholders.expand(template))
        .filter(|path| Path::new(path).exists())
        .collect();

    state.mark_completed(stage, run.artifacts.clone());
    state.record(HistoryEntry {
        run_id,
        stage,
        status: HistoryStatus::Completed,
        started_at,
        finished_at: Utc::now(),
        detail: None,
    });
    state.save(&state_path)?;
    info!(%run_id, stage, artifacts = run.artifacts.len(), "stage completed");
    Ok(run)
}

/// Runs the lowest stage not yet completed. Returns `None` once every stage
/// is done.
pub fn run_next(context: &WorkflowContext, options: RunOptions) -> Result<Option<StageRun>> {
    let state = StageState::load(&context.layout.stage_state_path())?;
    match state.next_pending(STAGE_COUNT) {
        Some(stage) => run_stage(context, stage, options).map(Some),
        None => Ok(None),
    }
}

/// Runs pending stages in order until all are done or one fails. Stages that
/// finished before a failure stay recorded.
pub fn run_all(context: &WorkflowContext) -> Result<Vec<StageRun>> {
    let mut runs = Vec::new();
    run_all_with(context, |run| runs.push(run.clone()))?;
    Ok(runs)
}

/// Like [`run_all`], but hands each finished stage to `on_stage` as soon as
/// it completes, so progress is visible even when a later stage fails.
pub fn run_all_with(
    context: &WorkflowContext,
    mut on_stage: impl FnMut(&StageRun),
) -> Result<()> {
    while let Some(run) = run_next(context, RunOptions::default())? {
        on_stage(&run);
    }
    Ok(())
}

/// Done/ready/blocked view of every stage.
pub fn status(layout: &ProjectLayout) -> Result<Vec<StageStatusLine>> {
    let stages = load_stages(&layout.workflow_path())?;
    let state = StageState::load(&layout.stage_state_path())?;

    Ok(stages
        .iter()
        .map(|definition| {
            let id = definition.id;
            let status = if state.is_completed(id) {
                StageStatus::Completed
            } else if id == 0 || state.is_completed(id - 1) {
                StageStatus::Ready
            } else {
                StageStatus::Blocked
            };
            StageStatusLine {
                stage: id,
                name: definition.name.clone(),
                status,
                last_run: state.last_entry_for(id).cloned(),
            }
        })
        .collect())
}

/// Deletes the stage state. Returns whether there was anything to delete.
pub fn reset(layout: &ProjectLayout) -> Result<bool> {
    let path = layout.stage_state_path();
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path)?;
    info!(path = %path.display(), "stage state reset");
    Ok(true)
}

fn resolve_steps(
    definition: &StageDefinition,
    context: &WorkflowContext,
    placeholders: &Placeholders,
) -> Result<Vec<ResolvedStep>> {
    let mut resolved = Vec::with_capacity(definition.steps.len());
    for step in &definition.steps {
        let program = if step.program == SELF_PROGRAM {
            context.self_program.display().to_string()
        } else {
            placeholders.expand(&step.program)
        };

        let mut args = Vec::with_capacity(step.args.len());
        for arg in &step.args {
            if arg == RESEARCH_SOURCES_ARG {
                for file in list_source_files(&context.layout.sources_dir())? {
                    args.push(file.display().to_string());
                }
            } else {
                args.push(placeholders.expand(arg));
            }
        }
        resolved.push(ResolvedStep { program, args });
    }
    Ok(resolved)
}
