//! Stage-gated workflow: six stages run strictly in order, each as one or
//! more subprocesses, with progress kept in `stage_state.json`.

pub mod runner;
pub mod stages;
pub mod state;

pub use runner::{
    RunOptions, StageRun, StageStatus, StageStatusLine, WorkflowContext, reset, run_all,
    run_all_with, run_next, run_stage, status,
};
pub use stages::{STAGE_COUNT, StageDefinition, StepSpec, default_stages, load_stages};
pub use state::{HistoryEntry, HistoryStatus, StageState};
