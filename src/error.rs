use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur while the
/// tool validates configs, generates models, audits workbooks, or drives the
/// stage-gate workflow.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a workbook does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the model config fails validation. Carries every error
    /// that was collected, not just the first one.
    #[error("invalid config: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Raised when a research source file cannot be merged.
    #[error("research error: {0}")]
    Research(String),

    /// Raised when the project name cannot be used as a directory.
    #[error("invalid project name '{0}'")]
    InvalidProject(String),

    /// Raised when a stage ID is outside the known workflow.
    #[error("unknown stage {0}")]
    UnknownStage(u8),

    /// Raised when the previous stage has not been completed yet.
    #[error("stage {stage} is blocked: stage {missing} has not been completed")]
    StageBlocked { stage: u8, missing: u8 },

    /// Raised when a completed stage is run again without forcing it.
    #[error("stage {0} is already completed (use --force to run it again)")]
    StageAlreadyCompleted(u8),

    /// Raised when a stage step exits unsuccessfully.
    #[error("stage {stage} step `{command}` failed with {status}")]
    StepFailed {
        stage: u8,
        command: String,
        status: String,
    },

    /// Raised when a stage step could not be started at all.
    #[error("could not start `{command}`: {source}")]
    StepSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Raised when the workflow override file is malformed.
    #[error("invalid workflow definition: {0}")]
    InvalidWorkflow(String),

    /// Raised when an audit turns up problems in a workbook.
    #[error("audit found {0} problem(s)")]
    AuditFailed(usize),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
