use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::audit::{self, AuditReport};
use crate::config::{self, ValidationReport};
use crate::error::{Result, ToolError};
use crate::formula::{WorkbookData, build_model};
use crate::gates::{self, FORMULAS_AUDITED, MODEL_BUILT, RESEARCH_CONSOLIDATED};
use crate::io::excel_write;
use crate::plan::render_plan;
use crate::project::{ProjectLayout, ensure_parent};
use crate::publish::{BatchUpdateRequest, build_batch_update};
use crate::research::{self, ConsolidatedResearch, ConsolidationSummary};

/// Loads a config and returns the full validation report without failing on
/// errors, so callers can print every problem.
#[instrument(level = "info", skip_all, fields(config = %config_path.display()))]
pub fn validate_config(config_path: &Path) -> Result<ValidationReport> {
    let model_config = config::load_config(config_path)?;
    let report = config::validate(&model_config);
    info!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "config validated"
    );
    Ok(report)
}

/// Generates the model cells for a validated config without writing them.
#[instrument(level = "info", skip_all, fields(config = %config_path.display()))]
pub fn generate_model(config_path: &Path) -> Result<WorkbookData> {
    let model_config = config::load_validated(config_path)?;
    let workbook = build_model(&model_config);
    debug!(sheet_count = workbook.sheets.len(), "workbook constructed");
    Ok(workbook)
}

/// Validates the config, generates the model, and writes it as xlsx. When a
/// project is given the `model_built` gate records the outcome.
#[instrument(
    level = "info",
    skip_all,
    fields(config = %config_path.display(), output = %output.display())
)]
pub fn build_model_file(
    config_path: &Path,
    output: &Path,
    project: Option<&ProjectLayout>,
) -> Result<WorkbookData> {
    let outcome = generate_model(config_path).and_then(|workbook| {
        ensure_parent(output)?;
        excel_write::write_workbook(output, &workbook)?;
        Ok(workbook)
    });

    if let Some(layout) = project {
        let detail = match &outcome {
            Ok(_) => Some(output.display().to_string()),
            Err(error) => Some(error.to_string()),
        };
        gates::record_gate(layout, MODEL_BUILT, outcome.is_ok(), detail)?;
    }

    let workbook = outcome?;
    info!(sheet_count = workbook.sheets.len(), "model written");
    Ok(workbook)
}

/// Audits a workbook and records the `formulas_audited` gate when a project
/// is given. Findings are returned, not raised.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn audit_model(input: &Path, project: Option<&ProjectLayout>) -> Result<AuditReport> {
    let report = audit::audit_workbook(input)?;
    if !report.is_clean() {
        warn!(findings = report.findings.len(), "audit found problems");
    }
    if let Some(layout) = project {
        let detail = format!(
            "{} finding(s) across {} sheet(s)",
            report.findings.len(),
            report.sheets_scanned
        );
        gates::record_gate(layout, FORMULAS_AUDITED, report.is_clean(), Some(detail))?;
    }
    Ok(report)
}

/// Merges research files into the project's consolidated record.
#[instrument(level = "info", skip_all, fields(project = layout.name(), files = inputs.len()))]
pub fn consolidate_research(
    layout: &ProjectLayout,
    inputs: &[PathBuf],
) -> Result<ConsolidationSummary> {
    let outcome = research::consolidate_files(&layout.consolidated_research_path(), inputs);
    let detail = match &outcome {
        Ok(summary) => format!(
            "{} source(s), {} finding(s)",
            summary.total_sources, summary.total_findings
        ),
        Err(error) => error.to_string(),
    };
    gates::record_gate(layout, RESEARCH_CONSOLIDATED, outcome.is_ok(), Some(detail))?;
    outcome
}

/// Loads the project's consolidated research, if any has been gathered.
pub fn load_research(layout: &ProjectLayout) -> Result<Option<ConsolidatedResearch>> {
    let path = layout.consolidated_research_path();
    if !path.exists() {
        return Ok(None);
    }
    ConsolidatedResearch::load(&path).map(Some)
}

/// Renders the business-plan draft and writes it to `output`, or to the
/// project's plan directory.
#[instrument(level = "info", skip_all, fields(config = %config_path.display(), project = layout.name()))]
pub fn draft_plan(
    config_path: &Path,
    layout: &ProjectLayout,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let model_config = config::load_validated(config_path)?;
    let research = load_research(layout)?;
    if research.is_none() {
        debug!("no consolidated research; drafting without sources");
    }
    let document = render_plan(&model_config, research.as_ref());

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| layout.plan_path());
    ensure_parent(&path)?;
    fs::write(&path, document)?;
    info!(output = %path.display(), "plan drafted");
    Ok(path)
}

/// Builds the whole-range sync payload and writes it to the project's
/// publish directory.
#[instrument(level = "info", skip_all, fields(config = %config_path.display(), project = layout.name()))]
pub fn publish_payload(
    config_path: &Path,
    layout: &ProjectLayout,
    spreadsheet_id: Option<String>,
) -> Result<(PathBuf, BatchUpdateRequest)> {
    let workbook = generate_model(config_path)?;
    let request = build_batch_update(&workbook, spreadsheet_id);

    let path = layout.publish_payload_path();
    ensure_parent(&path)?;
    fs::write(&path, serde_json::to_string_pretty(&request)?)?;
    info!(ranges = request.data.len(), output = %path.display(), "sync payload written");
    Ok((path, request))
}

/// Fails with [`ToolError::AuditFailed`] when the report has findings.
pub fn require_clean(report: &AuditReport) -> Result<()> {
    if report.is_clean() {
        Ok(())
    } else {
        Err(ToolError::AuditFailed(report.findings.len()))
    }
}
