//! Formula audit over a local workbook.
//!
//! The workbook is never evaluated here. The audit inspects what the
//! spreadsheet engine last cached for each cell plus the formula text, and
//! flags error tokens, non-finite numbers, and references that can no longer
//! resolve.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::formula::cell_ref;
use crate::io::excel_read::{self, CellReading, SheetContents};

/// Error values Excel and Google Sheets render in place of a result.
pub const ERROR_TOKENS: [&str; 9] = [
    "#REF!",
    "#DIV/0!",
    "#VALUE!",
    "#NAME?",
    "#N/A",
    "#NUM!",
    "#NULL!",
    "#ERROR!",
    "#GETTING_DATA",
];

const NON_FINITE_TEXT: [&str; 7] = [
    "nan",
    "inf",
    "+inf",
    "-inf",
    "infinity",
    "+infinity",
    "-infinity",
];

/// Category of an audit finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Cached result is a spreadsheet error value.
    ErrorValue,
    /// Cached result is NaN or infinite.
    NonFinite,
    /// Formula text contains a `#REF!` left behind by a deleted range.
    BrokenReference,
    /// Formula points at a sheet the workbook does not have.
    UnknownSheet,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::ErrorValue => write!(f, "error value"),
            FindingKind::NonFinite => write!(f, "non-finite value"),
            FindingKind::BrokenReference => write!(f, "broken reference"),
            FindingKind::UnknownSheet => write!(f, "unknown sheet"),
        }
    }
}

/// One problem cell, addressed by sheet and A1 reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub sheet: String,
    pub cell: String,
    pub kind: FindingKind,
    pub detail: String,
}

/// Scan totals and every finding, in sheet then row-major order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub sheets_scanned: usize,
    pub cells_scanned: usize,
    pub formulas_scanned: usize,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    /// True when the scan found nothing to report.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings of a single kind, in scan order.
    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |finding| finding.kind == kind)
    }
}

/// Reads and audits a workbook on disk.
#[instrument(level = "info", skip_all, fields(input = %path.display()))]
pub fn audit_workbook(path: &Path) -> Result<AuditReport> {
    let sheets = excel_read::read_sheets(path)?;
    debug!(sheet_count = sheets.len(), "workbook loaded");
    let report = audit_sheets(&sheets);
    info!(
        cells = report.cells_scanned,
        formulas = report.formulas_scanned,
        findings = report.findings.len(),
        "audit complete"
    );
    Ok(report)
}

/// Audits sheets that have already been read.
pub fn audit_sheets(sheets: &[SheetContents]) -> AuditReport {
    let known: HashSet<String> = sheets
        .iter()
        .map(|sheet| sheet.name.to_lowercase())
        .collect();

    let mut report = AuditReport {
        sheets_scanned: sheets.len(),
        ..AuditReport::default()
    };

    for sheet in sheets {
        for record in &sheet.values {
            report.cells_scanned += 1;
            if let Some((kind, detail)) = classify_reading(&record.value) {
                report.findings.push(Finding {
                    sheet: sheet.name.clone(),
                    cell: cell_ref(record.col as usize, record.row as usize + 1),
                    kind,
                    detail,
                });
            }
        }

        for record in &sheet.formulas {
            report.formulas_scanned += 1;
            let cell = cell_ref(record.col as usize, record.row as usize + 1);

            if record.formula.to_ascii_uppercase().contains("#REF!") {
                report.findings.push(Finding {
                    sheet: sheet.name.clone(),
                    cell: cell.clone(),
                    kind: FindingKind::BrokenReference,
                    detail: format!("={}", record.formula),
                });
            }

            for target in referenced_sheets(&record.formula) {
                if !known.contains(&target.to_lowercase()) {
                    report.findings.push(Finding {
                        sheet: sheet.name.clone(),
                        cell: cell.clone(),
                        kind: FindingKind::UnknownSheet,
                        detail: format!("references missing sheet '{target}'"),
                    });
                }
            }
        }
    }

    report
}

fn classify_reading(value: &CellReading) -> Option<(FindingKind, String)> {
    match value {
        CellReading::Error(token) => Some((FindingKind::ErrorValue, token.clone())),
        CellReading::Number(number) if !number.is_finite() => {
            Some((FindingKind::NonFinite, number.to_string()))
        }
        CellReading::Text(text) | CellReading::Other(text) => {
            if let Some(token) = match_error_token(text) {
                Some((FindingKind::ErrorValue, token.to_string()))
            } else if is_non_finite_text(text) {
                Some((FindingKind::NonFinite, text.trim().to_string()))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Returns the error token a result string represents, if any. The match is
/// on the whole trimmed value so prose mentioning a token is not flagged.
pub fn match_error_token(value: &str) -> Option<&'static str> {
    let trimmed = value.trim();
    ERROR_TOKENS
        .iter()
        .find(|token| token.eq_ignore_ascii_case(trimmed))
        .copied()
}

/// Whether a result string spells NaN or an infinity.
pub fn is_non_finite_text(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    NON_FINITE_TEXT.contains(&lowered.as_str())
}

/// Sheet names a formula references, in order of appearance and without
/// duplicates. Handles `Name!A1` and `'Quoted Name'!A1`; string literals and
/// error tokens such as `#REF!` are skipped.
pub fn referenced_sheets(formula: &str) -> Vec<String> {
    let chars: Vec<char> = formula.chars().collect();
    let mut found: Vec<String> = Vec::new();
    let mut ident = String::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        match ch {
            '"' => {
                ident.clear();
                index += 1;
                while index < chars.len() {
                    if chars[index] == '"' {
                        if chars.get(index + 1) == Some(&'"') {
                            index += 1;
                        } else {
                            break;
                        }
                    }
                    index += 1;
                }
            }
            '\'' => {
                ident.clear();
                let mut name = String::new();
                index += 1;
                while index < chars.len() {
                    if chars[index] == '\'' {
                        if chars.get(index + 1) == Some(&'\'') {
                            name.push('\'');
                            index += 1;
                        } else {
                            break;
                        }
                    } else {
                        name.push(chars[index]);
                    }
                    index += 1;
                }
                if chars.get(index + 1) == Some(&'!') {
                    push_unique(&mut found, name);
                    index += 1;
                }
            }
            '#' => {
                ident.clear();
                index += 1;
                while index < chars.len()
                    && (chars[index].is_ascii_alphanumeric()
                        || chars[index] == '/'
                        || chars[index] == '_')
                {
                    index += 1;
                }
                if index < chars.len() && (chars[index] == '!' || chars[index] == '?') {
                    index += 1;
                }
                continue;
            }
            '!' => {
                push_unique(&mut found, std::mem::take(&mut ident));
            }
            ch if ch.is_alphanumeric() || ch == '_' || ch == '.' => ident.push(ch),
            _ => ident.clear(),
        }
        index += 1;
    }

    found
}

fn push_unique(found: &mut Vec<String>, name: String) {
    if !name.is_empty() && !found.contains(&name) {
        found.push(name);
    }
}
