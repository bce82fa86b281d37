mod common;

use std::fs;

use bizplan_tools::config::GrowthRate;
use bizplan_tools::gates::{FORMULAS_AUDITED, LocalSheetGates, MODEL_BUILT, RESEARCH_CONSOLIDATED};
use bizplan_tools::plan::{format_amount, format_percent, project_value, render_plan};
use bizplan_tools::project::ProjectLayout;
use bizplan_tools::publish::BatchUpdateRequest;
use bizplan_tools::research::ConsolidatedResearch;
use bizplan_tools::{ToolError, pipeline};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn amounts_and_percentages_render_for_prose() {
    assert_eq!(format_amount(1250000.0, "USD"), "USD 1,250,000");
    assert_eq!(format_amount(999.4, "EUR"), "EUR 999");
    assert_eq!(format_amount(-1500.0, "GBP"), "GBP -1,500");
    assert_eq!(format_percent(0.4), "40.0%");
    assert_eq!(project_value(100.0, &GrowthRate::Uniform(0.5), 3), 225.0);
    assert_eq!(project_value(100.0, &GrowthRate::Uniform(0.5), 1), 100.0);
}

#[test]
fn plan_draft_covers_every_section() {
    let config = common::sample_config();
    let research: ConsolidatedResearch = serde_json::from_value(json!({
        "topics": ["market"],
        "sources": [{
            "id": "6ba7b811-9dad-11d1-80b4-00c04fd430c8",
            "url": "https://example.com/reports/saas",
            "title": "SaaS market report",
            "topics": ["market"]
        }],
        "findings": [
            { "claim": "SMB analytics spend grows 18% a year", "source_url": "https://example.com/reports/saas" },
            { "claim": "Churn is lower for annual plans" }
        ]
    }))
    .expect("research parsed");

    let document = render_plan(&config, Some(&research));
    assert!(document.starts_with("# Acme Analytics Business Plan (draft)\n"));
    for heading in [
        "## Market Opportunity",
        "## Revenue Model",
        "## Cost Base",
        "## Team",
        "## Funding",
        "## Research Highlights",
        "## Sources",
    ] {
        assert!(document.contains(heading), "missing {heading}");
    }
    assert!(document.contains("| SAM / TAM | 10.0% |"));
    assert!(document.contains("| Subscriptions | USD 120,000 | USD 607,500 | 50.0% / yr |"));
    assert!(document.contains("| Services | USD 30,000 | USD 47,916 | 20.0%, 10.0% |"));
    assert!(document.contains("| Seed | FY2025 | USD 500,000 |"));
    assert!(document.contains("- SMB analytics spend grows 18% a year [1]"));
    assert!(document.contains("- Churn is lower for annual plans\n"));
    assert!(document.contains("1. [SaaS market report](https://example.com/reports/saas)"));

    let without_research = render_plan(&config, None);
    assert!(!without_research.contains("## Sources"));
}

#[test]
fn model_build_and_audit_record_gates() {
    let temp_dir = tempdir().expect("temporary directory");
    let layout = ProjectLayout::new(temp_dir.path(), "acme").expect("valid project");
    let config = common::write_sample_config(temp_dir.path());

    let workbook =
        pipeline::build_model_file(&config, &layout.model_path(), Some(&layout)).expect("model built");
    assert_eq!(workbook.sheets.len(), 6);
    assert!(layout.model_path().exists());

    let report = pipeline::audit_model(&layout.model_path(), Some(&layout)).expect("audited");
    assert!(report.is_clean(), "findings: {:?}", report.findings);
    pipeline::require_clean(&report).expect("clean report passes");

    let gates = LocalSheetGates::load(&layout.gates_path()).expect("gates load");
    assert!(gates.is_passed(MODEL_BUILT));
    assert!(gates.is_passed(FORMULAS_AUDITED));
    assert!(!gates.is_passed(RESEARCH_CONSOLIDATED));
}

#[test]
fn invalid_config_fails_the_model_gate() {
    let temp_dir = tempdir().expect("temporary directory");
    let layout = ProjectLayout::new(temp_dir.path(), "acme").expect("valid project");
    let mut value = common::sample_config_json();
    value["general"]["tax_rate"] = json!(-0.1);
    let config = common::write_json(&temp_dir.path().join("config.json"), &value);

    let result = pipeline::build_model_file(&config, &layout.model_path(), Some(&layout));
    assert!(matches!(result, Err(ToolError::InvalidConfig(_))));
    assert!(!layout.model_path().exists());

    let gates = LocalSheetGates::load(&layout.gates_path()).expect("gates load");
    let gate = gates.gates.get(MODEL_BUILT).expect("gate recorded");
    assert!(!gate.passed);
    assert!(gate.detail.as_deref().is_some_and(|detail| detail.contains("tax_rate")));
}

#[test]
fn plan_and_publish_land_in_the_project() {
    let temp_dir = tempdir().expect("temporary directory");
    let layout = ProjectLayout::new(temp_dir.path(), "acme").expect("valid project");
    let config = common::write_sample_config(temp_dir.path());

    let source = common::write_json(
        &layout.sources_dir().join("market.json"),
        &json!({
            "topic": "market",
            "sources": [{ "url": "https://example.com/a", "title": "Report A" }],
            "findings": [{ "claim": "Demand is rising", "source_url": "https://example.com/a" }]
        }),
    );
    let summary = pipeline::consolidate_research(&layout, &[source]).expect("consolidated");
    assert_eq!(summary.total_sources, 1);
    let gates = LocalSheetGates::load(&layout.gates_path()).expect("gates load");
    assert!(gates.is_passed(RESEARCH_CONSOLIDATED));

    let plan = pipeline::draft_plan(&config, &layout, None).expect("plan drafted");
    assert_eq!(plan, layout.plan_path());
    let document = fs::read_to_string(&plan).expect("plan read");
    assert!(document.contains("- Demand is rising [1]"));

    let (payload, request) =
        pipeline::publish_payload(&config, &layout, None).expect("payload written");
    assert_eq!(payload, layout.publish_payload_path());
    let stored: BatchUpdateRequest =
        serde_json::from_str(&fs::read_to_string(&payload).expect("payload read"))
            .expect("payload parses");
    assert_eq!(stored, request);
    assert_eq!(stored.spreadsheet_id, None);
    assert_eq!(stored.data.len(), 6);
}

#[test]
fn require_clean_counts_findings() {
    let temp_dir = tempdir().expect("temporary directory");
    let xlsx_path = temp_dir.path().join("errors.xlsx");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    workbook
        .add_worksheet()
        .write_string(0, 0, "#N/A")
        .expect("cell written");
    workbook.save(&xlsx_path).expect("workbook saved");

    let report = pipeline::audit_model(&xlsx_path, None).expect("audited");
    assert!(matches!(
        pipeline::require_clean(&report),
        Err(ToolError::AuditFailed(1))
    ));
}
