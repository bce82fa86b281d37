mod common;

use std::fs;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use bizplan_tools::project::ProjectLayout;
use bizplan_tools::workflow::StageState;
use serde_json::json;
use tempfile::tempdir;

fn tool() -> Command {
    cargo_bin_cmd!("bizplan-tools")
}

#[test]
fn config_validate_lists_every_problem() {
    let temp_dir = tempdir().expect("temporary directory");
    let mut value = common::sample_config_json();
    value["general"]["tax_rate"] = json!(2.0);
    value["general"]["projection_years"] = json!(0);
    let config = common::write_json(&temp_dir.path().join("bad.json"), &value);

    let output = tool()
        .args(["config", "validate", "--config"])
        .arg(&config)
        .output()
        .expect("command ran");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: invalid config:"));
    assert!(stderr.contains("tax_rate"));
    assert!(stderr.contains("projection_years"));
}

#[test]
fn model_build_then_audit_passes() {
    let temp_dir = tempdir().expect("temporary directory");
    let config = common::write_sample_config(temp_dir.path());
    let model = temp_dir.path().join("out").join("model.xlsx");

    tool()
        .args(["model", "build", "--config"])
        .arg(&config)
        .arg("--output")
        .arg(&model)
        .assert()
        .success();
    assert!(model.exists());

    let output = tool()
        .args(["audit", "--json", "--input"])
        .arg(&model)
        .output()
        .expect("command ran");
    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("audit JSON printed");
    assert_eq!(report["sheets_scanned"], json!(6));
    assert_eq!(report["findings"], json!([]));
}

#[test]
fn model_preview_prints_a_single_sheet() {
    let temp_dir = tempdir().expect("temporary directory");
    let config = common::write_sample_config(temp_dir.path());

    let output = tool()
        .args(["model", "preview", "--sheet", "Funding", "--config"])
        .arg(&config)
        .output()
        .expect("command ran");
    assert!(output.status.success());
    let preview: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("preview JSON printed");
    let cells = preview["Funding"].as_array().expect("funding cells");
    assert!(cells.contains(&json!({ "cell": "C3", "value": "=SUM(C2:C2)" })));
    assert!(preview.get("Summary").is_none());

    tool()
        .args(["model", "preview", "--sheet", "Nope", "--config"])
        .arg(&config)
        .assert()
        .failure();
}

#[test]
fn workflow_runs_every_stage_end_to_end() {
    let temp_dir = tempdir().expect("temporary directory");
    let root = temp_dir.path();
    let layout = ProjectLayout::new(root, "acme").expect("valid project");
    common::write_sample_config(&layout.dir());
    common::write_json(
        &layout.sources_dir().join("market.json"),
        &json!({
            "topic": "market",
            "sources": [{ "url": "https://example.com/a", "title": "Report A" }],
            "findings": [{ "claim": "Demand is rising", "source_url": "https://example.com/a" }]
        }),
    );

    tool()
        .args(["workflow", "--project", "acme", "--root"])
        .arg(root)
        .args(["run", "--stage", "2"])
        .assert()
        .failure();

    tool()
        .args(["workflow", "--project", "acme", "--root"])
        .arg(root)
        .arg("run-all")
        .assert()
        .success();

    let state = StageState::load(&layout.stage_state_path()).expect("state loads");
    assert_eq!(state.completed_stages, vec![0, 1, 2, 3, 4, 5]);
    assert!(layout.consolidated_research_path().exists());
    assert!(layout.model_path().exists());
    assert!(layout.gates_path().exists());
    assert!(layout.publish_payload_path().exists());
    let plan = fs::read_to_string(layout.plan_path()).expect("plan written");
    assert!(plan.contains("- Demand is rising [1]"));
    assert_eq!(
        state.artifacts[&2],
        vec![layout.model_path().display().to_string()]
    );

    let output = tool()
        .args(["workflow", "--project", "acme", "--root"])
        .arg(root)
        .arg("status")
        .output()
        .expect("command ran");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 6);
    assert!(stdout.lines().all(|line| line.contains("done")));

    tool()
        .args(["workflow", "--project", "acme", "--root"])
        .arg(root)
        .args(["run", "--stage", "5"])
        .assert()
        .failure();

    tool()
        .args(["workflow", "--project", "acme", "--root"])
        .arg(root)
        .arg("reset")
        .assert()
        .success();
    assert!(!layout.stage_state_path().exists());
}

#[test]
fn run_all_prints_finished_stages_before_failing() {
    let temp_dir = tempdir().expect("temporary directory");
    let root = temp_dir.path();
    let layout = ProjectLayout::new(root, "acme").expect("valid project");
    common::write_sample_config(&layout.dir());
    common::write_json(
        &layout.workflow_path(),
        &json!({ "stages": [
            { "id": 0, "steps": [{ "program": "sh", "args": ["-c", "exit 0"] }] },
            { "id": 1, "steps": [{ "program": "sh", "args": ["-c", "exit 3"] }] }
        ] }),
    );

    let output = tool()
        .args(["workflow", "--project", "acme", "--root"])
        .arg(root)
        .arg("run-all")
        .output()
        .expect("command ran");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stage 0 (setup) completed"));
    assert!(!stdout.contains("all stages completed"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn invalid_project_name_is_rejected() {
    tool()
        .args(["research", "summary", "--project", "../outside"])
        .assert()
        .failure();
}
