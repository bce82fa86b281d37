mod common;

use bizplan_tools::ToolError;
use bizplan_tools::config::{self, FixedCost, GrowthRate, ModelConfig};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn sample_config_is_valid() {
    let report = config::validate(&common::sample_config());
    assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    assert!(report.warnings.is_empty());
}

#[test]
fn omitted_general_fields_take_defaults() {
    let parsed: ModelConfig = serde_json::from_value(json!({
        "general": { "company_name": "Tiny", "start_year": 2030 }
    }))
    .expect("minimal config parsed");

    assert_eq!(parsed.general.currency, "USD");
    assert_eq!(parsed.general.projection_years, 5);
    assert_eq!(parsed.general.tax_rate, 0.0);
    assert_eq!(parsed.years(), vec![2030, 2031, 2032, 2033, 2034]);

    let report = config::validate(&parsed);
    assert!(report.is_valid());
    assert_eq!(report.warnings.len(), 1, "missing streams should warn");
}

#[test]
fn growth_rates_and_fixed_costs_accept_both_shapes() {
    let config = common::sample_config();
    assert_eq!(config.revenue_streams[0].growth_rate, GrowthRate::Uniform(0.5));
    assert_eq!(
        config.revenue_streams[1].growth_rate,
        GrowthRate::PerYear(vec![0.2, 0.1])
    );
    assert_eq!(config.fixed_costs["rent"], FixedCost::Amount(24000.0));
    assert_eq!(config.fixed_costs["software"].amount(), 6000.0);
    assert_eq!(config.fixed_costs["software"].growth_rate(), 0.1);
    assert_eq!(config.fixed_costs["rent"].growth_rate(), 0.0);
}

#[test]
fn per_year_growth_repeats_its_last_rate() {
    let growth = GrowthRate::PerYear(vec![0.3, 0.2]);
    assert_eq!(growth.rate_for(0), 0.3);
    assert_eq!(growth.rate_for(1), 0.2);
    assert_eq!(growth.rate_for(4), 0.2);
    assert_eq!(GrowthRate::Uniform(0.1).rate_for(7), 0.1);
}

#[test]
fn validation_collects_every_error() {
    let mut value = common::sample_config_json();
    value["general"]["tax_rate"] = json!(1.5);
    value["general"]["company_name"] = json!("  ");
    value["revenue_streams"][0]["base_revenue"] = json!(-10);
    value["revenue_streams"][1]["growth_rate"] = json!([]);
    value["sam"] = json!(9000000000.0);
    value["funding"][0]["year"] = json!(2040);
    let parsed: ModelConfig = serde_json::from_value(value).expect("config parsed");

    let report = config::validate(&parsed);
    let joined = report.errors.join("\n");
    assert_eq!(report.errors.len(), 6, "errors were: {joined}");
    assert!(joined.contains("tax_rate"));
    assert!(joined.contains("company_name"));
    assert!(joined.contains("revenue_streams[0].base_revenue"));
    assert!(joined.contains("revenue_streams[1].growth_rate list must not be empty"));
    assert!(joined.contains("sam (9000000000) must not exceed tam"));
    assert!(joined.contains("funding[0].year 2040 is outside the projection window 2025..=2029"));

    match report.into_result() {
        Err(ToolError::InvalidConfig(errors)) => assert_eq!(errors.len(), 6),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn negative_counts_are_reported_with_other_errors() {
    let mut value = common::sample_config_json();
    value["headcount"][0]["count"] = json!(-1);
    value["headcount"][0]["hires_per_year"] = json!(-2);
    value["general"]["tax_rate"] = json!(2.0);
    let parsed: ModelConfig = serde_json::from_value(value).expect("config parsed");

    let report = config::validate(&parsed);
    let joined = report.errors.join("\n");
    assert_eq!(report.errors.len(), 3, "errors were: {joined}");
    assert!(joined.contains("headcount[0].count must not be negative, found -1"));
    assert!(joined.contains("headcount[0].hires_per_year must not be negative, found -2"));
    assert!(joined.contains("general.tax_rate"));
}

#[test]
fn projection_window_is_bounded() {
    let mut value = common::sample_config_json();
    value["general"]["projection_years"] = json!(0);
    let parsed: ModelConfig = serde_json::from_value(value).expect("config parsed");
    let report = config::validate(&parsed);
    assert!(
        report
            .errors
            .iter()
            .any(|error| error.contains("projection_years must be between 1 and 10"))
    );
    assert!(parsed.years().is_empty());

    let mut value = common::sample_config_json();
    value["general"]["projection_years"] = json!(-3);
    let parsed: ModelConfig = serde_json::from_value(value).expect("config parsed");
    let report = config::validate(&parsed);
    assert!(
        report
            .errors
            .iter()
            .any(|error| error.contains("between 1 and 10, found -3"))
    );
}

#[test]
fn load_validated_rejects_missing_and_invalid_files() {
    let temp_dir = tempdir().expect("temporary directory");
    let missing = temp_dir.path().join("nope.json");
    assert!(matches!(
        config::load_validated(&missing),
        Err(ToolError::MissingInput(path)) if path == missing
    ));

    let mut value = common::sample_config_json();
    value["general"]["projection_years"] = json!(11);
    let path = common::write_json(&temp_dir.path().join("bad.json"), &value);
    assert!(matches!(
        config::load_validated(&path),
        Err(ToolError::InvalidConfig(_))
    ));

    let good = common::write_sample_config(temp_dir.path());
    let loaded = config::load_validated(&good).expect("valid config loads");
    assert_eq!(loaded.general.company_name, "Acme Analytics");
}
