#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use bizplan_tools::config::ModelConfig;
use serde_json::{Value, json};

pub fn sample_config_json() -> Value {
    json!({
        "general": {
            "company_name": "Acme Analytics",
            "currency": "USD",
            "start_year": 2025,
            "projection_years": 5,
            "tax_rate": 0.25
        },
        "revenue_streams": [
            { "name": "Subscriptions", "base_revenue": 120000, "growth_rate": 0.5 },
            { "name": "Services", "base_revenue": 30000, "growth_rate": [0.2, 0.1] }
        ],
        "fixed_costs": {
            "rent": 24000,
            "software": { "amount": 6000, "growth_rate": 0.1 }
        },
        "headcount": [
            {
                "role": "Engineer",
                "count": 2,
                "annual_salary": 90000,
                "hires_per_year": 1,
                "salary_growth": 0.03
            }
        ],
        "funding": [
            { "round": "Seed", "amount": 500000, "year": 2025 }
        ],
        "tam": 5000000000.0,
        "sam": 500000000.0,
        "som": 5000000.0
    })
}

pub fn sample_config() -> ModelConfig {
    serde_json::from_value(sample_config_json()).expect("sample config deserialises")
}

pub fn write_json(path: &Path, value: &Value) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory");
    }
    fs::write(path, serde_json::to_string_pretty(value).expect("json")).expect("file written");
    path.to_path_buf()
}

pub fn write_sample_config(dir: &Path) -> PathBuf {
    write_json(&dir.join("config.json"), &sample_config_json())
}
