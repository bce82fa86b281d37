use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, ToolError};

/// Currency used when the config does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";
/// Number of projected years when the config does not say otherwise.
pub const DEFAULT_PROJECTION_YEARS: i64 = 5;
/// Upper bound on the projection window.
pub const MAX_PROJECTION_YEARS: i64 = 10;

/// Financial model inputs as written by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub general: General,
    #[serde(default)]
    pub revenue_streams: Vec<RevenueStream>,
    #[serde(default)]
    pub fixed_costs: BTreeMap<String, FixedCost>,
    #[serde(default)]
    pub headcount: Vec<Role>,
    #[serde(default)]
    pub funding: Vec<FundingRound>,
    #[serde(default)]
    pub tam: Option<f64>,
    #[serde(default)]
    pub sam: Option<f64>,
    #[serde(default)]
    pub som: Option<f64>,
}

/// Company-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct General {
    pub company_name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub start_year: i32,
    #[serde(default = "default_projection_years")]
    pub projection_years: i64,
    #[serde(default)]
    pub tax_rate: f64,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_projection_years() -> i64 {
    DEFAULT_PROJECTION_YEARS
}

/// A revenue line projected from its year-one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueStream {
    pub name: String,
    pub base_revenue: f64,
    #[serde(default)]
    pub growth_rate: GrowthRate,
}

/// Year-over-year growth, either one rate for every year or one per
/// transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GrowthRate {
    Uniform(f64),
    PerYear(Vec<f64>),
}

impl Default for GrowthRate {
    fn default() -> Self {
        GrowthRate::Uniform(0.0)
    }
}

impl GrowthRate {
    /// Rate applied when moving from year `transition` to `transition + 1`
    /// (zero based). Short per-year lists repeat their last entry.
    pub fn rate_for(&self, transition: usize) -> f64 {
        match self {
            GrowthRate::Uniform(rate) => *rate,
            GrowthRate::PerYear(rates) => rates
                .get(transition)
                .or_else(|| rates.last())
                .copied()
                .unwrap_or(0.0),
        }
    }

    /// Rate of the first transition, which is the one surfaced on the
    /// assumptions sheet.
    pub fn first_rate(&self) -> f64 {
        self.rate_for(0)
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, GrowthRate::Uniform(_))
    }

    fn rates(&self) -> Vec<f64> {
        match self {
            GrowthRate::Uniform(rate) => vec![*rate],
            GrowthRate::PerYear(rates) => rates.clone(),
        }
    }
}

/// Fixed cost entry. A bare number is an annual amount with no growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixedCost {
    Amount(f64),
    Detailed {
        amount: f64,
        #[serde(default)]
        growth_rate: f64,
    },
}

impl FixedCost {
    /// Annual amount in the first projected year.
    pub fn amount(&self) -> f64 {
        match self {
            FixedCost::Amount(amount) => *amount,
            FixedCost::Detailed { amount, .. } => *amount,
        }
    }

    /// Yearly growth; zero for the bare-number form.
    pub fn growth_rate(&self) -> f64 {
        match self {
            FixedCost::Amount(_) => 0.0,
            FixedCost::Detailed { growth_rate, .. } => *growth_rate,
        }
    }
}

/// Headcount plan for a single role. Counts are signed so a negative value
/// reaches [`validate`] instead of failing deserialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub role: String,
    pub count: i64,
    pub annual_salary: f64,
    #[serde(default)]
    pub hires_per_year: i64,
    #[serde(default)]
    pub salary_growth: f64,
}

/// A funding round landing in a given calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRound {
    pub round: String,
    pub amount: f64,
    pub year: i32,
}

impl ModelConfig {
    /// Calendar years covered by the projection, in column order. Empty when
    /// the window is outside `1..=MAX_PROJECTION_YEARS`.
    pub fn years(&self) -> Vec<i32> {
        if !self.has_valid_window() {
            return Vec::new();
        }
        let start = self.general.start_year;
        (0..self.general.projection_years)
            .map(|offset| start + offset as i32)
            .collect()
    }

    fn has_valid_window(&self) -> bool {
        (1..=MAX_PROJECTION_YEARS).contains(&self.general.projection_years)
    }

    /// Sum of every stream's year-one revenue.
    pub fn year_one_revenue(&self) -> f64 {
        self.revenue_streams
            .iter()
            .map(|stream| stream.base_revenue)
            .sum()
    }
}

/// Outcome of validating a config: hard errors abort, warnings are logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Turns a failing report into [`ToolError::InvalidConfig`].
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ToolError::InvalidConfig(self.errors))
        }
    }
}

/// Reads a config file without validating it.
pub fn load_config(path: &Path) -> Result<ModelConfig> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let source = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&source)?)
}

/// Reads a config file and refuses it when validation reports errors.
/// Warnings are logged and otherwise ignored.
pub fn load_validated(path: &Path) -> Result<ModelConfig> {
    let config = load_config(path)?;
    for message in validate(&config).into_result()? {
        warn!(config = %path.display(), "{message}");
    }
    Ok(config)
}

/// Checks the config for values the model generator cannot use. Every
/// problem is collected so the user sees them all at once.
pub fn validate(config: &ModelConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let general = &config.general;

    if general.company_name.trim().is_empty() {
        report.error("general.company_name must not be blank");
    }
    if general.currency.trim().is_empty() {
        report.error("general.currency must not be blank");
    }
    if !(1900..=2200).contains(&general.start_year) {
        report.error(format!(
            "general.start_year {} is outside 1900..=2200",
            general.start_year
        ));
    }
    if !config.has_valid_window() {
        report.error(format!(
            "general.projection_years must be between 1 and {MAX_PROJECTION_YEARS}, found {}",
            general.projection_years
        ));
    }
    if !(0.0..=1.0).contains(&general.tax_rate) {
        report.error(format!(
            "general.tax_rate must be a fraction between 0 and 1, found {}",
            general.tax_rate
        ));
    }

    if config.revenue_streams.is_empty() {
        report.warning("no revenue streams defined; revenue will be zero");
    }
    for (index, stream) in config.revenue_streams.iter().enumerate() {
        let label = format!("revenue_streams[{index}]");
        if stream.name.trim().is_empty() {
            report.error(format!("{label}.name must not be blank"));
        }
        check_amount(&mut report, &format!("{label}.base_revenue"), stream.base_revenue);
        if matches!(&stream.growth_rate, GrowthRate::PerYear(rates) if rates.is_empty()) {
            report.error(format!("{label}.growth_rate list must not be empty"));
        }
        for rate in stream.growth_rate.rates() {
            check_rate(&mut report, &format!("{label}.growth_rate"), rate);
        }
    }

    for (name, cost) in &config.fixed_costs {
        let label = format!("fixed_costs.{name}");
        if name.trim().is_empty() {
            report.error("fixed_costs keys must not be blank");
        }
        check_amount(&mut report, &format!("{label}.amount"), cost.amount());
        check_rate(&mut report, &format!("{label}.growth_rate"), cost.growth_rate());
    }

    for (index, role) in config.headcount.iter().enumerate() {
        let label = format!("headcount[{index}]");
        if role.role.trim().is_empty() {
            report.error(format!("{label}.role must not be blank"));
        }
        if role.count < 0 {
            report.error(format!("{label}.count must not be negative, found {}", role.count));
        }
        if role.hires_per_year < 0 {
            report.error(format!(
                "{label}.hires_per_year must not be negative, found {}",
                role.hires_per_year
            ));
        }
        check_amount(&mut report, &format!("{label}.annual_salary"), role.annual_salary);
        check_rate(&mut report, &format!("{label}.salary_growth"), role.salary_growth);
    }

    let years = config.years();
    for (index, round) in config.funding.iter().enumerate() {
        let label = format!("funding[{index}]");
        if round.round.trim().is_empty() {
            report.error(format!("{label}.round must not be blank"));
        }
        check_amount(&mut report, &format!("{label}.amount"), round.amount);
        if round.amount == 0.0 {
            report.warning(format!("{label} '{}' raises nothing", round.round));
        }
        if !years.is_empty() && !years.contains(&round.year) {
            report.error(format!(
                "{label}.year {} is outside the projection window {}..={}",
                round.year,
                years[0],
                years[years.len() - 1]
            ));
        }
    }

    for (key, value) in [("tam", config.tam), ("sam", config.sam), ("som", config.som)] {
        if let Some(value) = value {
            check_amount(&mut report, key, value);
        }
    }
    let ordered = [("tam", config.tam), ("sam", config.sam), ("som", config.som)];
    for (outer_index, (outer, outer_value)) in ordered.iter().enumerate() {
        for (inner, inner_value) in ordered.iter().skip(outer_index + 1) {
            if let (Some(outer_value), Some(inner_value)) = (outer_value, inner_value) {
                if inner_value > outer_value {
                    report.error(format!(
                        "{inner} ({inner_value}) must not exceed {outer} ({outer_value})"
                    ));
                }
            }
        }
    }
    if let Some(som) = config.som {
        let year_one = config.year_one_revenue();
        if year_one > 0.0 && som > year_one * 1000.0 {
            report.warning(format!(
                "som ({som}) is more than 1000x year-one revenue ({year_one})"
            ));
        }
    }

    report
}

fn check_amount(report: &mut ValidationReport, label: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        report.error(format!("{label} must be a non-negative number, found {value}"));
    }
}

fn check_rate(report: &mut ValidationReport, label: &str, value: f64) {
    if !value.is_finite() || value <= -1.0 {
        report.error(format!("{label} must be greater than -1, found {value}"));
    }
}
