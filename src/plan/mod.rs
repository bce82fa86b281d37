//! Markdown business-plan draft built from the model config and any
//! consolidated research.
//!
//! The projections quoted here are straight-line compounding for prose only;
//! the spreadsheet model stays the source of truth.

use crate::config::{GrowthRate, ModelConfig};
use crate::research::ConsolidatedResearch;

/// Renders the full draft.
pub fn render_plan(config: &ModelConfig, research: Option<&ConsolidatedResearch>) -> String {
    let general = &config.general;
    let years = config.years();
    let first_year = years.first().copied().unwrap_or(general.start_year);
    let last_year = years.last().copied().unwrap_or(general.start_year);
    let currency = general.currency.as_str();

    let mut lines = vec![
        format!("# {} Business Plan (draft)", general.company_name),
        String::new(),
        format!(
            "_Figures in {currency}, projected over FY{first_year} to FY{last_year}. \
             The financial model workbook is authoritative._"
        ),
        String::new(),
    ];

    lines.extend(market_section(config));
    lines.extend(revenue_section(config, first_year, last_year));
    lines.extend(cost_section(config));
    lines.extend(team_section(config));
    lines.extend(funding_section(config));
    if let Some(research) = research {
        lines.extend(research_section(research));
    }

    let mut document = lines.join("\n");
    document.push('\n');
    document
}

fn market_section(config: &ModelConfig) -> Vec<String> {
    let currency = config.general.currency.as_str();
    let mut lines = vec!["## Market Opportunity".to_string(), String::new()];
    let sizes = [("TAM", config.tam), ("SAM", config.sam), ("SOM", config.som)];
    if sizes.iter().all(|(_, value)| value.is_none()) {
        lines.push("Market sizing has not been provided yet.".to_string());
        lines.push(String::new());
        return lines;
    }

    lines.push("| Measure | Value |".to_string());
    lines.push("|---|---|".to_string());
    for (label, value) in sizes {
        if let Some(value) = value {
            lines.push(format!("| {label} | {} |", format_amount(value, currency)));
        }
    }
    if let Some(share) = ratio(config.sam, config.tam) {
        lines.push(format!("| SAM / TAM | {} |", format_percent(share)));
    }
    if let Some(share) = ratio(config.som, config.sam) {
        lines.push(format!("| SOM / SAM | {} |", format_percent(share)));
    }
    lines.push(String::new());
    lines
}

fn revenue_section(config: &ModelConfig, first_year: i32, last_year: i32) -> Vec<String> {
    let currency = config.general.currency.as_str();
    let year_count = config.years().len();
    let mut lines = vec!["## Revenue Model".to_string(), String::new()];
    if config.revenue_streams.is_empty() {
        lines.push("No revenue streams are defined.".to_string());
        lines.push(String::new());
        return lines;
    }

    lines.push(format!("| Stream | FY{first_year} | FY{last_year} | Growth |"));
    lines.push("|---|---|---|---|".to_string());
    let mut first_total = 0.0;
    let mut last_total = 0.0;
    for stream in &config.revenue_streams {
        let final_value = project_value(stream.base_revenue, &stream.growth_rate, year_count);
        first_total += stream.base_revenue;
        last_total += final_value;
        lines.push(format!(
            "| {} | {} | {} | {} |",
            stream.name,
            format_amount(stream.base_revenue, currency),
            format_amount(final_value, currency),
            describe_growth(&stream.growth_rate)
        ));
    }
    lines.push(format!(
        "| **Total** | {} | {} | |",
        format_amount(first_total, currency),
        format_amount(last_total, currency)
    ));
    lines.push(String::new());
    lines
}

fn cost_section(config: &ModelConfig) -> Vec<String> {
    let currency = config.general.currency.as_str();
    let mut lines = vec!["## Cost Base".to_string(), String::new()];
    if config.fixed_costs.is_empty() {
        lines.push("No fixed costs are defined.".to_string());
        lines.push(String::new());
        return lines;
    }
    lines.push("| Cost | Annual amount | Growth |".to_string());
    lines.push("|---|---|---|".to_string());
    for (name, cost) in &config.fixed_costs {
        lines.push(format!(
            "| {name} | {} | {} |",
            format_amount(cost.amount(), currency),
            format_percent(cost.growth_rate())
        ));
    }
    lines.push(String::new());
    lines
}

fn team_section(config: &ModelConfig) -> Vec<String> {
    let currency = config.general.currency.as_str();
    let mut lines = vec!["## Team".to_string(), String::new()];
    if config.headcount.is_empty() {
        lines.push("No headcount plan is defined.".to_string());
        lines.push(String::new());
        return lines;
    }
    lines.push("| Role | Starting headcount | Hires / year | Salary |".to_string());
    lines.push("|---|---|---|---|".to_string());
    for role in &config.headcount {
        lines.push(format!(
            "| {} | {} | {} | {} |",
            role.role,
            role.count,
            role.hires_per_year,
            format_amount(role.annual_salary, currency)
        ));
    }
    lines.push(String::new());
    lines
}

fn funding_section(config: &ModelConfig) -> Vec<String> {
    let currency = config.general.currency.as_str();
    let mut lines = vec!["## Funding".to_string(), String::new()];
    if config.funding.is_empty() {
        lines.push("No funding rounds are planned.".to_string());
        lines.push(String::new());
        return lines;
    }
    lines.push("| Round | Year | Amount |".to_string());
    lines.push("|---|---|---|".to_string());
    let mut total = 0.0;
    for round in &config.funding {
        total += round.amount;
        lines.push(format!(
            "| {} | FY{} | {} |",
            round.round,
            round.year,
            format_amount(round.amount, currency)
        ));
    }
    lines.push(format!("| **Total** | | {} |", format_amount(total, currency)));
    lines.push(String::new());
    lines
}

fn research_section(research: &ConsolidatedResearch) -> Vec<String> {
    let mut lines = Vec::new();
    if !research.findings.is_empty() {
        lines.push("## Research Highlights".to_string());
        lines.push(String::new());
        for finding in &research.findings {
            let citation = finding
                .source_url
                .as_ref()
                .and_then(|url| research.sources.iter().position(|source| &source.url == url))
                .map(|index| format!(" [{}]", index + 1))
                .unwrap_or_default();
            lines.push(format!("- {}{citation}", finding.claim));
        }
        lines.push(String::new());
    }

    if !research.sources.is_empty() {
        lines.push("## Sources".to_string());
        lines.push(String::new());
        for (index, source) in research.sources.iter().enumerate() {
            let title = source.title.as_deref().unwrap_or(source.url.as_str());
            lines.push(format!("{}. [{title}]({})", index + 1, source.url));
        }
        lines.push(String::new());
    }
    lines
}

/// Value in the final projection year after compounding `growth`.
pub fn project_value(base: f64, growth: &GrowthRate, year_count: usize) -> f64 {
    (0..year_count.saturating_sub(1)).fold(base, |value, transition| {
        value * (1.0 + growth.rate_for(transition))
    })
}

fn describe_growth(growth: &GrowthRate) -> String {
    match growth {
        GrowthRate::Uniform(rate) => format!("{} / yr", format_percent(*rate)),
        GrowthRate::PerYear(rates) => rates
            .iter()
            .map(|rate| format_percent(*rate))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(numerator), Some(denominator)) if denominator > 0.0 => Some(numerator / denominator),
        _ => None,
    }
}

/// Whole-unit amount with thousands separators, e.g. `USD 1,250,000`.
pub fn format_amount(value: f64, currency: &str) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{currency} {sign}{grouped}")
}

/// Fraction rendered as a percentage with one decimal, e.g. `0.4 -> 40.0%`.
pub fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}
