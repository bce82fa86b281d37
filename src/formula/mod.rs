//! Translates a [`ModelConfig`] into sheets of literal and formula cells.
//!
//! Nothing is evaluated here. Every projected figure is a formula string that
//! the spreadsheet engine computes, so the layout constants below are the
//! contract between sheets: cross-sheet references are built from them.

use crate::config::ModelConfig;

// Sheet names, in workbook order.
pub const ASSUMPTIONS_SHEET: &str = "Assumptions";
pub const REVENUE_SHEET: &str = "Revenue";
pub const HEADCOUNT_SHEET: &str = "Headcount";
pub const COSTS_SHEET: &str = "Operating Costs";
pub const FUNDING_SHEET: &str = "Funding";
pub const SUMMARY_SHEET: &str = "Summary";

/// Zero-based column holding the first projection year (column C).
pub const FIRST_YEAR_COLUMN: usize = 2;

/// Column B holds every assumption value.
const VALUE_COLUMN: usize = 1;

// Assumptions sheet rows (1-based, row 1 is the header).
pub const COMPANY_ROW: usize = 2;
pub const CURRENCY_ROW: usize = 3;
pub const START_YEAR_ROW: usize = 4;
pub const PROJECTION_YEARS_ROW: usize = 5;
pub const TAX_RATE_ROW: usize = 6;
pub const TAM_ROW: usize = 7;
pub const SAM_ROW: usize = 8;
pub const SOM_ROW: usize = 9;
pub const SAM_SHARE_ROW: usize = 10;
pub const SOM_SHARE_ROW: usize = 11;

// Summary sheet rows.
pub const SUMMARY_REVENUE_ROW: usize = 2;
pub const SUMMARY_COSTS_ROW: usize = 3;
pub const SUMMARY_EBITDA_ROW: usize = 4;
pub const SUMMARY_TAX_ROW: usize = 5;
pub const SUMMARY_NET_INCOME_ROW: usize = 6;
pub const SUMMARY_FUNDING_ROW: usize = 7;
pub const SUMMARY_NET_CASH_FLOW_ROW: usize = 8;
pub const SUMMARY_ENDING_CASH_ROW: usize = 9;
pub const SUMMARY_SOM_SHARE_ROW: usize = 10;

/// A single cell as it will be written to the workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    /// Formula source including the leading `=`.
    Formula(String),
}

impl CellValue {
    /// Literal text cell.
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// Formula cell from a body without the leading `=`.
    pub fn formula(body: impl AsRef<str>) -> Self {
        CellValue::Formula(format!("={}", body.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// A sheet materialised as a grid of cells. Row 0 is always the header.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            rows: Vec::new(),
        }
    }

    /// 1-based number the next pushed row will get.
    pub fn next_row(&self) -> usize {
        self.rows.len() + 1
    }

    /// Appends a row and returns its 1-based row number.
    pub fn push_row(&mut self, row: Vec<CellValue>) -> usize {
        self.rows.push(row);
        self.rows.len()
    }

    /// Widest row in the sheet.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Number of rows, header included.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// A1-style range covering every written cell, e.g. `A1:G12`.
    pub fn extent(&self) -> String {
        let width = self.width().max(1);
        let height = self.height().max(1);
        format!("A1:{}", cell_ref(width - 1, height))
    }

    /// Looks a cell up by its A1 reference.
    pub fn cell(&self, reference: &str) -> Option<&CellValue> {
        let (column, row) = parse_cell_ref(reference)?;
        self.rows.get(row.checked_sub(1)?)?.get(column)
    }

    /// 1-based row whose first column carries `label`.
    pub fn find_row(&self, label: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| matches!(row.first(), Some(CellValue::Text(text)) if text == label))
            .map(|index| index + 1)
    }

    /// Non-empty cells with their A1 references, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (String, &CellValue)> {
        self.rows.iter().enumerate().flat_map(|(row_idx, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| !cell.is_empty())
                .map(move |(col_idx, cell)| (cell_ref(col_idx, row_idx + 1), cell))
        })
    }
}

/// Every sheet of a generated model, in workbook order.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookData {
    pub sheets: Vec<SheetTable>,
}

impl WorkbookData {
    /// Sheet by exact name.
    pub fn sheet(&self, name: &str) -> Option<&SheetTable> {
        self.sheets.iter().find(|sheet| sheet.sheet_name == name)
    }
}

/// Converts a zero-based column index into spreadsheet letters
/// (`0 -> A`, `25 -> Z`, `26 -> AA`).
pub fn column_letter(index: usize) -> String {
    let mut remaining = index + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        let offset = ((remaining - 1) % 26) as u8;
        letters.push(char::from(b'A' + offset));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Relative A1 reference for a zero-based column and 1-based row.
pub fn cell_ref(column: usize, row: usize) -> String {
    format!("{}{row}", column_letter(column))
}

/// Absolute (`$B$6`) reference for a zero-based column and 1-based row.
pub fn absolute_ref(column: usize, row: usize) -> String {
    format!("${}${row}", column_letter(column))
}

/// Splits an A1 reference (optionally with `$` anchors) into a zero-based
/// column and 1-based row.
pub fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let cleaned: String = reference.chars().filter(|ch| *ch != '$').collect();
    let split = cleaned.find(|ch: char| ch.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);
    if letters.is_empty() || !letters.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return None;
    }
    let mut column = 0usize;
    for ch in letters.chars() {
        column = column * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((column - 1, row))
}

/// Sheet qualifier for a cross-sheet reference. Names that are not plain
/// identifiers are quoted, with embedded quotes doubled.
pub fn sheet_prefix(sheet_name: &str) -> String {
    let plain = !sheet_name.is_empty()
        && !sheet_name.starts_with(|ch: char| ch.is_ascii_digit())
        && sheet_name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if plain {
        format!("{sheet_name}!")
    } else {
        format!("'{}'!", sheet_name.replace('\'', "''"))
    }
}

/// Renders a literal for inlining into a formula.
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

/// Generates the full model: assumptions, revenue, headcount, operating
/// costs, funding, and the summary that ties them together.
pub fn build_model(config: &ModelConfig) -> WorkbookData {
    let years = config.years();

    let (assumptions, growth_rows) = build_assumptions(config);
    let (revenue, revenue_total) = build_revenue(config, &years, &growth_rows.streams);
    let (headcount, payroll_total) = build_headcount(config, &years);
    let (costs, costs_total) = build_costs(config, &years, &growth_rows.costs, payroll_total);
    let (funding, funding_total) = build_funding(config, &years);
    let inputs = SummaryInputs {
        revenue_total,
        costs_total,
        funding_total,
    };
    let summary = build_summary(config, &years, inputs);

    WorkbookData {
        sheets: vec![assumptions, revenue, headcount, costs, funding, summary],
    }
}

struct GrowthRows {
    streams: Vec<usize>,
    costs: Vec<usize>,
}

struct SummaryInputs {
    revenue_total: usize,
    costs_total: usize,
    funding_total: usize,
}

fn build_assumptions(config: &ModelConfig) -> (SheetTable, GrowthRows) {
    let general = &config.general;
    let mut table = SheetTable::new(ASSUMPTIONS_SHEET);
    let optional = |value: Option<f64>| value.map(CellValue::Number).unwrap_or(CellValue::Empty);

    table.push_row(vec![CellValue::text("Assumption"), CellValue::text("Value")]);
    table.push_row(vec![
        CellValue::text("Company"),
        CellValue::text(general.company_name.clone()),
    ]);
    table.push_row(vec![
        CellValue::text("Currency"),
        CellValue::text(general.currency.clone()),
    ]);
    table.push_row(vec![
        CellValue::text("Start Year"),
        CellValue::Number(f64::from(general.start_year)),
    ]);
    table.push_row(vec![
        CellValue::text("Projection Years"),
        CellValue::Number(general.projection_years as f64),
    ]);
    table.push_row(vec![
        CellValue::text("Tax Rate"),
        CellValue::Number(general.tax_rate),
    ]);
    table.push_row(vec![CellValue::text("TAM"), optional(config.tam)]);
    table.push_row(vec![CellValue::text("SAM"), optional(config.sam)]);
    table.push_row(vec![CellValue::text("SOM"), optional(config.som)]);
    table.push_row(vec![
        CellValue::text("SAM / TAM"),
        share_formula(VALUE_COLUMN, SAM_ROW, TAM_ROW),
    ]);
    table.push_row(vec![
        CellValue::text("SOM / SAM"),
        share_formula(VALUE_COLUMN, SOM_ROW, SAM_ROW),
    ]);

    let streams = config
        .revenue_streams
        .iter()
        .map(|stream| {
            table.push_row(vec![
                CellValue::text(format!("Growth: {}", stream.name)),
                CellValue::Number(stream.growth_rate.first_rate()),
            ])
        })
        .collect();

    let costs = config
        .fixed_costs
        .iter()
        .map(|(name, cost)| {
            table.push_row(vec![
                CellValue::text(format!("Cost growth: {name}")),
                CellValue::Number(cost.growth_rate()),
            ])
        })
        .collect();

    (table, GrowthRows { streams, costs })
}

fn share_formula(column: usize, numerator_row: usize, denominator_row: usize) -> CellValue {
    let numerator = cell_ref(column, numerator_row);
    let denominator = cell_ref(column, denominator_row);
    CellValue::formula(format!("IF({denominator}=0,0,{numerator}/{denominator})"))
}

fn build_revenue(
    config: &ModelConfig,
    years: &[i32],
    growth_rows: &[usize],
) -> (SheetTable, usize) {
    let mut table = SheetTable::new(REVENUE_SHEET);
    table.push_row(header_row("Stream", "Growth", years));
    let assumptions = sheet_prefix(ASSUMPTIONS_SHEET);

    for (stream, growth_row) in config.revenue_streams.iter().zip(growth_rows) {
        let row = table.next_row();
        let mut cells = vec![
            CellValue::text(stream.name.clone()),
            CellValue::formula(format!(
                "{assumptions}{}",
                absolute_ref(VALUE_COLUMN, *growth_row)
            )),
        ];
        let growth_cell = format!("${}{row}", column_letter(VALUE_COLUMN));
        cells.extend(growth_chain(row, stream.base_revenue, years.len(), |transition| {
            if stream.growth_rate.is_uniform() || transition == 0 {
                growth_cell.clone()
            } else {
                format_number(stream.growth_rate.rate_for(transition))
            }
        }));
        table.push_row(cells);
    }

    let last_stream_row = table.height();
    let total = total_row("Total Revenue", years.len(), 2, last_stream_row);
    let total_row_number = table.push_row(total);
    (table, total_row_number)
}

fn build_headcount(config: &ModelConfig, years: &[i32]) -> (SheetTable, usize) {
    let mut table = SheetTable::new(HEADCOUNT_SHEET);
    table.push_row(header_row("Role", "Driver", years));

    let mut count_rows = Vec::with_capacity(config.headcount.len());
    for role in &config.headcount {
        let row = table.next_row();
        let mut cells = vec![
            CellValue::text(role.role.clone()),
            CellValue::Number(role.hires_per_year as f64),
            CellValue::Number(role.count as f64),
        ];
        for year in 1..years.len() {
            let previous = cell_ref(FIRST_YEAR_COLUMN + year - 1, row);
            cells.push(CellValue::formula(format!(
                "{previous}+${}{row}",
                column_letter(VALUE_COLUMN)
            )));
        }
        count_rows.push(table.push_row(cells));
    }
    let first_count = 2;
    let last_count = table.height();
    table.push_row(total_row(
        "Total Headcount",
        years.len(),
        first_count,
        last_count,
    ));

    let mut salary_rows = Vec::with_capacity(config.headcount.len());
    for role in &config.headcount {
        let row = table.next_row();
        let mut cells = vec![
            CellValue::text(format!("{} salary", role.role)),
            CellValue::Number(role.salary_growth),
        ];
        let growth_cell = format!("${}{row}", column_letter(VALUE_COLUMN));
        cells.extend(growth_chain(row, role.annual_salary, years.len(), |_| {
            growth_cell.clone()
        }));
        salary_rows.push(table.push_row(cells));
    }

    let first_cost = table.next_row();
    for (role, (count_row, salary_row)) in config
        .headcount
        .iter()
        .zip(count_rows.iter().zip(salary_rows.iter()))
    {
        let mut cells = vec![CellValue::text(format!("{} cost", role.role)), CellValue::Empty];
        for year in 0..years.len() {
            let column = FIRST_YEAR_COLUMN + year;
            cells.push(CellValue::formula(format!(
                "{}*{}",
                cell_ref(column, *count_row),
                cell_ref(column, *salary_row)
            )));
        }
        table.push_row(cells);
    }
    let last_cost = table.height();
    let payroll = table.push_row(total_row("Total Payroll", years.len(), first_cost, last_cost));
    (table, payroll)
}

fn build_costs(
    config: &ModelConfig,
    years: &[i32],
    growth_rows: &[usize],
    payroll_total: usize,
) -> (SheetTable, usize) {
    let mut table = SheetTable::new(COSTS_SHEET);
    table.push_row(header_row("Cost", "Growth", years));
    let assumptions = sheet_prefix(ASSUMPTIONS_SHEET);

    for ((name, cost), growth_row) in config.fixed_costs.iter().zip(growth_rows) {
        let row = table.next_row();
        let mut cells = vec![
            CellValue::text(name.clone()),
            CellValue::formula(format!(
                "{assumptions}{}",
                absolute_ref(VALUE_COLUMN, *growth_row)
            )),
        ];
        let growth_cell = format!("${}{row}", column_letter(VALUE_COLUMN));
        cells.extend(growth_chain(row, cost.amount(), years.len(), |_| {
            growth_cell.clone()
        }));
        table.push_row(cells);
    }

    let headcount = sheet_prefix(HEADCOUNT_SHEET);
    let mut payroll = vec![CellValue::text("Payroll"), CellValue::Empty];
    for year in 0..years.len() {
        payroll.push(CellValue::formula(format!(
            "{headcount}{}",
            cell_ref(FIRST_YEAR_COLUMN + year, payroll_total)
        )));
    }
    let payroll_row = table.push_row(payroll);

    let total = table.push_row(total_row("Total Costs", years.len(), 2, payroll_row));
    (table, total)
}

fn build_funding(config: &ModelConfig, years: &[i32]) -> (SheetTable, usize) {
    let mut table = SheetTable::new(FUNDING_SHEET);
    table.push_row(header_row("Round", "Year", years));

    for round in &config.funding {
        let mut cells = vec![
            CellValue::text(round.round.clone()),
            CellValue::Number(f64::from(round.year)),
        ];
        cells.extend(years.iter().map(|year| {
            if *year == round.year {
                CellValue::Number(round.amount)
            } else {
                CellValue::Number(0.0)
            }
        }));
        table.push_row(cells);
    }

    let last_round = table.height();
    let total = table.push_row(total_row("Total Funding", years.len(), 2, last_round));
    (table, total)
}

fn build_summary(config: &ModelConfig, years: &[i32], inputs: SummaryInputs) -> SheetTable {
    let mut table = SheetTable::new(SUMMARY_SHEET);
    table.push_row(header_row("Metric", "Unit", years));

    let currency = config.general.currency.as_str();
    let metrics = [
        (SUMMARY_REVENUE_ROW, "Revenue", currency),
        (SUMMARY_COSTS_ROW, "Operating Costs", currency),
        (SUMMARY_EBITDA_ROW, "EBITDA", currency),
        (SUMMARY_TAX_ROW, "Tax", currency),
        (SUMMARY_NET_INCOME_ROW, "Net Income", currency),
        (SUMMARY_FUNDING_ROW, "Funding", currency),
        (SUMMARY_NET_CASH_FLOW_ROW, "Net Cash Flow", currency),
        (SUMMARY_ENDING_CASH_ROW, "Ending Cash", currency),
        (SUMMARY_SOM_SHARE_ROW, "SOM Share", "%"),
    ];

    for (row, label, unit) in metrics {
        let mut cells = vec![CellValue::text(label), CellValue::text(unit)];
        for year in 0..years.len() {
            let column = FIRST_YEAR_COLUMN + year;
            cells.push(CellValue::formula(summary_formula(row, column, &inputs)));
        }
        table.push_row(cells);
    }

    table
}

fn summary_formula(row: usize, column: usize, inputs: &SummaryInputs) -> String {
    let assumptions = sheet_prefix(ASSUMPTIONS_SHEET);
    let here = |row: usize| cell_ref(column, row);
    match row {
        SUMMARY_REVENUE_ROW => format!(
            "{}{}",
            sheet_prefix(REVENUE_SHEET),
            here(inputs.revenue_total)
        ),
        SUMMARY_COSTS_ROW => format!("{}{}", sheet_prefix(COSTS_SHEET), here(inputs.costs_total)),
        SUMMARY_EBITDA_ROW => format!(
            "{}-{}",
            here(SUMMARY_REVENUE_ROW),
            here(SUMMARY_COSTS_ROW)
        ),
        SUMMARY_TAX_ROW => format!(
            "MAX(0,{})*{assumptions}{}",
            here(SUMMARY_EBITDA_ROW),
            absolute_ref(VALUE_COLUMN, TAX_RATE_ROW)
        ),
        SUMMARY_NET_INCOME_ROW => format!(
            "{}-{}",
            here(SUMMARY_EBITDA_ROW),
            here(SUMMARY_TAX_ROW)
        ),
        SUMMARY_FUNDING_ROW => format!(
            "{}{}",
            sheet_prefix(FUNDING_SHEET),
            here(inputs.funding_total)
        ),
        SUMMARY_NET_CASH_FLOW_ROW => format!(
            "{}+{}",
            here(SUMMARY_NET_INCOME_ROW),
            here(SUMMARY_FUNDING_ROW)
        ),
        SUMMARY_ENDING_CASH_ROW if column == FIRST_YEAR_COLUMN => here(SUMMARY_NET_CASH_FLOW_ROW),
        SUMMARY_ENDING_CASH_ROW => format!(
            "{}+{}",
            cell_ref(column - 1, SUMMARY_ENDING_CASH_ROW),
            here(SUMMARY_NET_CASH_FLOW_ROW)
        ),
        _ => {
            let som = absolute_ref(VALUE_COLUMN, SOM_ROW);
            format!(
                "IF({assumptions}{som}=0,0,{}/{assumptions}{som})",
                here(SUMMARY_REVENUE_ROW)
            )
        }
    }
}

fn header_row(first: &str, second: &str, years: &[i32]) -> Vec<CellValue> {
    let mut cells = vec![CellValue::text(first), CellValue::text(second)];
    cells.extend(years.iter().map(|year| CellValue::text(format!("FY{year}"))));
    cells
}

/// Year-one literal followed by `=<previous>*(1+<rate>)` for every later
/// year. `rate` receives the zero-based transition index.
fn growth_chain(
    row: usize,
    base: f64,
    year_count: usize,
    rate: impl Fn(usize) -> String,
) -> Vec<CellValue> {
    let mut cells = Vec::with_capacity(year_count);
    if year_count == 0 {
        return cells;
    }
    cells.push(CellValue::Number(base));
    for year in 1..year_count {
        let previous = cell_ref(FIRST_YEAR_COLUMN + year - 1, row);
        cells.push(CellValue::formula(format!(
            "{previous}*(1+{})",
            rate(year - 1)
        )));
    }
    cells
}

/// Labelled row of per-year `SUM` formulas. An empty block sums to a literal
/// zero rather than an inverted range.
fn total_row(label: &str, year_count: usize, first_row: usize, last_row: usize) -> Vec<CellValue> {
    let mut cells = vec![CellValue::text(label), CellValue::Empty];
    for year in 0..year_count {
        let column = FIRST_YEAR_COLUMN + year;
        if first_row > last_row {
            cells.push(CellValue::Number(0.0));
        } else {
            cells.push(CellValue::formula(format!(
                "SUM({}:{})",
                cell_ref(column, first_row),
                cell_ref(column, last_row)
            )));
        }
    }
    cells
}
