use std::path::PathBuf;

use bizplan_tools::audit::AuditReport;
use bizplan_tools::formula::CellValue;
use bizplan_tools::project::ProjectLayout;
use bizplan_tools::research::ConsolidatedResearch;
use bizplan_tools::workflow::{self, RunOptions, StageRun, WorkflowContext};
use bizplan_tools::{Result, ToolError, pipeline};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(cli.verbose).and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Config {
            command: ConfigCommand::Validate { config },
        } => execute_validate(config),
        Command::Model { command } => execute_model(command),
        Command::Audit(args) => execute_audit(args),
        Command::Research { command } => execute_research(command),
        Command::Plan {
            command: PlanCommand::Draft(args),
        } => execute_plan(args),
        Command::Publish(args) => execute_publish(args),
        Command::Workflow(args) => execute_workflow(args),
    }
}

fn execute_validate(config: PathBuf) -> Result<()> {
    let report = pipeline::validate_config(&config)?;
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    report.into_result()?;
    println!("config OK: {}", config.display());
    Ok(())
}

fn execute_model(command: ModelCommand) -> Result<()> {
    match command {
        ModelCommand::Build {
            config,
            output,
            project,
        } => {
            let layout = project.layout()?;
            let workbook = pipeline::build_model_file(&config, &output, layout.as_ref())?;
            println!(
                "wrote {} sheet(s) to {}",
                workbook.sheets.len(),
                output.display()
            );
            Ok(())
        }
        ModelCommand::Preview { config, sheet } => {
            let workbook = pipeline::generate_model(&config)?;
            let mut preview = serde_json::Map::new();
            for table in &workbook.sheets {
                if sheet.as_ref().is_some_and(|name| name != &table.sheet_name) {
                    continue;
                }
                let cells: Vec<Value> = table
                    .cells()
                    .map(|(reference, cell)| json!({ "cell": reference, "value": cell_preview(cell) }))
                    .collect();
                preview.insert(table.sheet_name.clone(), Value::Array(cells));
            }
            if let Some(name) = &sheet {
                if preview.is_empty() {
                    return Err(ToolError::InvalidWorkbook(format!(
                        "model has no sheet named '{name}'"
                    )));
                }
            }
            println!("{}", serde_json::to_string_pretty(&Value::Object(preview))?);
            Ok(())
        }
    }
}

fn cell_preview(cell: &CellValue) -> Value {
    match cell {
        CellValue::Empty => Value::Null,
        CellValue::Text(text) | CellValue::Formula(text) => Value::String(text.clone()),
        CellValue::Number(number) => json!(number),
    }
}

fn execute_audit(args: AuditArgs) -> Result<()> {
    let layout = args.project.layout()?;
    let report = pipeline::audit_model(&args.input, layout.as_ref())?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_audit(&report);
    }
    pipeline::require_clean(&report)
}

fn print_audit(report: &AuditReport) {
    println!(
        "scanned {} sheet(s), {} cell(s), {} formula(s)",
        report.sheets_scanned, report.cells_scanned, report.formulas_scanned
    );
    for finding in &report.findings {
        println!(
            "  {}!{}  {}  {}",
            finding.sheet, finding.cell, finding.kind, finding.detail
        );
    }
    if report.is_clean() {
        println!("no problems found");
    }
}

fn execute_research(command: ResearchCommand) -> Result<()> {
    match command {
        ResearchCommand::Consolidate { project, files } => {
            let layout = project.layout()?;
            let summary = pipeline::consolidate_research(&layout, &files)?;
            println!(
                "merged {} file(s): +{} source(s), +{} finding(s); {} source(s) total -> {}",
                summary.files,
                summary.stats.sources_added,
                summary.stats.findings_added,
                summary.total_sources,
                summary.output.display()
            );
            Ok(())
        }
        ResearchCommand::Summary { project, json } => {
            let layout = project.layout()?;
            let research = pipeline::load_research(&layout)?.unwrap_or_default();
            if json {
                println!("{}", serde_json::to_string_pretty(&research)?);
            } else {
                print_research(&research);
            }
            Ok(())
        }
    }
}

fn print_research(research: &ConsolidatedResearch) {
    println!(
        "{} topic(s), {} source(s), {} finding(s) from {} file(s)",
        research.topics.len(),
        research.sources.len(),
        research.findings.len(),
        research.ingested_files.len()
    );
    for (topic, sources) in research.sources_by_topic() {
        let heading = if topic.is_empty() { "(no topic)" } else { topic.as_str() };
        println!("{heading}:");
        for source in sources {
            match &source.title {
                Some(title) => println!("  - {title} <{}>", source.url),
                None => println!("  - {}", source.url),
            }
        }
    }
}

fn execute_plan(args: PlanArgs) -> Result<()> {
    let layout = args.project.layout()?;
    let path = pipeline::draft_plan(&args.config, &layout, args.output.as_deref())?;
    println!("plan drafted at {}", path.display());
    Ok(())
}

fn execute_publish(args: PublishArgs) -> Result<()> {
    let layout = args.project.layout()?;
    let (path, request) = pipeline::publish_payload(&args.config, &layout, args.spreadsheet_id)?;
    println!(
        "wrote {} range update(s) to {}",
        request.data.len(),
        path.display()
    );
    Ok(())
}

fn execute_workflow(args: WorkflowArgs) -> Result<()> {
    let layout = args.project.layout()?;
    let config = args
        .config
        .unwrap_or_else(|| layout.default_config_path());
    let context = WorkflowContext {
        layout,
        config,
        self_program: std::env::current_exe()?,
    };

    match args.command {
        WorkflowCommand::Status => {
            for line in workflow::status(&context.layout)? {
                let last = line
                    .last_run
                    .map(|entry| {
                        format!(
                            "  (last run {} at {})",
                            entry.status,
                            entry.finished_at.to_rfc3339()
                        )
                    })
                    .unwrap_or_default();
                println!("{} {:<8} {:<7}{last}", line.stage, line.name, line.status);
            }
            Ok(())
        }
        WorkflowCommand::Run {
            stage,
            force,
            dry_run,
        } => {
            let run = workflow::run_stage(&context, stage, RunOptions { force, dry_run })?;
            print_stage_run(&run);
            Ok(())
        }
        WorkflowCommand::Next { dry_run } => {
            let options = RunOptions {
                force: false,
                dry_run,
            };
            match workflow::run_next(&context, options)? {
                Some(run) => print_stage_run(&run),
                None => println!("all stages completed"),
            }
            Ok(())
        }
        WorkflowCommand::RunAll => {
            workflow::run_all_with(&context, print_stage_run)?;
            println!("all stages completed");
            Ok(())
        }
        WorkflowCommand::Reset => {
            if workflow::reset(&context.layout)? {
                println!("stage state cleared for {}", context.layout.name());
            } else {
                println!("no stage state to clear for {}", context.layout.name());
            }
            Ok(())
        }
    }
}

fn print_stage_run(run: &StageRun) {
    if run.dry_run {
        println!("stage {} ({}) would run:", run.stage, run.name);
        for step in &run.steps {
            println!("  {step}");
        }
        return;
    }
    println!("stage {} ({}) completed", run.stage, run.name);
    for artifact in &run.artifacts {
        println!("  artifact: {artifact}");
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Build, audit, and stage-gate startup financial models and business plans."
)]
struct Cli {
    /// Log at debug level. RUST_LOG takes precedence when set.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect model configs.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate the financial model workbook.
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },
    /// Scan a workbook for formula errors and broken references.
    Audit(AuditArgs),
    /// Gather research files into one deduplicated record.
    Research {
        #[command(subcommand)]
        command: ResearchCommand,
    },
    /// Draft business-plan documents.
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },
    /// Write the whole-range sync payload for the hosted spreadsheet.
    Publish(PublishArgs),
    /// Drive the stage-gated workflow.
    Workflow(WorkflowArgs),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Validate a model config and report every problem.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum ModelCommand {
    /// Write the model as an xlsx workbook.
    Build {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        output: PathBuf,

        #[command(flatten)]
        project: OptionalProjectArgs,
    },
    /// Print the generated cells as JSON.
    Preview {
        #[arg(long)]
        config: PathBuf,

        /// Only print this sheet.
        #[arg(long)]
        sheet: Option<String>,
    },
}

#[derive(clap::Args)]
struct AuditArgs {
    /// Workbook to audit.
    #[arg(long)]
    input: PathBuf,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    project: OptionalProjectArgs,
}

#[derive(Subcommand)]
enum ResearchCommand {
    /// Merge research files into the project's consolidated record.
    Consolidate {
        #[command(flatten)]
        project: ProjectArgs,

        /// Research JSON files to merge.
        files: Vec<PathBuf>,
    },
    /// Summarise the consolidated record.
    Summary {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Render the Markdown business-plan draft.
    Draft(PlanArgs),
}

#[derive(clap::Args)]
struct PlanArgs {
    #[arg(long)]
    config: PathBuf,

    /// Where to write the draft instead of the project's plan directory.
    #[arg(long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(clap::Args)]
struct PublishArgs {
    #[arg(long)]
    config: PathBuf,

    /// Target spreadsheet, carried in the payload for the sending client.
    #[arg(long)]
    spreadsheet_id: Option<String>,

    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(clap::Args)]
struct WorkflowArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Model config handed to the stages. Defaults to the project's
    /// config.json.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: WorkflowCommand,
}

#[derive(Subcommand)]
enum WorkflowCommand {
    /// Show which stages are done, ready, or blocked.
    Status,
    /// Run a single stage.
    Run {
        #[arg(long)]
        stage: u8,

        /// Run the stage again even if it already completed.
        #[arg(long)]
        force: bool,

        /// Print the resolved commands without running them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the lowest stage not yet completed.
    Next {
        #[arg(long)]
        dry_run: bool,
    },
    /// Run every remaining stage in order.
    RunAll,
    /// Forget all stage progress.
    Reset,
}

#[derive(clap::Args)]
struct ProjectArgs {
    /// Project name; working files live under <root>/.tmp/<project>/.
    #[arg(long)]
    project: String,

    #[arg(long, default_value = ".")]
    root: PathBuf,
}

impl ProjectArgs {
    fn layout(&self) -> Result<ProjectLayout> {
        ProjectLayout::new(self.root.clone(), &self.project)
    }
}

#[derive(clap::Args)]
struct OptionalProjectArgs {
    /// Project whose gates should record the outcome.
    #[arg(long)]
    project: Option<String>,

    #[arg(long, default_value = ".")]
    root: PathBuf,
}

impl OptionalProjectArgs {
    fn layout(&self) -> Result<Option<ProjectLayout>> {
        self.project
            .as_deref()
            .map(|name| ProjectLayout::new(self.root.clone(), name))
            .transpose()
    }
}
