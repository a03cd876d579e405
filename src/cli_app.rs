//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use netrepo_synth::core::config::{Config, Overrides};
use netrepo_synth::core::errors::NrsError;
use netrepo_synth::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use netrepo_synth::plan::budget::{BudgetPlan, RandomSizes, plan};
use netrepo_synth::plan::policy::{ScaleLevel, SizePolicy, resolve};
use netrepo_synth::plan::small_files::{SmallFilePlan, plan_small_files};
use netrepo_synth::report::summary::{RunSummary, format_bytes};
use netrepo_synth::tree::builder::{
    BuildOptions, BuildReport, CreatedFile, CreatedKind, MB, TreeBuilder,
};

/// Synthetic managed-file repository generator.
#[derive(Debug, Parser)]
#[command(
    name = "nrs",
    author,
    version,
    about = "Generate a synthetic managed-file repository under size budgets",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Echo every created file to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Do not write the JSONL activity log.
    #[arg(long, global = true)]
    no_log: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Plan and write the repository tree.
    Generate(GenerateArgs),
    /// Compute and print the plan without touching the filesystem.
    Plan(PlanArgs),
    /// Show the size policy of every scale level.
    Levels,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Flag layer on top of config file and environment.
#[derive(Debug, Clone, Args, Default)]
struct OverrideArgs {
    /// Largest allowed single file, in MB.
    #[arg(long, value_name = "MB")]
    max_single_mb: Option<u64>,
    /// Budget for the whole tree, in MB.
    #[arg(long, value_name = "MB")]
    total_budget_mb: Option<u64>,
    /// Space reserved for small files before JSON blobs are planned, in MB.
    #[arg(long, value_name = "MB")]
    small_headroom_mb: Option<u64>,
    /// Scale level, 1 through 4.
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    level: Option<i64>,
    /// Root of the generated tree.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Seed for size draws; a random seed is picked and reported when omitted.
    #[arg(long, value_name = "N")]
    seed: Option<u64>,
}

impl OverrideArgs {
    fn to_overrides(&self) -> Overrides {
        Overrides {
            max_single_mb: self.max_single_mb,
            total_budget_mb: self.total_budget_mb,
            small_headroom_mb: self.small_headroom_mb,
            level: self.level,
            output_dir: self.output.clone(),
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct GenerateArgs {
    #[command(flatten)]
    overrides: OverrideArgs,
    /// Replace a non-empty output directory.
    #[arg(long)]
    force: bool,
    /// Bytes per planned MB. Lets tests build a scaled-down tree.
    #[arg(long, default_value_t = MB, hide = true, value_name = "BYTES")]
    unit_bytes: u64,
}

#[derive(Debug, Clone, Args)]
struct PlanArgs {
    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<NrsError> for CliError {
    fn from(err: NrsError) -> Self {
        if err.is_user_correctable() {
            Self::User(err.to_string())
        } else if matches!(err, NrsError::PlanInvariant { .. }) {
            Self::Internal(err.to_string())
        } else {
            Self::Runtime(err.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Generate(args) => run_generate(cli, args),
        Command::Plan(args) => run_plan(cli, args),
        Command::Levels => emit_levels(cli),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── commands ────────────────────

fn run_generate(cli: &Cli, args: &GenerateArgs) -> Result<(), CliError> {
    if args.unit_bytes == 0 {
        return Err(CliError::User("--unit-bytes must be greater than 0".to_string()));
    }
    let config = load_config(cli, &args.overrides)?;
    let mut log = open_log(cli, &config);
    let build = BuildOptions {
        root: config.generation.output_dir.clone(),
        unit_bytes: args.unit_bytes,
        force: args.force,
    };
    let outcome = match execute(cli, &config, Some(build), &mut log) {
        Ok(outcome) => outcome,
        Err(err) => {
            log_error(&mut log, &err);
            return Err(err.into());
        }
    };
    emit_summary(cli, "generate", &outcome)
}

fn run_plan(cli: &Cli, args: &PlanArgs) -> Result<(), CliError> {
    let config = load_config(cli, &args.overrides)?;
    let mut log = open_log(cli, &config);
    let outcome = match execute(cli, &config, None, &mut log) {
        Ok(outcome) => outcome,
        Err(err) => {
            log_error(&mut log, &err);
            return Err(err.into());
        }
    };
    emit_summary(cli, "plan", &outcome)
}

fn emit_levels(cli: &Cli) -> Result<(), CliError> {
    let policies: Vec<SizePolicy> = ScaleLevel::ALL.iter().map(|l| l.policy()).collect();
    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({ "levels": policies })),
        OutputMode::Human => {
            if cli.quiet {
                return Ok(());
            }
            let mut stdout = io::stdout().lock();
            writeln!(
                stdout,
                "{:<6} {:>6} {:>6}  {:<16}  {}",
                "Level", "Count", "Size", "CSV MB", "JSON blobs"
            )?;
            for p in &policies {
                writeln!(
                    stdout,
                    "{:<6} {:>5}x {:>5}%  {:<16}  {} x {}..={}MB",
                    p.level,
                    p.count_factor,
                    p.size_percent,
                    format!("{}/{}/{}", p.csv_preset[0], p.csv_preset[1], p.csv_preset[2]),
                    p.json.target_count,
                    p.json.min_mb,
                    p.json.max_mb
                )?;
            }
            Ok(())
        }
    }
}

// ──────────────────── pipeline ────────────────────

/// Everything one run produced, owned so a [`RunSummary`] can borrow it.
struct Outcome {
    output_dir: PathBuf,
    policy: SizePolicy,
    seed: u64,
    plan: BudgetPlan,
    small: SmallFilePlan,
    unit_bytes: u64,
    build: Option<BuildReport>,
}

impl Outcome {
    fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            output_dir: &self.output_dir,
            policy: &self.policy,
            seed: self.seed,
            plan: &self.plan,
            small: &self.small,
            unit_bytes: self.unit_bytes,
            build: self.build.as_ref(),
        }
    }
}

fn load_config(cli: &Cli, overrides: &OverrideArgs) -> Result<Config, CliError> {
    Config::load_layered(
        cli.config.as_deref(),
        Config::env_lookup,
        &overrides.to_overrides(),
    )
    .map_err(CliError::from)
}

fn open_log(cli: &Cli, config: &Config) -> JsonlWriter {
    if cli.no_log {
        JsonlWriter::disabled()
    } else {
        JsonlWriter::open(JsonlConfig::new(&config.paths.activity_log))
    }
}

/// Resolve, plan, and optionally build. `build` is `None` for plan-only runs.
fn execute(
    cli: &Cli,
    config: &Config,
    build: Option<BuildOptions>,
    log: &mut JsonlWriter,
) -> Result<Outcome, NrsError> {
    let policy = resolve(config.generation.level)?;
    let seed = config.generation.seed.unwrap_or_else(rand::random);

    let mut start = LogEntry::new(EventType::RunStart, Severity::Info);
    start.level = Some(policy.level.number());
    start.seed = Some(seed);
    start.path = Some(config.generation.output_dir.to_string_lossy().into_owned());
    start.details = Some(format!("config_hash={}", config.stable_hash()?));
    log.write_entry(&start);

    let mut sizes = RandomSizes::seeded(seed);
    let blobs = plan(&config.caps, policy.csv_preset, policy.json, &mut sizes)?;
    let small = plan_small_files(&policy, &mut sizes);

    let mut planned = LogEntry::new(EventType::PlanComputed, Severity::Info);
    planned.file_count = Some(blobs.assignments.len() + small.files.len());
    planned.planned_mb = Some(blobs.planned_total_mb());
    planned.budget_mb = Some(config.caps.total_budget_mb);
    log.write_entry(&planned);

    if blobs.headroom_overrun() {
        let mut overrun = LogEntry::new(EventType::HeadroomOverrun, Severity::Warning);
        overrun.planned_mb = Some(blobs.reserved_headroom_mb());
        overrun.budget_mb = Some(config.caps.small_headroom_mb);
        overrun.details = Some(format!(
            "csv blobs use {}MB of {}MB; no room left for JSON blobs",
            blobs.csv_total_mb(),
            config.caps.total_budget_mb
        ));
        log.write_entry(&overrun);
    }

    let unit_bytes = build.as_ref().map_or(MB, |b| b.unit_bytes);
    let report = match build {
        Some(options) => {
            let verbose = cli.verbose;
            let mut on_file = |file: &CreatedFile| {
                let mut entry = LogEntry::new(EventType::FileCreated, Severity::Info);
                entry.path = Some(file.path.to_string_lossy().into_owned());
                entry.size = Some(file.bytes);
                log.write_entry(&entry);
                if verbose {
                    let label = match file.kind {
                        CreatedKind::Small { kind } => kind.label(),
                        CreatedKind::Blob => "blob",
                    };
                    eprintln!(
                        "created {label:<8} {} ({})",
                        file.path.display(),
                        format_bytes(file.bytes)
                    );
                }
            };
            let report = TreeBuilder::new(options).build(&small, &blobs, &mut on_file)?;

            let mut done = LogEntry::new(EventType::BuildComplete, Severity::Info);
            done.path = Some(report.root.to_string_lossy().into_owned());
            done.file_count = Some(report.files_created());
            done.size = Some(report.on_disk_bytes);
            done.budget_mb = Some(config.caps.total_budget_mb);
            log.write_entry(&done);
            Some(report)
        }
        None => None,
    };
    log.flush();

    Ok(Outcome {
        output_dir: config.generation.output_dir.clone(),
        policy,
        seed,
        plan: blobs,
        small,
        unit_bytes,
        build: report,
    })
}

fn log_error(log: &mut JsonlWriter, err: &NrsError) {
    let mut entry = LogEntry::new(EventType::Error, Severity::Critical);
    entry.error_code = Some(err.code().to_string());
    entry.details = Some(err.to_string());
    log.write_entry(&entry);
    log.flush();
}

// ──────────────────── output ────────────────────

fn emit_summary(cli: &Cli, command: &str, outcome: &Outcome) -> Result<(), CliError> {
    let summary = outcome.summary();
    match output_mode(cli) {
        OutputMode::Json => write_json_line(&summary.to_json(command)),
        OutputMode::Human => {
            if cli.quiet {
                return Ok(());
            }
            let mut stdout = io::stdout().lock();
            for line in summary.format_human().lines() {
                if let Some(warning) = line.trim_start().strip_prefix("warning:") {
                    writeln!(stdout, "  {}{warning}", "warning:".yellow().bold())?;
                } else if line.starts_with("Repository") {
                    writeln!(stdout, "{}", line.bold())?;
                } else {
                    writeln!(stdout, "{line}")?;
                }
            }
            Ok(())
        }
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("NRS_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
