//! parity - differential execution harness CLI
//!
//! Runs each artifact natively and through an alternate engine and reports
//! every case whose observable output differs.
//!
//! ## Commands
//!
//! - `run`: compare an explicit list of already-built artifacts
//! - `suite`: discover, build and compare the projects under a suite root

mod builder;
mod discovery;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use parity_core::{
    deliver, ComparisonPolicy, HarnessConfig, Orchestrator, ReportSink, SinkKind, TestRun,
    DEFAULT_COMPANION_NAME, DEFAULT_TIMEOUT_MS,
};
use tracing::{info, warn, Level};

use crate::builder::{build_all, CommandBuildProvider, DEFAULT_BUILD_TOOL};
use crate::discovery::{discover_solutions, filter_solutions};

#[derive(Parser)]
#[command(name = "parity")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Differential execution harness: native vs alternate engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare already-built artifacts
    Run {
        /// Alternate execution engine
        #[arg(long, env = "PARITY_ENGINE")]
        engine: PathBuf,

        #[command(flatten)]
        harness: HarnessArgs,

        /// Artifacts to run, in report order
        #[arg(required = true)]
        artifacts: Vec<PathBuf>,
    },

    /// Discover, build and compare every project under a suite root
    Suite {
        /// Suite root containing tests/NET and bin/
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Build configurations to run, in order
        #[arg(long = "config", default_values = ["debug", "release"])]
        configs: Vec<String>,

        /// Only run projects whose name matches (case-insensitive)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Build tool invoked as `<tool> /p:configuration=<config> <sln>`
        #[arg(long, env = "PARITY_BUILD_TOOL", default_value = DEFAULT_BUILD_TOOL)]
        build_tool: PathBuf,

        /// Alternate execution engine (default: <root>/bin/exe<config>/clr_console/clr_console.exe)
        #[arg(long, env = "PARITY_ENGINE")]
        engine: Option<PathBuf>,

        #[command(flatten)]
        harness: HarnessArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct HarnessArgs {
    /// Companion file that must sit next to each artifact
    #[arg(long, default_value = DEFAULT_COMPANION_NAME)]
    companion: String,

    /// Per-process timeout in milliseconds
    #[arg(long, env = "PARITY_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Maximum number of cases in flight (default: available parallelism)
    #[arg(long, env = "PARITY_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Treat an exit code difference as a failure
    #[arg(long)]
    strict_exit_code: bool,

    /// Report sinks to use (text, json)
    #[arg(long = "report", default_values = ["text"])]
    reports: Vec<String>,

    /// Write a JSON report to this file
    #[arg(long)]
    report_json: Option<PathBuf>,
}

impl HarnessArgs {
    fn harness_config(&self) -> HarnessConfig {
        let defaults = HarnessConfig::default();
        HarnessConfig {
            timeout_ms: self.timeout_ms,
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            companion_name: self.companion.clone(),
            policy: ComparisonPolicy {
                exit_code_fatal: self.strict_exit_code,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    parity_core::init_tracing(cli.json_logs, level);

    let success = match cli.command {
        Commands::Run {
            engine,
            harness,
            artifacts,
        } => cmd_run(&engine, &harness, &artifacts).await?,
        Commands::Suite {
            root,
            configs,
            filters,
            build_tool,
            engine,
            harness,
        } => {
            cmd_suite(
                &root,
                &configs,
                &filters,
                &build_tool,
                engine.as_deref(),
                &harness,
            )
            .await?
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Compare an explicit artifact list.
async fn cmd_run(engine: &Path, harness: &HarnessArgs, artifacts: &[PathBuf]) -> Result<bool> {
    let orchestrator = orchestrator_for(harness)?;
    let kinds = sink_kinds(&harness.reports, harness.report_json.clone())?;
    let artifacts = absolutize_all(artifacts)?;

    let run = run_with_sinks(&orchestrator, &artifacts, engine, kinds).await?;
    Ok(run.success)
}

/// Discover, build and compare, once per build configuration.
async fn cmd_suite(
    root: &Path,
    configs: &[String],
    filters: &[String],
    build_tool: &Path,
    engine: Option<&Path>,
    harness: &HarnessArgs,
) -> Result<bool> {
    let root = absolutize(root)?;
    let orchestrator = orchestrator_for(harness)?;
    // Fail on a bad --report value before spending time on builds.
    sink_kinds(&harness.reports, harness.report_json.clone())?;

    let solutions = filter_solutions(discover_solutions(&root)?, filters);
    if solutions.is_empty() {
        warn!(root = %root.display(), "no projects selected");
    }
    info!(count = solutions.len(), "Selected projects");

    let provider = CommandBuildProvider::new(build_tool);
    let multi = configs.len() > 1;
    let mut success = true;

    for config in configs {
        println!("== configuration: {} ==", config);

        let artifacts = build_all(&provider, &solutions, config)
            .await
            .with_context(|| format!("Build failed for configuration {}", config))?;
        let engine = resolve_engine(engine, &root, config)?;

        let report_json = harness
            .report_json
            .as_deref()
            .map(|path| report_path_for(path, config, multi));
        let kinds = sink_kinds(&harness.reports, report_json)?;

        let run = run_with_sinks(&orchestrator, &artifacts, &engine, kinds).await?;
        success &= run.success;
    }
    Ok(success)
}

fn orchestrator_for(harness: &HarnessArgs) -> Result<Orchestrator> {
    let orchestrator =
        Orchestrator::new(harness.harness_config()).context("Invalid harness configuration")?;
    let config = orchestrator.config();
    info!(
        timeout_ms = config.timeout_ms,
        concurrency = config.concurrency,
        companion = %config.companion_name,
        exit_code_fatal = config.policy.exit_code_fatal,
        "Harness configured"
    );

    let cancel = orchestrator.cancel_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining cases");
            cancel.cancel();
        }
    });
    Ok(orchestrator)
}

/// Run the suite through the first sink, then replay the finished run into
/// the others.
async fn run_with_sinks(
    orchestrator: &Orchestrator,
    artifacts: &[PathBuf],
    engine: &Path,
    kinds: Vec<SinkKind>,
) -> Result<TestRun> {
    let mut sinks: Vec<Box<dyn ReportSink>> = kinds.into_iter().map(SinkKind::into_sink).collect();
    let (first, rest) = sinks
        .split_first_mut()
        .context("At least one report sink is required")?;

    let run = orchestrator.run_suite(artifacts, engine, &mut **first).await?;
    for sink in rest {
        deliver(&run, &mut **sink).context("Failed to write report")?;
    }
    Ok(run)
}

/// Resolve `--report` names into sinks. `--report-json` implies a json sink.
fn sink_kinds(reports: &[String], report_json: Option<PathBuf>) -> Result<Vec<SinkKind>> {
    let mut kinds = Vec::new();
    for name in reports {
        let kind = SinkKind::parse(name, report_json.clone())?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if let Some(path) = report_json {
        let json = SinkKind::Json { path };
        if !kinds.contains(&json) {
            kinds.push(json);
        }
    }
    if kinds.is_empty() {
        bail!("No report sink selected");
    }
    Ok(kinds)
}

/// `report.json` becomes `report-<config>.json` when several configurations
/// share one report path.
fn report_path_for(path: &Path, config: &str, multi: bool) -> PathBuf {
    if !multi {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "json".to_string());
    path.with_file_name(format!("{}-{}.{}", stem, config, ext))
}

fn resolve_engine(explicit: Option<&Path>, root: &Path, config: &str) -> Result<PathBuf> {
    let engine = match explicit {
        Some(path) => absolutize(path)?,
        None => root
            .join("bin")
            .join(format!("exe{}", config))
            .join("clr_console")
            .join("clr_console.exe"),
    };
    if !engine.is_file() {
        bail!("Alternate engine not found at {}", engine.display());
    }
    Ok(engine)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

fn absolutize_all(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| absolutize(p)).collect()
}
