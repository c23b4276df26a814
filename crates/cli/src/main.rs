//! keyrun CLI - Main Entry Point
//!
//! Runs a keyword-driven test suite against the configured application and
//! exits with 0 when every case passed, 1 when any case failed and 2 when
//! the run could not start.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use keyrun_common::{load_steps, ExecutionFilter, RunSummary};
use keyrun_runner::{
    load_base_url, Browser, LogSink, RunLog, RunnerConfig, ScreenshotPolicy, SessionPolicy, TestRunner,
};

mod output;

const EXIT_PASSED: u8 = 0;
const EXIT_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 2;

/// keyrun - Keyword-Driven UI Test Executor
#[derive(Parser, Debug)]
#[command(name = "keyrun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run only rows flagged Execute=Y when set to Y
    #[arg(long, default_value = "N", env = "KEYRUN_EXECUTE")]
    execute: String,

    /// Run only rows with this priority (All runs every priority)
    #[arg(long, default_value = "All", env = "KEYRUN_PRIORITY")]
    priority: String,

    /// Test suite workbook or CSV file
    #[arg(long)]
    data: Option<PathBuf>,

    /// Configuration file
    #[arg(long, default_value = "keyrun.yaml")]
    config: PathBuf,

    /// File holding the application base URL
    #[arg(long)]
    url_file: Option<PathBuf>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Screenshot policy (never, on-failure, always)
    #[arg(long)]
    screenshots: Option<ScreenshotPolicy>,

    /// Browser session lifetime (per-run, per-case)
    #[arg(long)]
    session_policy: Option<SessionPolicy>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn filter(&self) -> ExecutionFilter {
        ExecutionFilter::new(self.execute.trim(), self.priority.trim())
    }

    /// Configuration file values with flags applied on top
    fn resolve_config(&self) -> anyhow::Result<RunnerConfig> {
        let mut config = RunnerConfig::load_or_default(&self.config)
            .with_context(|| format!("invalid configuration file {}", self.config.display()))?;

        if let Some(data) = &self.data {
            config.data_file = data.clone();
        }
        if let Some(url_file) = &self.url_file {
            config.url_file = url_file.clone();
        }
        if let Some(browser) = self.browser {
            config.playwright.browser = browser;
        }
        if self.headed {
            config.playwright.headless = false;
        }
        if let Some(policy) = self.screenshots {
            config.screenshots.policy = policy;
        }
        if let Some(policy) = self.session_policy {
            config.session_policy = policy;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if self.verbose {
            config.logging.console_level = "debug".to_string();
        }

        Ok(config)
    }
}

fn exit_code(outcome: &anyhow::Result<RunSummary>) -> u8 {
    match outcome {
        Ok(summary) if summary.success() => EXIT_PASSED,
        Ok(_) => EXIT_FAILED,
        Err(_) => EXIT_FATAL,
    }
}

async fn execute(cli: &Cli, config: &RunnerConfig) -> anyhow::Result<RunSummary> {
    let filter = cli.filter();
    info!(
        "Starting test execution with Execute={}, Priority={}",
        filter.execute, filter.priority
    );

    let base_url = load_base_url(&config.url_file)?;
    info!("Base URL: {}", base_url);

    let records = load_steps(&config.data_file)
        .with_context(|| format!("cannot load test suite {}", config.data_file.display()))?;

    let runner = TestRunner::new(config, base_url);
    let summary = runner.run(&records, &filter, &mut LogSink).await?;

    if let Err(e) = runner.write_results(&summary) {
        error!("Failed to write results: {}", e);
    }
    Ok(summary)
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = cli.resolve_config()?;
    let log = RunLog::open(&config.logging).context("failed to initialize logging")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let outcome = runtime
        .block_on(execute(&cli, &config))
        .map(|mut summary| {
            summary.log_file = Some(log.path().to_path_buf());
            summary
        });

    let code = exit_code(&outcome);
    if let Err(e) = &outcome {
        error!("Test execution aborted: {:#}", e);
    }
    info!("Session exit status: {}", code);

    match outcome {
        Ok(summary) => {
            output::print_summary(&summary, cli.format);
            Ok(code)
        }
        Err(e) => Err(e),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(EXIT_FATAL)
        }
    }
}
