//! Run orchestration: case selection, session lifecycle and results

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use tracing::{error, info, warn};

use keyrun_common::{CaseResult, ExecutionFilter, RunSummary, StepRecord};

use crate::config::RunnerConfig;
use crate::error::RunResult;
use crate::executor::StepExecutor;
use crate::keywords::KeywordRegistry;
use crate::playwright::PlaywrightFactory;
use crate::report::{ReportSink, RunEvent};
use crate::screenshot::ScreenshotConfig;
use crate::selector::select_cases;
use crate::session::{SessionFactory, SessionGuard, SessionPolicy};

/// Executes the selected cases of a suite one after another
pub struct TestRunner {
    /// Source of browser sessions
    factory: Box<dyn SessionFactory>,

    /// Keyword dispatch table
    registry: KeywordRegistry,

    /// Page every case starts from
    base_url: String,

    session_policy: SessionPolicy,
    screenshots: ScreenshotConfig,

    /// Output directory for results
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a runner that drives Playwright
    pub fn new(config: &RunnerConfig, base_url: impl Into<String>) -> Self {
        let factory = PlaywrightFactory::new(config.playwright.clone());
        Self::with_factory(config, base_url, Box::new(factory))
    }

    /// Create a runner with a custom session source
    pub fn with_factory(
        config: &RunnerConfig,
        base_url: impl Into<String>,
        factory: Box<dyn SessionFactory>,
    ) -> Self {
        Self {
            factory,
            registry: KeywordRegistry::builtin(&config.keywords),
            base_url: base_url.into(),
            session_policy: config.session_policy,
            screenshots: config.screenshots.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn registry_mut(&mut self) -> &mut KeywordRegistry {
        &mut self.registry
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run every case selected by `filter`.
    ///
    /// An empty selection or a failure to open the shared session is
    /// returned as an error before any case runs. Case failures are part of
    /// the summary.
    pub async fn run(
        &self,
        records: &[StepRecord],
        filter: &ExecutionFilter,
        sink: &mut dyn ReportSink,
    ) -> RunResult<RunSummary> {
        let started_at = Local::now();
        let clock = Instant::now();

        info!(
            "Selecting cases with Execute={}, Priority={}",
            filter.execute, filter.priority
        );
        let case_ids = select_cases(records, filter)?;
        info!("Selected {} test case(s)", case_ids.len());

        let executor = StepExecutor::new(&self.registry, &self.base_url, &self.screenshots);
        let mut cases: Vec<CaseResult> = Vec::with_capacity(case_ids.len());

        match self.session_policy {
            SessionPolicy::PerRun => {
                let mut guard = SessionGuard::acquire(self.factory.as_ref()).await?;
                sink.emit(&RunEvent::SessionStarted {
                    cases: case_ids.clone(),
                });

                for case_id in &case_ids {
                    let result = executor
                        .run_case(guard.session(), case_id, records, sink)
                        .await;
                    cases.push(result);
                }

                if let Err(e) = guard.release().await {
                    warn!("Failed to close browser session: {}", e);
                }
            }
            SessionPolicy::PerCase => {
                sink.emit(&RunEvent::SessionStarted {
                    cases: case_ids.clone(),
                });

                for case_id in &case_ids {
                    let mut guard = match SessionGuard::acquire(self.factory.as_ref()).await {
                        Ok(guard) => guard,
                        Err(e) => {
                            error!("Could not open a browser session for {}: {}", case_id, e);
                            let reason = format!("Session could not be opened: {}", e);
                            cases.push(executor.fail_unstarted(case_id, &reason, sink));
                            continue;
                        }
                    };

                    let result = executor
                        .run_case(guard.session(), case_id, records, sink)
                        .await;
                    cases.push(result);

                    if let Err(e) = guard.release().await {
                        warn!("Failed to close browser session for {}: {}", case_id, e);
                    }
                }
            }
        }

        let summary = RunSummary::from_cases(cases, started_at, clock.elapsed().as_millis() as u64);
        sink.emit(&RunEvent::SessionFinished {
            passed: summary.passed,
            failed: summary.failed,
            skipped: summary.skipped,
            duration_ms: summary.duration_ms,
        });

        Ok(summary)
    }

    /// Write the summary to `<output_dir>/test-results.json`
    pub fn write_results(&self, summary: &RunSummary) -> RunResult<PathBuf> {
        write_results(summary, &self.output_dir)
    }
}

/// Write a run summary to `test-results.json` inside `output_dir`
pub fn write_results(summary: &RunSummary, output_dir: &Path) -> RunResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary::from_cases(Vec::new(), Local::now(), 0);

        let path = write_results(&summary, &dir.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap(), "test-results.json");

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total"], 0);
        assert!(json["cases"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_runner_uses_config() {
        let config = RunnerConfig {
            session_policy: SessionPolicy::PerCase,
            ..Default::default()
        };
        let mut runner = TestRunner::new(&config, "https://hire.example.com");
        assert_eq!(runner.base_url(), "https://hire.example.com");
        assert!(runner.registry_mut().resolve("VerifyText").is_some());
        assert_eq!(runner.session_policy, SessionPolicy::PerCase);
    }
}
