//! Scripted in-memory browser for driving the runner without Playwright

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use keyrun_common::{ExecutionFilter, RunSummary, StepRecord};
use keyrun_runner::{
    RunError, RunEvent, RunResult, RunnerConfig, ScreenshotPolicy, Session, SessionFactory, TestRunner,
};

/// What the fake page looks like
#[derive(Debug, Default)]
pub struct Page {
    /// Inner text per locator
    pub texts: HashMap<String, String>,
    /// Locators that do not resolve to an element
    pub missing: HashSet<String>,
    /// `<select>` option values per locator
    pub options: HashMap<String, Vec<String>>,
    /// Locators whose text changes after the first read
    pub drifting: HashSet<String>,
    pub fail_goto: bool,
}

#[derive(Debug, Default)]
pub struct BrowserState {
    pub page: Page,
    pub calls: Vec<String>,
    pub opened: usize,
    pub closed: usize,
    /// 1-based open attempts that fail
    pub failing_opens: Vec<usize>,
    attempts: usize,
}

/// Shared handle to the fake browser; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<BrowserState>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, locator: &str, text: &str) -> Self {
        self.state().page.texts.insert(locator.to_string(), text.to_string());
        self
    }

    pub fn with_missing(self, locator: &str) -> Self {
        self.state().page.missing.insert(locator.to_string());
        self
    }

    pub fn with_options(self, locator: &str, values: &[&str]) -> Self {
        self.state().page.options.insert(
            locator.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn with_text_drift(self, locator: &str) -> Self {
        self.state().page.drifting.insert(locator.to_string());
        self
    }

    pub fn failing_goto(self) -> Self {
        self.state().page.fail_goto = true;
        self
    }

    pub fn failing_open(self, attempt: usize) -> Self {
        self.state().failing_opens.push(attempt);
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.state().calls.iter().any(|c| c == call)
    }

    pub fn factory(&self) -> Box<dyn SessionFactory> {
        Box::new(FakeFactory {
            browser: self.clone(),
        })
    }
}

pub struct FakeFactory {
    browser: FakeBrowser,
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> RunResult<Box<dyn Session>> {
        let mut state = self.browser.state();
        state.attempts += 1;
        if state.failing_opens.contains(&state.attempts) {
            return Err(RunError::Playwright("browser crashed on launch".to_string()));
        }
        state.opened += 1;
        Ok(Box::new(FakeSession {
            browser: self.browser.clone(),
        }))
    }
}

pub struct FakeSession {
    browser: FakeBrowser,
}

impl FakeSession {
    fn record(&self, call: String) {
        self.browser.state().calls.push(call);
    }

    fn find(&self, locator: &str) -> RunResult<()> {
        if self.browser.state().page.missing.contains(locator) {
            return Err(RunError::Playwright(format!("no element matches '{}'", locator)));
        }
        Ok(())
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Session for FakeSession {
    async fn goto(&mut self, url: &str) -> RunResult<()> {
        self.record(format!("goto {}", url));
        if self.browser.state().page.fail_goto {
            return Err(RunError::Playwright("net::ERR_CONNECTION_REFUSED".to_string()));
        }
        Ok(())
    }

    async fn fill(&mut self, locator: &str, text: &str) -> RunResult<()> {
        self.record(format!("fill {}={}", locator, text));
        self.find(locator)
    }

    async fn click(&mut self, locator: &str) -> RunResult<()> {
        self.record(format!("click {}", locator));
        self.find(locator)
    }

    async fn wait_for_selector(&mut self, locator: &str, _timeout: Duration) -> RunResult<()> {
        self.record(format!("wait {}", locator));
        self.find(locator).map_err(|_| RunError::Timeout(locator.to_string()))
    }

    async fn expect_visible(&mut self, locator: &str, _timeout: Duration) -> RunResult<()> {
        self.record(format!("visible {}", locator));
        self.find(locator)
            .map_err(|_| RunError::AssertionFailed(format!("'{}' is not visible", locator)))
    }

    async fn inner_text(&mut self, locator: &str) -> RunResult<String> {
        self.record(format!("text {}", locator));
        self.find(locator)?;
        Ok(self
            .browser
            .state()
            .page
            .texts
            .get(locator)
            .cloned()
            .unwrap_or_default())
    }

    async fn expect_text(&mut self, locator: &str, expected: &str, _timeout: Duration) -> RunResult<()> {
        self.record(format!("expect_text {}={}", locator, expected));
        if self.browser.state().page.drifting.contains(locator) {
            return Err(RunError::Timeout("text changed".to_string()));
        }
        let actual = self.browser.state().page.texts.get(locator).cloned().unwrap_or_default();
        if normalize(&actual).contains(&normalize(expected)) {
            Ok(())
        } else {
            Err(RunError::Timeout(format!("text '{}' in {}", expected, locator)))
        }
    }

    async fn upload_file(&mut self, locator: &str, path: &Path) -> RunResult<()> {
        self.record(format!("upload {}={}", locator, path.display()));
        self.find(locator)
    }

    async fn select_option(&mut self, locator: &str, value: &str) -> RunResult<()> {
        self.record(format!("select {}={}", locator, value));
        self.find(locator)?;
        let known = self
            .browser
            .state()
            .page
            .options
            .get(locator)
            .map(|values| values.iter().any(|v| v == value))
            .unwrap_or(false);
        if !known {
            return Err(RunError::Playwright(format!("option '{}' not found in {}", value, locator)));
        }
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> RunResult<()> {
        self.record(format!(
            "screenshot {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        std::fs::write(path, b"\x89PNG")?;
        Ok(())
    }

    async fn close(&mut self) -> RunResult<()> {
        self.record("close".to_string());
        self.browser.state().closed += 1;
        Ok(())
    }
}

/// Runner configuration writing everything below `dir`, screenshots off
pub fn test_config(dir: &Path) -> RunnerConfig {
    let mut config = RunnerConfig {
        output_dir: dir.join("test-results"),
        ..Default::default()
    };
    config.screenshots.policy = ScreenshotPolicy::Never;
    config.screenshots.dir = dir.join("screenshots");
    config
}

pub const BASE_URL: &str = "https://hire.example.com/login";

/// Run `records` against `browser`, returning the outcome and every event
pub async fn run_suite(
    config: &RunnerConfig,
    browser: &FakeBrowser,
    records: &[StepRecord],
    filter: &ExecutionFilter,
) -> (RunResult<RunSummary>, Vec<RunEvent>) {
    let runner = TestRunner::with_factory(config, BASE_URL, browser.factory());
    let mut events: Vec<RunEvent> = Vec::new();
    let outcome = runner.run(records, filter, &mut events).await;
    (outcome, events)
}

pub fn screenshot_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
