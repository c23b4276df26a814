//! keyrun test execution engine
//!
//! This crate runs keyword-driven UI test suites:
//! - Selects the cases to run from the Execute and Priority flags
//! - Dispatches each step's keyword to an action on a browser session
//! - Drives Playwright through an embedded Node driver
//! - Reports every case and step to the run log and a JSON summary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      keyrun runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── select_cases(records, filter) -> [CaseId]            │
//! │    ├── SessionGuard::acquire(factory) -> Session            │
//! │    ├── StepExecutor::run_case(session, case) -> CaseResult  │
//! │    └── write_results(summary) -> test-results.json          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  KeywordRegistry                                            │
//! │    ├── InputText     fill(locator, input)                   │
//! │    ├── Click         click(locator) [+ wait:<selector>]     │
//! │    ├── VerifyVisible expect_visible(locator)                │
//! │    ├── VerifyText    inner_text / expect_text               │
//! │    ├── Upload        upload_file(locator, path)             │
//! │    └── SelectOption  select_option(locator, value)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod keywords;
pub mod logging;
pub mod playwright;
pub mod report;
pub mod runner;
pub mod screenshot;
pub mod selector;
pub mod session;

pub use config::{load_base_url, RunnerConfig};
pub use error::{RunError, RunResult};
pub use executor::{CaseState, StepExecutor};
pub use keywords::{KeywordAction, KeywordRegistry, KeywordSettings};
pub use logging::{LogConfig, RunLog};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightFactory, PlaywrightSession};
pub use report::{LogSink, ReportSink, RunEvent, Tee};
pub use runner::{write_results, TestRunner};
pub use screenshot::{ScreenshotConfig, ScreenshotPolicy};
pub use selector::select_cases;
pub use session::{Session, SessionFactory, SessionGuard, SessionPolicy};
