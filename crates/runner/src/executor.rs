//! Per-case step execution
//!
//! A case moves `Pending -> Running -> {Passed, Failed}`, or straight from
//! `Pending` to `Skipped` when it has no steps. Steps run in ascending step
//! order and the first failure stops the case.

use std::time::Instant;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use keyrun_common::{CaseId, CaseResult, CaseStatus, StepRecord, StepResult, StepStatus};

use crate::error::{RunError, RunResult};
use crate::keywords::KeywordRegistry;
use crate::report::{ReportSink, RunEvent};
use crate::screenshot::{self, ScreenshotConfig};
use crate::session::Session;

/// Lifecycle state of one case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl CaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseState::Passed | CaseState::Failed | CaseState::Skipped)
    }

    /// Validate a move to `next`
    pub fn transition(self, next: CaseState) -> RunResult<CaseState> {
        use CaseState::*;

        match (self, next) {
            (Pending, Running) | (Pending, Skipped) | (Pending, Failed) => Ok(next),
            (Running, Passed) | (Running, Failed) => Ok(next),
            _ => Err(RunError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            }),
        }
    }

    fn status(&self) -> Option<CaseStatus> {
        match self {
            CaseState::Passed => Some(CaseStatus::Passed),
            CaseState::Failed => Some(CaseStatus::Failed),
            CaseState::Skipped => Some(CaseStatus::Skipped),
            CaseState::Pending | CaseState::Running => None,
        }
    }
}

impl std::fmt::Display for CaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseState::Pending => write!(f, "PENDING"),
            CaseState::Running => write!(f, "RUNNING"),
            CaseState::Passed => write!(f, "PASSED"),
            CaseState::Failed => write!(f, "FAILED"),
            CaseState::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Steps of one case in execution order.
///
/// The sort is stable, so duplicate step numbers keep their input order.
pub fn case_steps<'r>(records: &'r [StepRecord], case_id: &CaseId) -> Vec<&'r StepRecord> {
    let mut steps: Vec<&StepRecord> = records
        .iter()
        .filter(|r| r.case_id.as_ref() == Some(case_id))
        .collect();
    steps.sort_by(|a, b| a.step_no.cmp(&b.step_no));

    for pair in steps.windows(2) {
        if pair[0].step_no == pair[1].step_no {
            warn!(
                "Case {} has duplicate step {} (rows {} and {}); keeping input order",
                case_id, pair[0].step_no, pair[0].row, pair[1].row
            );
        }
    }
    steps
}

/// Bookkeeping for the case being executed
struct CaseRun {
    case_id: CaseId,
    state: CaseState,
    started_at: DateTime<Local>,
    clock: Instant,
    steps: Vec<StepResult>,
    error: Option<String>,
}

impl CaseRun {
    fn new(case_id: CaseId) -> Self {
        Self {
            case_id,
            state: CaseState::Pending,
            started_at: Local::now(),
            clock: Instant::now(),
            steps: Vec::new(),
            error: None,
        }
    }

    fn enter(&mut self, next: CaseState) -> RunResult<()> {
        self.state = self.state.transition(next)?;
        debug!("Case {} is {}", self.case_id, self.state);
        Ok(())
    }

    fn fail(&mut self, message: String) -> RunResult<()> {
        self.error = Some(message);
        self.enter(CaseState::Failed)
    }

    fn finish(self, sink: &mut dyn ReportSink) -> CaseResult {
        let status = self.state.status().unwrap_or(CaseStatus::Failed);
        let duration_ms = self.clock.elapsed().as_millis() as u64;

        sink.emit(&RunEvent::CaseFinished {
            case_id: self.case_id.clone(),
            status,
            duration_ms,
        });

        CaseResult {
            case_id: self.case_id,
            status,
            started_at: self.started_at,
            duration_ms,
            steps: self.steps,
            error: self.error,
        }
    }
}

/// Runs the steps of one case against a live session
pub struct StepExecutor<'a> {
    registry: &'a KeywordRegistry,
    base_url: &'a str,
    screenshots: &'a ScreenshotConfig,
}

impl<'a> StepExecutor<'a> {
    pub fn new(registry: &'a KeywordRegistry, base_url: &'a str, screenshots: &'a ScreenshotConfig) -> Self {
        Self {
            registry,
            base_url,
            screenshots,
        }
    }

    /// Execute one case. Failures end up in the result, never in the caller.
    pub async fn run_case(
        &self,
        session: &mut dyn Session,
        case_id: &CaseId,
        records: &[StepRecord],
        sink: &mut dyn ReportSink,
    ) -> CaseResult {
        let steps = case_steps(records, case_id);
        let mut run = CaseRun::new(case_id.clone());

        if let Err(e) = self.drive(&mut run, session, &steps, sink).await {
            // Only an illegal transition gets here
            warn!("Case {} aborted: {}", case_id, e);
            run.error.get_or_insert_with(|| e.to_string());
            run.state = CaseState::Failed;
        }

        run.finish(sink)
    }

    /// Record a case that failed before it could start, e.g. because no
    /// session could be acquired for it.
    pub fn fail_unstarted(&self, case_id: &CaseId, reason: &str, sink: &mut dyn ReportSink) -> CaseResult {
        let mut run = CaseRun::new(case_id.clone());
        sink.emit(&RunEvent::Exception {
            case_id: case_id.clone(),
            context: "Session".to_string(),
            message: reason.to_string(),
        });
        if let Err(e) = run.fail(reason.to_string()) {
            warn!("Case {}: {}", case_id, e);
        }
        run.finish(sink)
    }

    async fn drive(
        &self,
        run: &mut CaseRun,
        session: &mut dyn Session,
        steps: &[&StepRecord],
        sink: &mut dyn ReportSink,
    ) -> RunResult<()> {
        if steps.is_empty() {
            warn!("No steps found for case {}", run.case_id);
            return run.enter(CaseState::Skipped);
        }

        run.enter(CaseState::Running)?;
        sink.emit(&RunEvent::CaseStarted {
            case_id: run.case_id.clone(),
            url: self.base_url.to_string(),
        });

        if let Err(e) = session.goto(self.base_url).await {
            let message = format!("Navigation to {} failed: {}", self.base_url, e);
            sink.emit(&RunEvent::Exception {
                case_id: run.case_id.clone(),
                context: "Navigation".to_string(),
                message: message.clone(),
            });
            return run.fail(message);
        }

        for step in steps {
            sink.emit(&RunEvent::StepStarted {
                case_id: run.case_id.clone(),
                step_no: step.step_no.clone(),
                keyword: step.keyword.clone(),
                locator: step.locator.clone(),
                input: step.input_data.clone(),
            });

            let clock = Instant::now();
            let outcome = match self.registry.resolve(&step.keyword) {
                Some(action) => action.invoke(session, &step.locator, step.input()).await,
                None => Err(RunError::KeywordNotImplemented(step.keyword.clone())),
            };
            let status = if outcome.is_ok() {
                StepStatus::Pass
            } else {
                StepStatus::Fail
            };

            let screenshot = if self.screenshots.policy.wants(status) {
                screenshot::capture(session, self.screenshots, &run.case_id, &step.step_no, &step.keyword).await
            } else {
                None
            };

            let message = outcome.err().map(|e| e.to_string());
            if let Some(message) = &message {
                sink.emit(&RunEvent::Exception {
                    case_id: run.case_id.clone(),
                    context: format!("Step {} - {}", step.step_no, step.keyword.trim()),
                    message: message.clone(),
                });
            }

            let result = StepResult {
                step_no: step.step_no.clone(),
                keyword: step.keyword.trim().to_string(),
                status,
                message: message.clone(),
                duration_ms: clock.elapsed().as_millis() as u64,
                screenshot,
            };
            sink.emit(&RunEvent::StepFinished {
                case_id: run.case_id.clone(),
                result: result.clone(),
            });
            run.steps.push(result);

            if let Some(message) = message {
                return run.fail(message);
            }
        }

        run.enter(CaseState::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyrun_common::StepNo;

    #[test]
    fn test_legal_transitions() {
        assert_eq!(CaseState::Pending.transition(CaseState::Running).unwrap(), CaseState::Running);
        assert_eq!(CaseState::Pending.transition(CaseState::Skipped).unwrap(), CaseState::Skipped);
        assert_eq!(CaseState::Running.transition(CaseState::Passed).unwrap(), CaseState::Passed);
        assert_eq!(CaseState::Running.transition(CaseState::Failed).unwrap(), CaseState::Failed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for state in [CaseState::Passed, CaseState::Failed, CaseState::Skipped] {
            assert!(state.is_terminal());
            assert!(state.transition(CaseState::Running).is_err());
        }
        let err = CaseState::Pending.transition(CaseState::Passed).unwrap_err();
        assert_eq!(err.to_string(), "Invalid state transition: PENDING -> PASSED");
    }

    #[test]
    fn test_case_steps_sorted_and_stable() {
        let records = vec![
            StepRecord::new("TC_01", 10, "Click", "#ten"),
            StepRecord::new("TC_02", 1, "Click", "#other"),
            StepRecord::new("TC_01", 2, "Click", "#two-a"),
            StepRecord::new("TC_01", 2, "Click", "#two-b"),
            StepRecord::new("TC_01", 1, "Click", "#one"),
        ];
        let case_id = CaseId::new("TC_01").unwrap();
        let locators: Vec<&str> = case_steps(&records, &case_id)
            .iter()
            .map(|r| r.locator.as_str())
            .collect();
        assert_eq!(locators, vec!["#one", "#two-a", "#two-b", "#ten"]);
    }

    #[test]
    fn test_case_steps_numeric_before_text() {
        let mut text_step = StepRecord::new("TC_01", 0, "Click", "#text");
        text_step.step_no = StepNo::Text("final".to_string());
        let records = vec![text_step, StepRecord::new("TC_01", 3, "Click", "#three")];
        let case_id = CaseId::new("TC_01").unwrap();
        let steps = case_steps(&records, &case_id);
        assert_eq!(steps[0].locator, "#three");
    }
}
