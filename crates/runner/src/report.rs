//! Run events and the sinks that consume them

use serde::Serialize;
use tracing::{error, info, warn};

use keyrun_common::{CaseId, CaseStatus, StepNo, StepResult, StepStatus};

const BANNER: &str = "================================================================================";
const RULE: &str = "--------------------------------------------------------------------------------";

/// Something that happened during a run, tagged by case where it applies
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    SessionStarted {
        cases: Vec<CaseId>,
    },
    CaseStarted {
        case_id: CaseId,
        url: String,
    },
    StepStarted {
        case_id: CaseId,
        step_no: StepNo,
        keyword: String,
        locator: String,
        input: Option<String>,
    },
    StepFinished {
        case_id: CaseId,
        result: StepResult,
    },
    Exception {
        case_id: CaseId,
        context: String,
        message: String,
    },
    CaseFinished {
        case_id: CaseId,
        status: CaseStatus,
        duration_ms: u64,
    },
    SessionFinished {
        passed: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
    },
}

impl RunEvent {
    pub fn case_id(&self) -> Option<&CaseId> {
        match self {
            RunEvent::CaseStarted { case_id, .. }
            | RunEvent::StepStarted { case_id, .. }
            | RunEvent::StepFinished { case_id, .. }
            | RunEvent::Exception { case_id, .. }
            | RunEvent::CaseFinished { case_id, .. } => Some(case_id),
            RunEvent::SessionStarted { .. } | RunEvent::SessionFinished { .. } => None,
        }
    }
}

/// Consumer of run events
pub trait ReportSink {
    fn emit(&mut self, event: &RunEvent);
}

/// Collects events in memory
impl ReportSink for Vec<RunEvent> {
    fn emit(&mut self, event: &RunEvent) {
        self.push(event.clone());
    }
}

/// Writes events to the run log
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&mut self, event: &RunEvent) {
        match event {
            RunEvent::SessionStarted { cases } => {
                info!("===== Test Session Started =====");
                let ids: Vec<&str> = cases.iter().map(|c| c.as_str()).collect();
                info!("Cases selected: {}", ids.join(", "));
            }
            RunEvent::CaseStarted { case_id, url } => {
                info!("{}", BANNER);
                info!("TEST CASE START: {}", case_id);
                info!("Navigating to {}", url);
                info!("{}", BANNER);
            }
            RunEvent::StepStarted {
                step_no,
                keyword,
                locator,
                input,
                ..
            } => {
                let mut line = format!("Step {}: {}", step_no, keyword.trim());
                if !locator.is_empty() {
                    line.push_str(&format!(" | Locator: {}", locator));
                }
                if let Some(value) = input.as_deref().filter(|v| !v.is_empty()) {
                    line.push_str(&format!(" | Value: {}", value));
                }
                info!("{}", line);
            }
            RunEvent::StepFinished { result, .. } => {
                let suffix = result
                    .message
                    .as_deref()
                    .map(|m| format!(" | {}", m))
                    .unwrap_or_default();
                match result.status {
                    StepStatus::Pass => info!("Step {} - PASSED{}", result.step_no, suffix),
                    StepStatus::Fail => error!("Step {} - FAILED{}", result.step_no, suffix),
                }
            }
            RunEvent::Exception {
                case_id,
                context,
                message,
            } => {
                error!("Exception occurred in {} ({}): {}", context, case_id, message);
            }
            RunEvent::CaseFinished {
                case_id,
                status,
                duration_ms,
            } => {
                info!("{}", RULE);
                match status {
                    CaseStatus::Passed => info!("TEST CASE END: {} | Status: {}", case_id, status),
                    CaseStatus::Failed => error!("TEST CASE END: {} | Status: {}", case_id, status),
                    CaseStatus::Skipped => warn!("TEST CASE END: {} | Status: {}", case_id, status),
                }
                info!("Duration: {:.2} seconds", *duration_ms as f64 / 1000.0);
                info!("{}", BANNER);
            }
            RunEvent::SessionFinished {
                passed,
                failed,
                skipped,
                duration_ms,
            } => {
                info!(
                    "Test Results: {} passed, {} failed, {} skipped ({} ms)",
                    passed, failed, skipped, duration_ms
                );
                info!("===== Test Session Completed =====");
            }
        }
    }
}

/// Forwards every event to two sinks
pub struct Tee<'a> {
    first: &'a mut dyn ReportSink,
    second: &'a mut dyn ReportSink,
}

impl<'a> Tee<'a> {
    pub fn new(first: &'a mut dyn ReportSink, second: &'a mut dyn ReportSink) -> Self {
        Self { first, second }
    }
}

impl ReportSink for Tee<'_> {
    fn emit(&mut self, event: &RunEvent) {
        self.first.emit(event);
        self.second.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_case_tag() {
        let case_id = CaseId::new("TC_01").unwrap();
        let event = RunEvent::CaseStarted {
            case_id: case_id.clone(),
            url: "http://localhost".to_string(),
        };
        assert_eq!(event.case_id(), Some(&case_id));
        assert!(RunEvent::SessionStarted { cases: vec![] }.case_id().is_none());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = RunEvent::CaseFinished {
            case_id: CaseId::new("7").unwrap(),
            status: CaseStatus::Failed,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "case_finished");
        assert_eq!(json["case_id"], "7");
        assert_eq!(json["status"], "FAILED");
    }

    #[test]
    fn test_tee_forwards_to_both() {
        let mut first: Vec<RunEvent> = Vec::new();
        let mut second: Vec<RunEvent> = Vec::new();
        {
            let mut tee = Tee::new(&mut first, &mut second);
            tee.emit(&RunEvent::SessionStarted { cases: vec![] });
            LogSink.emit(&RunEvent::SessionStarted { cases: vec![] });
        }
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
