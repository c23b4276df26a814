//! Core types for keyrun

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Canonical test case identifier.
///
/// Ordering is natural: integer ids compare numerically and sort before
/// free-form ids, which compare lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Build an id from raw cell text. Blank text yields `None`.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for CaseId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for CaseId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordering key of a step within its case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepNo {
    Number(i64),
    Text(String),
}

impl StepNo {
    /// Parse a step number cell. Integral values (`3`, `3.0`) become numbers.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return StepNo::Number(n);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => StepNo::Number(f as i64),
            _ => StepNo::Text(trimmed.to_string()),
        }
    }
}

impl Ord for StepNo {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StepNo::Number(a), StepNo::Number(b)) => a.cmp(b),
            (StepNo::Number(_), StepNo::Text(_)) => Ordering::Less,
            (StepNo::Text(_), StepNo::Number(_)) => Ordering::Greater,
            (StepNo::Text(a), StepNo::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for StepNo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for StepNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepNo::Number(n) => write!(f, "{}", n),
            StepNo::Text(s) => f.write_str(s),
        }
    }
}

/// One row of test data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Canonical case id; rows without one are never selected
    pub case_id: Option<CaseId>,
    pub step_no: StepNo,
    pub keyword: String,
    pub locator: String,
    #[serde(default)]
    pub input_data: Option<String>,
    #[serde(default)]
    pub expected_result: Option<String>,
    #[serde(default)]
    pub execute: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// 1-based row in the source table (0 when built in code)
    #[serde(default)]
    pub row: usize,
}

impl StepRecord {
    pub fn new(case_id: &str, step_no: i64, keyword: &str, locator: &str) -> Self {
        Self {
            case_id: CaseId::new(case_id),
            step_no: StepNo::Number(step_no),
            keyword: keyword.to_string(),
            locator: locator.to_string(),
            input_data: None,
            expected_result: None,
            execute: None,
            priority: None,
            row: 0,
        }
    }

    pub fn with_input(mut self, input: &str) -> Self {
        self.input_data = Some(input.to_string());
        self
    }

    pub fn with_execute(mut self, flag: &str) -> Self {
        self.execute = Some(flag.to_string());
        self
    }

    pub fn with_priority(mut self, priority: &str) -> Self {
        self.priority = Some(priority.to_string());
        self
    }

    pub fn input(&self) -> Option<&str> {
        self.input_data.as_deref()
    }
}

/// Execute/priority flags applied before cases are grouped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFilter {
    pub execute: String,
    pub priority: String,
}

impl Default for ExecutionFilter {
    fn default() -> Self {
        Self {
            execute: "N".to_string(),
            priority: "All".to_string(),
        }
    }
}

impl ExecutionFilter {
    pub fn new(execute: impl Into<String>, priority: impl Into<String>) -> Self {
        Self {
            execute: execute.into(),
            priority: priority.into(),
        }
    }

    /// True when only rows flagged `Execute=Y` should run
    pub fn only_flagged(&self) -> bool {
        self.execute.trim().eq_ignore_ascii_case("y")
    }

    /// Lower-cased priority to match, or `None` when every priority runs
    pub fn priority_filter(&self) -> Option<String> {
        let wanted = self.priority.trim().to_lowercase();
        if wanted == "all" {
            None
        } else {
            Some(wanted)
        }
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pass => write!(f, "PASS"),
            StepStatus::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_no: StepNo,
    pub keyword: String,
    pub status: StepStatus,
    pub message: Option<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub screenshot: Option<PathBuf>,
}

/// Terminal status of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseStatus::Passed => write!(f, "PASSED"),
            CaseStatus::Failed => write!(f, "FAILED"),
            CaseStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: CaseId,
    pub status: CaseStatus,
    pub started_at: DateTime<Local>,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl CaseResult {
    /// The step that failed the case, if any
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.status == StepStatus::Fail)
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub started_at: DateTime<Local>,
    pub log_file: Option<PathBuf>,
    pub cases: Vec<CaseResult>,
}

impl RunSummary {
    pub fn from_cases(cases: Vec<CaseResult>, started_at: DateTime<Local>, duration_ms: u64) -> Self {
        let count = |status: CaseStatus| cases.iter().filter(|c| c.status == status).count();
        Self {
            total: cases.len(),
            passed: count(CaseStatus::Passed),
            failed: count(CaseStatus::Failed),
            skipped: count(CaseStatus::Skipped),
            duration_ms,
            started_at,
            log_file: None,
            cases,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_id_natural_order() {
        let mut ids: Vec<CaseId> = ["TC10", "10", "2", "TC2", "1"]
            .iter()
            .filter_map(|s| CaseId::new(s))
            .collect();
        ids.sort();
        let rendered: Vec<&str> = ids.iter().map(|c| c.as_str()).collect();
        assert_eq!(rendered, vec!["1", "2", "10", "TC10", "TC2"]);
    }

    #[test]
    fn test_blank_case_id_is_none() {
        assert!(CaseId::new("   ").is_none());
        assert_eq!(CaseId::new(" TC_01 ").unwrap().as_str(), "TC_01");
    }

    #[test]
    fn test_step_no_parse() {
        assert_eq!(StepNo::parse("3"), StepNo::Number(3));
        assert_eq!(StepNo::parse(" 4.0 "), StepNo::Number(4));
        assert_eq!(StepNo::parse("1a"), StepNo::Text("1a".to_string()));
        assert!(StepNo::parse("2") < StepNo::parse("10"));
        assert!(StepNo::parse("99") < StepNo::parse("a"));
    }

    #[test]
    fn test_filter_flags() {
        let filter = ExecutionFilter::default();
        assert!(!filter.only_flagged());
        assert_eq!(filter.priority_filter(), None);

        let filter = ExecutionFilter::new("y", " High ");
        assert!(filter.only_flagged());
        assert_eq!(filter.priority_filter().as_deref(), Some("high"));
    }

    #[test]
    fn test_summary_counts() {
        let case = |id: &str, status| CaseResult {
            case_id: CaseId::new(id).unwrap(),
            status,
            started_at: Local::now(),
            duration_ms: 1,
            steps: vec![],
            error: None,
        };
        let summary = RunSummary::from_cases(
            vec![
                case("1", CaseStatus::Passed),
                case("2", CaseStatus::Failed),
                case("3", CaseStatus::Skipped),
            ],
            Local::now(),
            10,
        );
        assert_eq!(summary.total, 3);
        assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 1, 1));
        assert!(!summary.success());
    }
}
