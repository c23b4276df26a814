//! Case selection from execute/priority flags

use std::collections::BTreeSet;

use keyrun_common::{CaseId, ExecutionFilter, StepRecord};
use tracing::debug;

use crate::error::{RunError, RunResult};

/// Whether a single row passes the execute and priority flags
pub fn row_matches(record: &StepRecord, filter: &ExecutionFilter) -> bool {
    if filter.only_flagged() {
        let flagged = record
            .execute
            .as_deref()
            .map(|v| v.trim().to_uppercase() == "Y")
            .unwrap_or(false);
        if !flagged {
            return false;
        }
    }

    if let Some(wanted) = filter.priority_filter() {
        let priority = record
            .priority
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        if priority != wanted {
            return false;
        }
    }

    true
}

/// Select the sorted, de-duplicated case ids that should run.
///
/// An empty selection is fatal for the run.
pub fn select_cases(records: &[StepRecord], filter: &ExecutionFilter) -> RunResult<Vec<CaseId>> {
    let matching: Vec<&StepRecord> = records.iter().filter(|r| row_matches(r, filter)).collect();
    debug!(
        "Selection Execute={} Priority={} kept {} of {} row(s)",
        filter.execute,
        filter.priority,
        matching.len(),
        records.len()
    );

    let selected: BTreeSet<CaseId> = matching
        .into_iter()
        .filter_map(|r| r.case_id.clone())
        .collect();

    if selected.is_empty() {
        return Err(RunError::NoMatchingCases {
            execute: filter.execute.clone(),
            priority: filter.priority.clone(),
        });
    }

    Ok(selected.into_iter().collect())
}
