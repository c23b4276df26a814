//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use keyrun_common::{CaseResult, CaseStatus, RunSummary};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for CaseResult {
    fn headers() -> Vec<&'static str> {
        vec!["Case", "Status", "Steps", "Duration", "Failure"]
    }

    fn row(&self) -> Vec<String> {
        let failure = match self.failed_step() {
            Some(step) => format!(
                "Step {} ({}): {}",
                step.step_no,
                step.keyword,
                step.message.as_deref().unwrap_or_default()
            ),
            None => self.error.clone().unwrap_or_default(),
        };

        vec![
            self.case_id.to_string(),
            self.status.to_string(),
            self.steps.len().to_string(),
            format!("{:.2}s", self.duration_ms as f64 / 1000.0),
            failure,
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
    }
}

/// One-line totals, e.g. `3 passed, 1 failed, 0 skipped in 12.40s`
pub fn totals_line(summary: &RunSummary) -> String {
    format!(
        "{} passed, {} failed, {} skipped in {:.2}s",
        summary.passed,
        summary.failed,
        summary.skipped,
        summary.duration_ms as f64 / 1000.0
    )
}

/// Print the outcome of a run
pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary).unwrap_or_default());
        }
        OutputFormat::Table => {
            print_list(&summary.cases, format);

            let totals = totals_line(summary);
            if summary.success() {
                print_success(&totals);
            } else {
                print_error(&totals);
            }

            if let Some(log) = &summary.log_file {
                print_info(&format!("Log file: {}", log.display()));
            }

            for case in summary.cases.iter().filter(|c| c.status == CaseStatus::Skipped) {
                print_warning(&format!("{} has no steps and was skipped", case.case_id));
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message.green());
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message.yellow());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
