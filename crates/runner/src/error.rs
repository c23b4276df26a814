//! Error types for keyword execution

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Base URL file not found: {}", .0.display())]
    UrlFileMissing(PathBuf),

    #[error("No test cases found matching Execute={execute}, Priority={priority}")]
    NoMatchingCases { execute: String, priority: String },

    #[error("Keyword '{0}' not implemented")]
    KeywordNotImplemented(String),

    #[error("{keyword} requires input data")]
    MissingInput { keyword: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Upload file not found: {}", .0.display())]
    UploadFileMissing(PathBuf),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Test data error: {0}")]
    Data(#[from] keyrun_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RunError {
    /// Errors that abort the whole run rather than a single case
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunError::Config(_)
                | RunError::UrlFileMissing(_)
                | RunError::NoMatchingCases { .. }
                | RunError::PlaywrightNotFound
                | RunError::Data(_)
                | RunError::Yaml(_)
        )
    }
}

pub type RunResult<T> = Result<T, RunError>;
