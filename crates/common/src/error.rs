//! Error types for keyrun test data

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using keyrun Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading a test suite
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Test suite not found: {}", .0.display())]
    SuiteNotFound(PathBuf),

    #[error("Unsupported test suite format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Workbook {} has no worksheets", .0.display())]
    EmptyWorkbook(PathBuf),

    #[error("Invalid test table: {0}")]
    InvalidTable(String),
}
