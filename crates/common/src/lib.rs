//! keyrun Common Library
//!
//! Data model shared by the keyrun crates and the loader that turns a
//! tabular test suite into step records.

pub mod error;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use table::{load_steps, StepTable};
pub use types::*;

/// keyrun version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
