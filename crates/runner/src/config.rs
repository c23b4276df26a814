//! Runner configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RunError, RunResult};
use crate::keywords::KeywordSettings;
use crate::logging::LogConfig;
use crate::playwright::PlaywrightConfig;
use crate::screenshot::ScreenshotConfig;
use crate::session::SessionPolicy;

/// Default location of the application base URL
pub const DEFAULT_URL_FILE: &str = "configuration/resources/url.txt";

/// Configuration for a keyrun run, usually read from `keyrun.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Test suite workbook or CSV file
    pub data_file: PathBuf,

    /// File holding the application base URL
    pub url_file: PathBuf,

    /// Output directory for results
    pub output_dir: PathBuf,

    pub session_policy: SessionPolicy,
    pub screenshots: ScreenshotConfig,
    pub logging: LogConfig,
    pub playwright: PlaywrightConfig,
    pub keywords: KeywordSettings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("test_suites/keywords.xlsx"),
            url_file: PathBuf::from(DEFAULT_URL_FILE),
            output_dir: PathBuf::from("test-results"),
            session_policy: SessionPolicy::default(),
            screenshots: ScreenshotConfig::default(),
            logging: LogConfig::default(),
            playwright: PlaywrightConfig::default(),
            keywords: KeywordSettings::default(),
        }
    }
}

impl RunnerConfig {
    /// Parse a configuration from YAML; absent keys keep their defaults
    pub fn from_yaml(yaml: &str) -> RunResult<Self> {
        serde_yaml::from_str(yaml).map_err(RunError::from)
    }

    pub fn from_file(path: &Path) -> RunResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RunError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml(&content)
    }

    /// Read the file when present, otherwise use defaults
    pub fn load_or_default(path: &Path) -> RunResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Read the application base URL. A missing or blank file is fatal.
pub fn load_base_url(path: &Path) -> RunResult<String> {
    if !path.exists() {
        return Err(RunError::UrlFileMissing(path.to_path_buf()));
    }

    let url = std::fs::read_to_string(path)?.trim().to_string();
    if url.is_empty() {
        return Err(RunError::Config(format!(
            "base URL file {} is empty",
            path.display()
        )));
    }
    Ok(url)
}
