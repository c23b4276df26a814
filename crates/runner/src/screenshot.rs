//! Per-step screenshot capture

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use keyrun_common::{CaseId, StepNo, StepStatus};

use crate::error::RunResult;
use crate::session::Session;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid slug pattern"));

/// When to capture a screenshot after a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotPolicy {
    Never,
    #[default]
    OnFailure,
    Always,
}

impl ScreenshotPolicy {
    pub fn wants(&self, status: StepStatus) -> bool {
        match self {
            ScreenshotPolicy::Never => false,
            ScreenshotPolicy::OnFailure => status == StepStatus::Fail,
            ScreenshotPolicy::Always => true,
        }
    }
}

impl std::str::FromStr for ScreenshotPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" | "off" => Ok(ScreenshotPolicy::Never),
            "on-failure" | "failure" => Ok(ScreenshotPolicy::OnFailure),
            "always" | "every-step" => Ok(ScreenshotPolicy::Always),
            other => Err(format!("unknown screenshot policy '{}'", other)),
        }
    }
}

/// Configuration for screenshot capture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub policy: ScreenshotPolicy,
    pub dir: PathBuf,
    pub full_page: bool,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            policy: ScreenshotPolicy::OnFailure,
            dir: PathBuf::from("screenshots"),
            full_page: true,
        }
    }
}

/// Filesystem-safe name for a step's screenshot.
///
/// A case id that had to be rewritten gets a short digest of the original
/// appended, so `TC 01` and `TC/01` do not share a file.
pub fn slug(case_id: &CaseId, step_no: &StepNo, keyword: &str) -> String {
    let case = sanitize(case_id.as_str());
    let case = if case == case_id.as_str() {
        case
    } else {
        let digest = Sha256::digest(case_id.as_str().as_bytes());
        format!("{}_{}", case, &hex::encode(digest)[..8])
    };
    sanitize(&format!("{}_step{}_{}", case, step_no, keyword.trim()))
}

fn sanitize(raw: &str) -> String {
    UNSAFE_CHARS
        .replace_all(raw, "_")
        .trim_matches('_')
        .to_string()
}

/// Path a step's screenshot is written to
pub fn screenshot_path(dir: &Path, case_id: &CaseId, step_no: &StepNo, keyword: &str) -> PathBuf {
    dir.join(format!("{}.png", slug(case_id, step_no, keyword)))
}

/// Capture the page for a step, returning the file on success.
///
/// Capture problems never change the step outcome; they are logged.
pub async fn capture(
    session: &mut dyn Session,
    config: &ScreenshotConfig,
    case_id: &CaseId,
    step_no: &StepNo,
    keyword: &str,
) -> Option<PathBuf> {
    let path = screenshot_path(&config.dir, case_id, step_no, keyword);
    match save(session, &path, config.full_page).await {
        Ok(()) => {
            debug!("Screenshot saved: {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("Screenshot for {} step {} failed: {}", case_id, step_no, e);
            None
        }
    }
}

async fn save(session: &mut dyn Session, path: &Path, full_page: bool) -> RunResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    session.screenshot(path, full_page).await
}
