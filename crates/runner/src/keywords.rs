//! Keyword registry and the built-in keyword actions
//!
//! Every keyword shares one contract: `(session, locator, input)` either
//! completes or fails with a descriptive error. Adding a keyword means
//! registering one more action.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RunError, RunResult};
use crate::session::Session;

/// Prefix in Click input data that names a locator to wait for afterwards
pub const WAIT_PREFIX: &str = "wait:";

/// A named action bound into the registry
#[async_trait]
pub trait KeywordAction: Send + Sync {
    async fn invoke(&self, session: &mut dyn Session, locator: &str, input: Option<&str>) -> RunResult<()>;
}

/// Timeouts used by the built-in keywords
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSettings {
    /// Bound on the post-click `wait:` target
    pub click_wait_timeout_ms: u64,
    /// Bound on visibility and text assertions
    pub assertion_timeout_ms: u64,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            click_wait_timeout_ms: 30_000,
            assertion_timeout_ms: 5_000,
        }
    }
}

impl KeywordSettings {
    pub fn click_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.click_wait_timeout_ms)
    }

    pub fn assertion_timeout(&self) -> Duration {
        Duration::from_millis(self.assertion_timeout_ms)
    }
}

fn required<'a>(keyword: &str, input: Option<&'a str>) -> RunResult<&'a str> {
    input.ok_or_else(|| RunError::MissingInput {
        keyword: keyword.to_string(),
    })
}

/// `InputText`: set the element's value
pub struct InputText;

#[async_trait]
impl KeywordAction for InputText {
    async fn invoke(&self, session: &mut dyn Session, locator: &str, input: Option<&str>) -> RunResult<()> {
        let text = required("InputText", input)?;
        session.fill(locator, text).await
    }
}

/// `Click`: activate the element, then optionally wait for `wait:<locator>`
pub struct Click {
    pub wait_timeout: Duration,
}

#[async_trait]
impl KeywordAction for Click {
    async fn invoke(&self, session: &mut dyn Session, locator: &str, input: Option<&str>) -> RunResult<()> {
        session.click(locator).await?;

        if let Some(target) = input.and_then(|i| i.strip_prefix(WAIT_PREFIX)) {
            debug!("Waiting up to {:?} for {}", self.wait_timeout, target);
            session.wait_for_selector(target, self.wait_timeout).await?;
        }
        Ok(())
    }
}

/// `VerifyVisible`: the element must be visible
pub struct VerifyVisible {
    pub timeout: Duration,
}

#[async_trait]
impl KeywordAction for VerifyVisible {
    async fn invoke(&self, session: &mut dyn Session, locator: &str, _input: Option<&str>) -> RunResult<()> {
        session.expect_visible(locator, self.timeout).await
    }
}

/// `VerifyText`: the element's trimmed text must contain the input.
///
/// The follow-up `expect_text` wait uses the same contains semantics, so it
/// only fails when the text changes or disappears between the two reads.
pub struct VerifyText {
    pub timeout: Duration,
}

#[async_trait]
impl KeywordAction for VerifyText {
    async fn invoke(&self, session: &mut dyn Session, locator: &str, input: Option<&str>) -> RunResult<()> {
        let expected = required("VerifyText", input)?;

        let raw = session.inner_text(locator).await?;
        let actual = raw.trim();
        if !actual.contains(expected) {
            return Err(RunError::AssertionFailed(format!(
                "Expected '{}' in actual '{}'",
                expected, actual
            )));
        }

        session
            .expect_text(locator, expected, self.timeout)
            .await
            .map_err(|e| RunError::AssertionFailed(format!("Text mismatch for '{}': {}", locator, e)))
    }
}

/// `Upload`: feed a file to the element's file chooser
pub struct Upload;

impl Upload {
    /// Absolute form of the input path; the file must exist
    pub fn resolve_path(raw: &str) -> RunResult<PathBuf> {
        let path = PathBuf::from(raw.trim());
        let absolute = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };

        if !absolute.is_file() {
            return Err(RunError::UploadFileMissing(absolute));
        }
        Ok(absolute)
    }
}

#[async_trait]
impl KeywordAction for Upload {
    async fn invoke(&self, session: &mut dyn Session, locator: &str, input: Option<&str>) -> RunResult<()> {
        let path = Self::resolve_path(required("Upload", input)?)?;
        debug!("Uploading {}", path.display());
        session.upload_file(locator, &path).await
    }
}

/// `SelectOption`: pick a `<select>` option by value
pub struct SelectOption;

#[async_trait]
impl KeywordAction for SelectOption {
    async fn invoke(&self, session: &mut dyn Session, locator: &str, input: Option<&str>) -> RunResult<()> {
        let value = required("SelectOption", input)?;
        session.select_option(locator, value).await
    }
}

/// Closed mapping from keyword name to action
#[derive(Clone)]
pub struct KeywordRegistry {
    actions: HashMap<&'static str, Arc<dyn KeywordAction>>,
}

impl KeywordRegistry {
    /// A registry with no keywords
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// The built-in keyword set
    pub fn builtin(settings: &KeywordSettings) -> Self {
        let mut registry = Self::empty();
        registry.register("InputText", InputText);
        registry.register(
            "Click",
            Click {
                wait_timeout: settings.click_wait_timeout(),
            },
        );
        registry.register(
            "VerifyVisible",
            VerifyVisible {
                timeout: settings.assertion_timeout(),
            },
        );
        registry.register(
            "VerifyText",
            VerifyText {
                timeout: settings.assertion_timeout(),
            },
        );
        registry.register("Upload", Upload);
        registry.register("SelectOption", SelectOption);
        registry
    }

    pub fn register(&mut self, name: &'static str, action: impl KeywordAction + 'static) {
        self.actions.insert(name, Arc::new(action));
    }

    /// Look up a keyword by its trimmed, case-sensitive name
    pub fn resolve(&self, name: &str) -> Option<&dyn KeywordAction> {
        self.actions.get(name.trim()).map(|a| &**a)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.actions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for KeywordRegistry {
    fn default() -> Self {
        Self::builtin(&KeywordSettings::default())
    }
}
