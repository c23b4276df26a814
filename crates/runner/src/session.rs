//! Browser session capability and its lifecycle

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RunResult;

/// Operations a live browser page offers to keyword actions.
///
/// Locators are opaque to the engine; their meaning belongs to the
/// implementation.
#[async_trait]
pub trait Session: Send {
    /// Navigate the page to an absolute URL
    async fn goto(&mut self, url: &str) -> RunResult<()>;

    /// Set the value of an input element
    async fn fill(&mut self, locator: &str, text: &str) -> RunResult<()>;

    async fn click(&mut self, locator: &str) -> RunResult<()>;

    /// Block until the locator is present, failing after `timeout`
    async fn wait_for_selector(&mut self, locator: &str, timeout: Duration) -> RunResult<()>;

    /// Block until the locator is visible, failing after `timeout`
    async fn expect_visible(&mut self, locator: &str, timeout: Duration) -> RunResult<()>;

    /// Visible text of the element
    async fn inner_text(&mut self, locator: &str) -> RunResult<String>;

    /// Wait until the element's text matches `expected`, failing after `timeout`
    async fn expect_text(&mut self, locator: &str, expected: &str, timeout: Duration) -> RunResult<()>;

    /// Activate the element, wait for its file chooser and supply `path`
    async fn upload_file(&mut self, locator: &str, path: &Path) -> RunResult<()>;

    /// Select an option of a `<select>` by value
    async fn select_option(&mut self, locator: &str, value: &str) -> RunResult<()>;

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> RunResult<()>;

    /// Release the browser. Called once per acquired session.
    async fn close(&mut self) -> RunResult<()>;
}

/// Acquires fresh sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> RunResult<Box<dyn Session>>;
}

/// How long one session lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPolicy {
    /// One session shared by every case in the run
    #[default]
    PerRun,
    /// A fresh session for each case
    PerCase,
}

impl std::str::FromStr for SessionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-run" | "run" => Ok(SessionPolicy::PerRun),
            "per-case" | "case" => Ok(SessionPolicy::PerCase),
            other => Err(format!("unknown session policy '{}'", other)),
        }
    }
}

/// Scoped ownership of an acquired session.
///
/// `release` closes the session; a guard dropped without release only logs,
/// leaving teardown to the session's own `Drop`.
pub struct SessionGuard {
    session: Option<Box<dyn Session>>,
}

impl SessionGuard {
    pub async fn acquire(factory: &dyn SessionFactory) -> RunResult<Self> {
        let session = factory.open().await?;
        info!("Browser session acquired");
        Ok(Self {
            session: Some(session),
        })
    }

    pub fn session(&mut self) -> &mut dyn Session {
        // Only `release` empties the slot and it consumes the guard
        self.session
            .as_deref_mut()
            .expect("session is present until released")
    }

    pub async fn release(mut self) -> RunResult<()> {
        match self.session.take() {
            Some(mut session) => {
                debug!("Releasing browser session");
                session.close().await
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("Browser session dropped without release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_policy_parse() {
        assert_eq!("per-run".parse::<SessionPolicy>().unwrap(), SessionPolicy::PerRun);
        assert_eq!("Case".parse::<SessionPolicy>().unwrap(), SessionPolicy::PerCase);
        assert!("sometimes".parse::<SessionPolicy>().is_err());
    }

    #[test]
    fn test_session_policy_default() {
        assert_eq!(SessionPolicy::default(), SessionPolicy::PerRun);
    }
}
