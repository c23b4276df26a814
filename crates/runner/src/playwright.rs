//! Playwright browser automation
//!
//! A [`PlaywrightSession`] runs an embedded Node driver that keeps a single
//! browser page open and answers one JSON line per request.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::error::{RunError, RunResult};
use crate::session::{Session, SessionFactory};

const DRIVER_SCRIPT: &str = include_str!("driver.js");

/// Extra time the driver gets to report its own timeout before we give up on it
const REPLY_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// `node_modules` directory providing the `playwright` package
    /// (defaults to `./node_modules`)
    pub node_modules: Option<PathBuf>,
    pub startup_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub action_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_modules: None,
            startup_timeout_ms: 30_000,
            navigation_timeout_ms: 30_000,
            action_timeout_ms: 30_000,
        }
    }
}

/// One reply line from the driver
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverReply {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timeout: bool,
}

impl DriverReply {
    /// Parse a stdout line; non-JSON output is not a reply
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }

    pub fn into_result(self, op: &str) -> RunResult<Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self
            .error
            .unwrap_or_else(|| format!("{} failed without an error message", op));
        if self.timeout {
            Err(RunError::Timeout(message))
        } else {
            Err(RunError::Playwright(message))
        }
    }
}

/// Serialize a request line for the driver
pub fn encode_request(id: u64, op: &str, args: Value, timeout: Duration) -> RunResult<String> {
    let mut request = json!({
        "id": id,
        "op": op,
        "timeout": timeout.as_millis() as u64,
    });
    if let (Some(fields), Value::Object(extra)) = (request.as_object_mut(), args) {
        fields.extend(extra);
    }
    let mut line = serde_json::to_string(&request)?;
    line.push('\n');
    Ok(line)
}

/// Check if Playwright is installed
fn check_playwright_installed() -> RunResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(RunError::PlaywrightNotFound),
    }
}

/// Live browser page driven through the Node driver process
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    navigation_timeout: Duration,
    action_timeout: Duration,
    closed: bool,
    // Holds the driver script for the life of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    /// Start the driver and wait for its browser to be ready
    pub async fn launch(config: &PlaywrightConfig) -> RunResult<Self> {
        check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("keyrun-driver.js");
        std::fs::write(&script_path, DRIVER_SCRIPT)?;

        let node_modules = match &config.node_modules {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?.join("node_modules"),
        };

        info!(
            "Launching {} (headless: {})",
            config.browser.as_str(),
            config.headless
        );

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .env("NODE_PATH", &node_modules)
            .env("KEYRUN_BROWSER", config.browser.as_str())
            .env("KEYRUN_HEADLESS", if config.headless { "1" } else { "0" })
            .env(
                "KEYRUN_VIEWPORT",
                format!("{}x{}", config.viewport_width, config.viewport_height),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunError::Playwright(format!("Failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RunError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunError::Playwright("driver stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[driver] {}", line);
                }
            });
        }

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            action_timeout: Duration::from_millis(config.action_timeout_ms),
            closed: false,
            _script_dir: script_dir,
        };

        let startup = Duration::from_millis(config.startup_timeout_ms);
        tokio::time::timeout(startup, session.wait_ready())
            .await
            .map_err(|_| RunError::Timeout(format!("browser startup after {:?}", startup)))??;

        info!("Browser ready");
        Ok(session)
    }

    async fn next_reply(&mut self) -> RunResult<DriverReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| RunError::Playwright("driver exited unexpectedly".to_string()))?;

            match DriverReply::parse(&line) {
                Some(reply) => return Ok(reply),
                None => debug!("[driver] {}", line),
            }
        }
    }

    async fn wait_ready(&mut self) -> RunResult<()> {
        loop {
            let reply = self.next_reply().await?;
            match reply.ready {
                Some(true) => return Ok(()),
                Some(false) => {
                    return Err(RunError::Playwright(format!(
                        "browser failed to start: {}",
                        reply.error.unwrap_or_default()
                    )))
                }
                None => continue,
            }
        }
    }

    async fn reply_for(&mut self, id: u64) -> RunResult<DriverReply> {
        loop {
            let reply = self.next_reply().await?;
            if reply.id == Some(id) {
                return Ok(reply);
            }
            debug!("Ignoring driver reply {:?} while waiting for {}", reply.id, id);
        }
    }

    async fn request(&mut self, op: &str, args: Value, timeout: Duration) -> RunResult<Value> {
        if self.closed {
            return Err(RunError::Session("session already closed".to_string()));
        }

        self.next_id += 1;
        let id = self.next_id;
        let line = encode_request(id, op, args, timeout)?;
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let limit = timeout + REPLY_GRACE;
        let reply = tokio::time::timeout(limit, self.reply_for(id))
            .await
            .map_err(|_| RunError::Timeout(format!("driver did not answer '{}' within {:?}", op, limit)))??;

        reply.into_result(op)
    }
}

#[async_trait]
impl Session for PlaywrightSession {
    async fn goto(&mut self, url: &str) -> RunResult<()> {
        let timeout = self.navigation_timeout;
        self.request("goto", json!({ "url": url }), timeout).await?;
        Ok(())
    }

    async fn fill(&mut self, locator: &str, text: &str) -> RunResult<()> {
        let timeout = self.action_timeout;
        self.request("fill", json!({ "locator": locator, "text": text }), timeout)
            .await?;
        Ok(())
    }

    async fn click(&mut self, locator: &str) -> RunResult<()> {
        let timeout = self.action_timeout;
        self.request("click", json!({ "locator": locator }), timeout).await?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, locator: &str, timeout: Duration) -> RunResult<()> {
        self.request("wait_for_selector", json!({ "locator": locator }), timeout)
            .await?;
        Ok(())
    }

    async fn expect_visible(&mut self, locator: &str, timeout: Duration) -> RunResult<()> {
        self.request("expect_visible", json!({ "locator": locator }), timeout)
            .await
            .map_err(|e| match e {
                RunError::Timeout(_) => {
                    RunError::AssertionFailed(format!("'{}' is not visible: {}", locator, e))
                }
                other => other,
            })?;
        Ok(())
    }

    async fn inner_text(&mut self, locator: &str) -> RunResult<String> {
        let timeout = self.action_timeout;
        let value = self
            .request("inner_text", json!({ "locator": locator }), timeout)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn expect_text(&mut self, locator: &str, expected: &str, timeout: Duration) -> RunResult<()> {
        self.request(
            "expect_text",
            json!({ "locator": locator, "expected": expected }),
            timeout,
        )
        .await?;
        Ok(())
    }

    async fn upload_file(&mut self, locator: &str, path: &Path) -> RunResult<()> {
        let timeout = self.action_timeout;
        self.request(
            "upload",
            json!({ "locator": locator, "path": path.to_string_lossy() }),
            timeout,
        )
        .await?;
        Ok(())
    }

    async fn select_option(&mut self, locator: &str, value: &str) -> RunResult<()> {
        let timeout = self.action_timeout;
        self.request(
            "select_option",
            json!({ "locator": locator, "value": value }),
            timeout,
        )
        .await?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> RunResult<()> {
        let timeout = self.action_timeout;
        self.request(
            "screenshot",
            json!({ "path": path.to_string_lossy(), "full_page": full_page }),
            timeout,
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> RunResult<()> {
        if self.closed {
            return Ok(());
        }

        if let Err(e) = self.request("close", json!({}), Duration::from_secs(10)).await {
            warn!("Browser did not close cleanly: {}", e);
        }
        self.closed = true;

        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => debug!("Driver exited with {}", status),
            _ => {
                warn!("Driver still running after close, killing it");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

impl Drop for PlaywrightSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        // Give the driver a chance to close the browser; kill_on_drop does the rest
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                debug!("Terminating driver (pid: {})", pid);
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }
    }
}

/// Opens Playwright sessions from a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct PlaywrightFactory {
    config: PlaywrightConfig,
}

impl PlaywrightFactory {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for PlaywrightFactory {
    async fn open(&self) -> RunResult<Box<dyn Session>> {
        let session = PlaywrightSession::launch(&self.config).await?;
        Ok(Box::new(session))
    }
}
