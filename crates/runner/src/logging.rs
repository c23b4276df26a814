//! Per-run log file and console output
//!
//! A [`RunLog`] is created when a run starts and closed when it is dropped.
//! While alive it is the default tracing subscriber for the current thread:
//! detailed lines go to a timestamped, size-rotated file and short lines to
//! stdout.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::error::RunResult;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Configuration for run logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: PathBuf,
    /// Log files older than this many days are removed at run start
    pub retention_days: u64,
    pub max_bytes: u64,
    pub backups: usize,
    /// Console filter directive, e.g. `info` or `keyrun_runner=debug`
    pub console_level: String,
    pub console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            retention_days: 7,
            max_bytes: 10 * 1024 * 1024,
            backups: 5,
            console_level: "info".to_string(),
            console: true,
        }
    }
}

/// Local wall-clock timestamps in a fixed pattern
struct LocalTime(&'static str);

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format(self.0))
    }
}

/// Append-only file that rolls over once it reaches `max_bytes`.
///
/// Rolled files are kept as `<name>.1` (newest) through `<name>.<backups>`.
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    backups: usize,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            written,
            max_bytes,
            backups,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups > 0 {
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    std::fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            std::fs::rename(&self.path, self.backup_path(1))?;
        }

        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_bytes > 0 && self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Remove `*.log*` files in `dir` last modified more than `retention` ago.
///
/// Returns how many files were removed; a missing directory removes nothing.
pub fn cleanup_old_logs(dir: &Path, retention: Duration) -> usize {
    if !dir.exists() {
        return 0;
    }

    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;

    for entry in walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().contains(".log"))
    {
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        if matches!(modified, Some(time) if time < cutoff) {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to delete {}: {}", entry.path().display(), e),
            }
        }
    }

    removed
}

/// Retention window for `days`, saturating on absurd values
fn retention(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(SECS_PER_DAY))
}

/// Logging handle for one run
pub struct RunLog {
    path: PathBuf,
    _guard: DefaultGuard,
}

impl RunLog {
    /// Prune old logs, open `test_execution_<timestamp>.log` and install the
    /// run's subscriber for the current thread.
    pub fn open(config: &LogConfig) -> RunResult<Self> {
        let pruned = cleanup_old_logs(&config.dir, retention(config.retention_days));
        std::fs::create_dir_all(&config.dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = config.dir.join(format!("test_execution_{}.log", timestamp));
        let file = RotatingFile::open(&path, config.max_bytes, config.backups)?;

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_timer(LocalTime("%Y-%m-%d %H:%M:%S"))
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(LevelFilter::DEBUG);

        let console_layer = config.console.then(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.console_level));
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTime("%H:%M:%S"))
                .with_target(false)
                .with_filter(filter)
        });

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer);
        let guard = tracing::subscriber::set_default(subscriber);

        info!("{}", "=".repeat(80));
        info!("Logging initialized - Log file: {}", path.display());
        info!("{}", "=".repeat(80));
        if pruned > 0 {
            info!("Deleted {} log file(s) older than {} day(s)", pruned, config.retention_days);
        }

        Ok(Self { path, _guard: guard })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        info!("Log closed: {}", self.path.display());
    }
}
