//! Logging setup
//!
//! Normal runs log to stderr. `--debug` additionally writes daily-rotated
//! files under `~/.wa-recency/logs` (or `DEBUG_LOGS_LOCATION`), and an explicit
//! `logging.file` routes everything to that file instead of stderr.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

const LOG_FILE_PREFIX: &str = "wa-recency.log";

/// Dependencies that drown out our own output at debug level
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls", "tower_http"];

#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    debug_mode: bool,
    log_dir: Option<PathBuf>,
    file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
            debug_mode: false,
            log_dir: None,
            file: None,
        }
    }

    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }

    /// Directory for rotated debug logs
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| crate::config::wa_recency_home().join("logs"))
    }

    /// `RUST_LOG` wins; otherwise our crate at the configured level (debug in
    /// debug mode) with chatty dependencies capped at info.
    fn filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let level = if self.debug_mode { "debug" } else { self.level.as_str() };
        let mut directives = vec![level.to_string()];
        if matches!(level, "debug" | "trace") {
            directives.extend(NOISY_TARGETS.iter().map(|t| format!("{t}=info")));
        }
        EnvFilter::new(directives.join(","))
    }
}

/// Install the global subscriber. The returned guard must be held for the
/// lifetime of the process or buffered file output is lost.
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.filter();

    if let Some(path) = &config.file {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(config.debug_mode)
            .with_writer(writer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        return Ok(Some(guard));
    }

    if config.debug_mode {
        let dir = config.log_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {:?}", dir))?;
        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer.and(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        tracing::debug!("Debug logging to {:?}", dir);
        return Ok(Some(guard));
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(None)
}

/// Delete rotated log files in `dir` older than `days`. Returns how many were
/// removed; a missing directory counts as nothing to do.
pub fn cleanup_old_logs(dir: &Path, days: u64) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(days * 24 * 60 * 60))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if modified < cutoff {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new()
            .with_debug_mode(true)
            .with_level("warn")
            .with_log_dir(PathBuf::from("/tmp/wa-logs"));
        assert!(config.debug_mode);
        assert_eq!(config.level, "warn");
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/wa-logs"));
    }

    #[test]
    fn test_default_log_dir_under_home() {
        let dir = LogConfig::new().log_dir();
        assert!(dir.ends_with(".wa-recency/logs"));
    }

    #[test]
    fn test_cleanup_removes_only_old_log_files() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("wa-recency.log.2020-01-01");
        let fresh = dir.path().join("wa-recency.log.2099-01-01");
        let other = dir.path().join("notes.txt");
        for path in [&old, &fresh, &other] {
            std::fs::write(path, "x").unwrap();
        }
        let long_ago = SystemTime::now() - Duration::from_secs(30 * 24 * 60 * 60);
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(long_ago)
            .unwrap();
        std::fs::File::options()
            .write(true)
            .open(&other)
            .unwrap()
            .set_modified(long_ago)
            .unwrap();

        assert_eq!(cleanup_old_logs(dir.path(), 7).unwrap(), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("absent"), 7).unwrap(), 0);
    }
}
