//! Run log for the pipeline runner.
//!
//! Every invocation truncates `~/.warehouse-etl/warehouse-etl.log` and
//! appends lines of the form
//!
//! ```text
//! 2026-10-19 02:00:01.204 - pipeline_runner - ERROR - Error in fact_sales pipeline: ...
//! ```
//!
//! What reaches the file:
//! - ERROR: pipeline failures and failed groups
//! - WARN: retries
//! - INFO: run, group and pipeline start/finish (default)
//! - DEBUG: catalog loading, leveling, state transitions (`--debug`)
//! - TRACE: command output (`WAREHOUSE_ETL_DEBUG=trace`)
//!
//! Until [`init_with_debug`] runs, the `elog*!` macros do nothing.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Logger name written on every line.
pub const LOGGER_NAME: &str = "pipeline_runner";

/// File name inside the app directory.
pub const LOG_FILE: &str = "warehouse-etl.log";

const DEBUG_ENV: &str = "WAREHOUSE_ETL_DEBUG";

static LOGGER: OnceLock<Logger> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        })
    }
}

/// Most verbose level to record, from the `--debug` flag and the value of
/// `WAREHOUSE_ETL_DEBUG`.
pub fn max_level(debug_flag: bool, env_value: Option<&str>) -> LogLevel {
    match env_value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("trace") => LogLevel::Trace,
        Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => LogLevel::Debug,
        _ if debug_flag => LogLevel::Debug,
        _ => LogLevel::Info,
    }
}

/// Open log file plus the level filter.
#[derive(Debug)]
pub struct Logger {
    path: PathBuf,
    max_level: LogLevel,
    file: Mutex<File>,
}

impl Logger {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: &Path, max_level: LogLevel) -> io::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            max_level,
            file: Mutex::new(File::create(path)?),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level <= self.max_level
    }

    pub fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("{} - {} - {} - {}\n", timestamp, LOGGER_NAME, level, args);
        // A poisoned lock only means another writer panicked mid-line.
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = file.write_all(line.as_bytes());
    }
}

/// Open the run log in the app directory. Failures leave logging disabled;
/// the runner works without a log file.
pub fn init_with_debug(debug: bool) {
    let level = max_level(debug, std::env::var(DEBUG_ENV).ok().as_deref());
    let Ok(dir) = crate::config::Config::app_dir() else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    if let Ok(logger) = Logger::create(&dir.join(LOG_FILE), level) {
        let _ = LOGGER.set(logger);
    }
}

/// Entry point for the `elog*!` macros.
pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    if let Some(logger) = LOGGER.get() {
        logger.log(level, args);
    }
}

/// Log at INFO.
#[macro_export]
macro_rules! elog {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::LogLevel::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! elog_error {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::LogLevel::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! elog_warn {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::LogLevel::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! elog_debug {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::LogLevel::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! elog_trace {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::LogLevel::Trace, format_args!($($arg)*))
    };
}
