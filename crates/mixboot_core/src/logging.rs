//! Process-wide log sink setup.
//!
//! # Responsibility
//! - Start one rotating file logger per process for boot diagnostics.
//! - Record panics raised on the boot thread before the host unwinds.
//!
//! # Invariants
//! - Repeating `init_logging` with the same level and directory is a no-op.
//! - A second call with a different level or directory is rejected.
//! - Setup never panics.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "mixboot";
const ROTATE_AT_BYTES: u64 = 4 * 1024 * 1024;
const KEPT_LOG_FILES: usize = 3;
const PANIC_PAYLOAD_LIMIT: usize = 200;

static ACTIVE_SINK: OnceCell<ActiveSink> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveSink {
    level: log::LevelFilter,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    UnknownLevel(String),
    InvalidDirectory(String),
    AlreadyInitialized { detail: String },
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(value) => write!(
                f,
                "unknown log level `{value}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory(detail) => write!(f, "invalid log directory: {detail}"),
            Self::AlreadyInitialized { detail } => {
                write!(f, "logging already initialized: {detail}")
            }
            Self::Backend(detail) => write!(f, "failed to start logger: {detail}"),
        }
    }
}

impl Error for LoggingError {}

/// Starts file logging under `log_dir` at `level`.
///
/// # Errors
/// - `UnknownLevel` for anything outside `trace|debug|info|warn|error`.
/// - `InvalidDirectory` for blank or relative paths, or when the directory
///   cannot be created.
/// - `AlreadyInitialized` when a different level or directory is active.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let log_dir = parse_log_dir(log_dir)?;

    let sink = ACTIVE_SINK.get_or_try_init(|| start_sink(level, &log_dir))?;
    if sink.log_dir != log_dir {
        return Err(LoggingError::AlreadyInitialized {
            detail: format!(
                "writing to `{}`, refusing `{}`",
                sink.log_dir.display(),
                log_dir.display()
            ),
        });
    }
    if sink.level != level {
        return Err(LoggingError::AlreadyInitialized {
            detail: format!("level `{}`, refusing `{}`", sink.level, level),
        });
    }
    Ok(())
}

/// Active `(level, directory)` pair, or `None` before `init_logging`.
pub fn logging_status() -> Option<(log::LevelFilter, PathBuf)> {
    ACTIVE_SINK
        .get()
        .map(|sink| (sink.level, sink.log_dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_sink(level: log::LevelFilter, log_dir: &Path) -> Result<ActiveSink, LoggingError> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        LoggingError::InvalidDirectory(format!("cannot create `{}`: {err}", log_dir.display()))
    })?;

    let handle = Logger::with(LogSpecification::builder().default(level).build())
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEPT_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();

    info!(
        "event=logging_start module=logging status=ok level={} log_dir={} version={}",
        level,
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveSink {
        level,
        log_dir: log_dir.to_path_buf(),
        _handle: handle,
    })
}

fn parse_level(value: &str) -> Result<log::LevelFilter, LoggingError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(log::LevelFilter::Trace),
        "debug" => Ok(log::LevelFilter::Debug),
        "info" => Ok(log::LevelFilter::Info),
        "warn" | "warning" => Ok(log::LevelFilter::Warn),
        "error" => Ok(log::LevelFilter::Error),
        other => Err(LoggingError::UnknownLevel(other.to_string())),
    }
}

fn parse_log_dir(value: &str) -> Result<PathBuf, LoggingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoggingError::InvalidDirectory(
            "directory must not be empty".to_string(),
        ));
    }
    let path = PathBuf::from(trimmed);
    if !path.is_absolute() {
        return Err(LoggingError::InvalidDirectory(format!(
            "directory must be absolute, got `{trimmed}`"
        )));
    }
    Ok(path)
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = panic_info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = panic_info.payload().downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            single_line(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(panic_info);
    }));
}

fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut cut: String = flattened.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
