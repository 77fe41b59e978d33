//! Logging setup for keymode with file output and optional stdout.
//!
//! Logs always go to a file at `warn` level (or higher if an environment variable is set).
//! Stdout logging is enabled when `KEYMODE_LOG` or `RUST_LOG` is set, or in debug builds.
//!
//! ## Environment Variables
//!
//! 1. **`KEYMODE_LOG`** (highest priority) - keymode-specific logging control
//! 2. **`RUST_LOG`** - Standard tracing environment variable
//! 3. **Default** - `warn` globally, `info` for keymode crates
//!
//! ```bash
//! # Debug level for all keymode crates
//! KEYMODE_LOG=debug keymode check
//!
//! # Module-specific levels are passed through untouched
//! KEYMODE_LOG=keymode::loader=trace,keymode=debug keymode check
//! ```
//!
//! ## Log File Location
//!
//! Default: `<data_local_dir>/keymode/logs/keymode-<pid>.log`
//! - macOS: `~/Library/Application Support/keymode/logs/keymode-12345.log`
//! - Linux: `~/.local/share/keymode/logs/keymode-12345.log`
//!
//! Override with `--log-file <path>`. A path with an extension names the file, any other path
//! names the directory.

use std::{
    env,
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

const CRATES: [&str; 3] = ["keymode", "keymode_bin", "keymode_log"];

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Returned from [`init`]; must be held alive to ensure log file flushing.
pub struct LogGuard {
    _file_guard: WorkerGuard,
    pub log_file: PathBuf,
}

#[derive(Debug, Default)]
pub struct LogConfig {
    pub log_file_path: Option<PathBuf>,
}

/// Initialize logging.
///
/// The returned [`LogGuard`] must be held for the lifetime of the program;
/// dropping it flushes and stops the background file writer.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: LogConfig) -> Result<LogGuard, BoxError> {
    let (log_dir, filename) = resolve_log_path(config.log_file_path);

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, &filename);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(create_file_filter());

    let stdout_enabled = env_override().is_some() || cfg!(debug_assertions);
    let stdout_layer = stdout_enabled.then(|| fmt::layer().with_filter(create_filter()));

    Registry::default()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;

    Ok(LogGuard {
        _file_guard: file_guard,
        log_file: log_dir.join(filename),
    })
}

/// Initialize logging for tests.
///
/// Stdout-only (no file output). Will not crash if called multiple times or if logging is
/// already initialized by another test.
pub fn test() {
    let _ = fmt()
        .with_env_filter(create_filter())
        .with_test_writer()
        .try_init();
}

enum Override {
    Keymode(String),
    Rust(String),
}

fn env_override() -> Option<Override> {
    if let Ok(keymode_log) = env::var("KEYMODE_LOG") {
        return Some(Override::Keymode(keymode_log));
    }
    env::var("RUST_LOG").ok().map(Override::Rust)
}

fn resolve_log_path(override_path: Option<PathBuf>) -> (PathBuf, String) {
    let filename = format!("keymode-{}.log", std::process::id());

    if let Some(path) = override_path {
        if path.extension().is_some() {
            let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(filename);
            return (dir, name);
        }
        return (path, filename);
    }

    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keymode")
        .join("logs");

    (dir, filename)
}

/// File filter: uses user-specified level if set, otherwise defaults to `warn`.
fn create_file_filter() -> EnvFilter {
    match env_override() {
        Some(_) => create_filter(),
        None => EnvFilter::new("warn"),
    }
}

/// `KEYMODE_LOG` > `RUST_LOG` > `warn` globally with `info` for keymode crates.
fn create_filter() -> EnvFilter {
    match env_override() {
        Some(Override::Keymode(keymode_log)) => expand_keymode_log(&keymode_log),
        Some(Override::Rust(rust_log)) => EnvFilter::new(rust_log),
        None => EnvFilter::new(directives("info")),
    }
}

/// Expand `KEYMODE_LOG` values into full tracing filter strings.
///
/// - `KEYMODE_LOG=debug` becomes `warn,keymode=debug,keymode_bin=debug,...`
/// - `KEYMODE_LOG=keymode::loader=trace` is used as-is
fn expand_keymode_log(keymode_log: &str) -> EnvFilter {
    if is_advanced(keymode_log) {
        return EnvFilter::new(keymode_log);
    }
    EnvFilter::new(directives(keymode_log))
}

fn is_advanced(value: &str) -> bool {
    value.contains('=') || value.contains(':') || value.contains(',')
}

fn directives(level: &str) -> String {
    let mut out = String::from("warn");
    for name in CRATES {
        out.push_str(&format!(",{name}={level}"));
    }
    out
}
