//! Log file setup
//!
//! The terminal belongs to the TUI, so logs go to a file through a
//! non-blocking writer. The returned guard must live until exit or buffered
//! lines are lost.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// Level used when `RUST_LOG` is not set
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "homedash=debug,info"
    } else {
        "homedash=info,warn"
    }
}

/// Install the global subscriber writing to `log_file`
///
/// `RUST_LOG`, when set, takes precedence over the `verbose` default.
/// Returns `None` when the file cannot be opened or a subscriber is already
/// installed; the dashboard then runs without logs.
pub fn init_tracing(verbose: bool, log_file: &Path) -> Option<WorkerGuard> {
    let dir = log_file.parent().filter(|p| !p.as_os_str().is_empty())?;
    let file_name = log_file.file_name()?;
    std::fs::create_dir_all(dir).ok()?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .ok()?;

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert!(default_level(true).contains("debug"));
        assert!(!default_level(false).contains("debug"));
    }

    #[test]
    fn test_init_tracing_rejects_bare_file_name() {
        assert!(init_tracing(false, Path::new("homedash.log")).is_none());
    }
}
