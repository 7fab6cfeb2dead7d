//! Logging setup for tweetdb.
//!
//! Diagnostics go through `tracing` to stderr so the preview tables and
//! charts printed on stdout stay clean. `RUST_LOG` overrides the level picked
//! from the command line.

use std::io::IsTerminal;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How much to log and how to lay it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Multi-line output with timestamps and module paths.
    pub detailed: bool,
    pub colors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Info,
    Debug,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl LogConfig {
    /// Pick a config from the `--quiet` and `--verbose` switches.
    ///
    /// Quiet wins when both are given.
    #[must_use]
    pub fn for_cli(quiet: bool, verbose: bool) -> Self {
        let level = if quiet {
            LogLevel::Error
        } else if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        Self {
            level,
            detailed: level == LogLevel::Debug,
            colors: std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    fn filter_directive(&self) -> String {
        format!("tweetdb={}", self.level.as_str())
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LogConfig) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.filter_directive())
    };

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.colors)
        .with_target(config.detailed);

    let registry = tracing_subscriber::registry().with(env_filter);
    let _ = if config.detailed {
        registry.with(base.pretty()).try_init()
    } else {
        registry.with(base.compact().without_time()).try_init()
    };
}

/// Initialize logging from the CLI switches.
pub fn init_cli_logging(quiet: bool, verbose: bool) {
    init_logging(&LogConfig::for_cli(quiet, verbose));
}

/// Logs the start and end of an operation along with its duration.
pub struct OperationGuard {
    name: String,
    start: Instant,
}

impl OperationGuard {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        tracing::info!(operation = %name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Record success and how many rows the operation produced.
    pub fn complete(self, rows: usize) {
        tracing::info!(
            operation = %self.name,
            rows,
            duration_ms = self.start.elapsed().as_millis(),
            "Operation completed"
        );
    }

    pub fn fail(self, error: &dyn std::error::Error) {
        tracing::error!(
            operation = %self.name,
            duration_ms = self.start.elapsed().as_millis(),
            error = %error,
            "Operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_switches_pick_level() {
        assert_eq!(LogConfig::for_cli(false, false).level, LogLevel::Info);
        assert_eq!(LogConfig::for_cli(true, false).level, LogLevel::Error);
        assert_eq!(LogConfig::for_cli(true, true).level, LogLevel::Error);

        let verbose = LogConfig::for_cli(false, true);
        assert_eq!(verbose.level, LogLevel::Debug);
        assert!(verbose.detailed);
    }

    #[test]
    fn test_filter_directive_targets_crate() {
        let config = LogConfig::for_cli(true, false);
        assert_eq!(config.filter_directive(), "tweetdb=error");
    }

    #[test]
    fn test_operation_guard_completes() {
        init_logging(&LogConfig::for_cli(true, false));
        OperationGuard::new("fetch tweets for alice").complete(3);
    }
}
