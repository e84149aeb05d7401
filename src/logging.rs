//! Tracing subscriber setup.
//!
//! Two outputs: a human-readable stream on stderr and an append-only process
//! log file (no ANSI codes) carrying timestamp, level and message for every
//! job event.
//!
//! Filter priority: `PAYG_LOG` > `RUST_LOG` > `--verbose` (debug) > info.

use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Install the global subscriber. Call once, before any job runs.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = build_env_filter(verbose);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false);

    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("tracing subscriber already initialised")?;
    Ok(())
}

fn build_env_filter(verbose: bool) -> EnvFilter {
    if let Ok(directives) = std::env::var("PAYG_LOG") {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(fallback_directives(verbose))
}

fn fallback_directives(verbose: bool) -> &'static str {
    if verbose { "payg=debug,info" } else { "info" }
}

/// Open the process log for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn verbose_raises_crate_level() {
        assert_eq!(fallback_directives(true), "payg=debug,info");
        assert_eq!(fallback_directives(false), "info");
        assert!(EnvFilter::try_new(fallback_directives(true)).is_ok());
    }

    #[test]
    fn log_file_is_append_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("print_log.txt");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
