//! Log sinks for the CLI.
//!
//! Events go to stderr, so stdout carries nothing but result JSON, and to
//! an append-only log file. `VOUCH_LOG` overrides the level filter with any
//! `EnvFilter` directive.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "VOUCH_LOG";

/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "validation.log";

/// Install the global subscriber.
///
/// A log file that cannot be opened is reported on stderr and skipped.
pub fn init(log_file: &Path, verbose: bool) -> anyhow::Result<()> {
    let file_layer = match open_log_file(log_file) {
        Ok(file) => Some(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            eprintln!("warning: {:#}; logging to stderr only", e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(build_filter(verbose))
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .context("failed to install logger")?;

    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

/// Filter from `VOUCH_LOG`, else our crates at info (debug when verbose).
fn build_filter(verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    EnvFilter::new(default_directives(verbose))
}

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!(
        "warn,vouch={level},vouch_core={level},vouch_runtime={level}",
        level = level
    )
}
