use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::error::Result;

const LOG_PREFIX: &str = "relay.log.";

/// Console level while serving: our own debug output, everyone else's info.
pub const SERVE_CONSOLE_DIRECTIVES: &str = "linecord=debug,info";
/// Console level for one-shot commands.
pub const COMMAND_CONSOLE_DIRECTIVES: &str = "warn";
/// The log file keeps info and above regardless of `RUST_LOG`.
pub const FILE_DIRECTIVES: &str = "info";

/// `{dir}/relay.log.{YYYYMMDD}`
pub fn log_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{LOG_PREFIX}{}", date.format("%Y%m%d")))
}

/// Dated log files in `dir`, oldest first.
pub fn dated_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(LOG_PREFIX))
                .is_some_and(|date| NaiveDate::parse_from_str(date, "%Y%m%d").is_ok())
        })
        .collect();
    // YYYYMMDD sorts lexically in date order
    files.sort();
    Ok(files)
}

/// Delete all but the newest `keep` dated log files.
pub fn prune_logs(dir: &Path, keep: usize) -> Result<usize> {
    let files = dated_log_files(dir)?;
    let excess = files.len().saturating_sub(keep);
    for path in &files[..excess] {
        std::fs::remove_file(path)?;
    }
    Ok(excess)
}

fn default_console_filter(serving: bool) -> EnvFilter {
    EnvFilter::new(if serving {
        SERVE_CONSOLE_DIRECTIVES
    } else {
        COMMAND_CONSOLE_DIRECTIVES
    })
}

fn file_filter() -> EnvFilter {
    EnvFilter::new(FILE_DIRECTIVES)
}

/// Stderr always; with `file` set, also today's dated file under `file.dir`.
///
/// Each layer has its own filter: `RUST_LOG` only tunes the console.
pub fn init_tracing(file: Option<&LoggingConfig>) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_console_filter(file.is_some()));
    let stderr_layer = tracing_subscriber::fmt::layer().with_filter(console_filter);

    let file_layer = match file {
        Some(logging) => {
            let dir = PathBuf::from(&logging.dir);
            std::fs::create_dir_all(&dir)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file_path(&dir, Local::now().date_naive()))?;
            prune_logs(&dir, logging.keep_files.max(1))?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .with_filter(file_filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
