//! Internal diagnostic logging (§11): lock grants, waits-for edges, retry
//! attempts — never the mandated simulation output, which is always the
//! `OutputEvent` stream rendered regardless of log level. Grounded in the
//! host family's dedicated `trace` module: a `fern::Dispatch` writing
//! leveled, timestamped lines to a log file, plus a `warn`-and-above mirror
//! to stderr so operational problems surface unprompted.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use log::LevelFilter;

/// Installs the one global logger. Safe to call more than once in tests —
/// a second call is a no-op rather than a panic, since `fern`/`log` only
/// allow a single global logger per process.
pub fn init(log_dir: &Path, level: &str) -> Result<()> {
    let level = LevelFilter::from_str(level).with_context(|| format!("invalid log level '{level}'"))?;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let log_file = log_dir.join("repcrec.log");

    let file_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} [{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(fern::log_file(&log_file).with_context(|| format!("opening {}", log_file.display()))?);

    let stderr_dispatch = fern::Dispatch::new()
        .level(LevelFilter::Warn)
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .chain(std::io::stderr());

    let result = fern::Dispatch::new().chain(file_dispatch).chain(stderr_dispatch).apply();
    if result.is_err() {
        // A logger is already installed (e.g. a previous test in this
        // process) — not a fatal condition for the driver.
        log::debug!("logger was already installed; skipping re-init");
    }
    Ok(())
}
