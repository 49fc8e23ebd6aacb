//! Per-novel operational log.
//!
//! Each crawl session gets its own `tracing` dispatcher writing to the novel's log file.
//! Callers install it with [tracing::dispatcher::with_default] around the crawl, so no
//! process-wide subscriber is set.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;

/// Build a dispatcher appending `timestamp LEVEL message` lines to `path`.
pub fn session_dispatch(path: &Path, verbose: bool) -> io::Result<Dispatch> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_max_level(level)
        .finish();
    Ok(Dispatch::new(subscriber))
}
