//! Frontier store: the append-only URL checkpoint plus the batch directories that record
//! which chapter indices are complete.

use super::decision::DecisionProvider;
use super::CrawlError;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

pub const LINKS_FILE_NAME: &str = "Links.txt";

#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Cannot read frontier file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write frontier file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot scan batch directories in {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the next batch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontier {
    pub start_url: String,
    pub start_index: u32,
    /// Highest chapter index recorded by a completed batch.
    pub last_index: Option<u32>,
}

/// Checkpoint for one novel, rooted at the novel's output directory.
#[derive(Debug, Clone)]
pub struct FrontierStore {
    novel_dir: PathBuf,
    links_path: PathBuf,
}

impl FrontierStore {
    pub fn new(novel_dir: impl Into<PathBuf>) -> Self {
        let novel_dir = novel_dir.into();
        let links_path = novel_dir.join(LINKS_FILE_NAME);
        Self {
            novel_dir,
            links_path,
        }
    }

    #[cfg(test)]
    pub fn novel_dir(&self) -> &std::path::Path {
        &self.novel_dir
    }

    #[cfg(test)]
    pub fn links_path(&self) -> &std::path::Path {
        &self.links_path
    }

    /// Directory that holds the package for chapters `initial..=end`.
    pub fn batch_dir(&self, initial: u32, end: u32) -> PathBuf {
        self.novel_dir.join(format!("{}-{}", initial, end))
    }

    /// Resume point. Without a saved URL the seed comes from `decisions` and is persisted
    /// before returning.
    pub fn load(&self, decisions: &mut dyn DecisionProvider) -> Result<Frontier, CrawlError> {
        let start_url = match self.last_url()? {
            Some(url) => url,
            None => {
                let seed = decisions.seed_url()?.trim().to_string();
                self.append(&seed)?;
                info!("No saved progress; starting from {}", seed);
                seed
            }
        };
        let last_index = self.highest_completed_index()?;
        let start_index = last_index.map_or(1, |n| n.saturating_add(1));
        debug!(
            "Frontier loaded: url={} start_index={}",
            start_url, start_index
        );
        Ok(Frontier {
            start_url,
            start_index,
            last_index,
        })
    }

    /// Most recent non-blank line of the frontier file.
    pub fn last_url(&self) -> Result<Option<String>, FrontierError> {
        let contents = match fs::read_to_string(&self.links_path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FrontierError::Read {
                    path: self.links_path.clone(),
                    source: e,
                })
            }
        };
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map(String::from))
    }

    /// Append `url` unless it already is the most recent entry. Synced to disk before
    /// returning.
    pub fn append(&self, url: &str) -> Result<(), FrontierError> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(());
        }
        if self.last_url()?.as_deref() == Some(url) {
            return Ok(());
        }
        let write_err = |e| FrontierError::Write {
            path: self.links_path.clone(),
            source: e,
        };
        fs::create_dir_all(&self.novel_dir).map_err(write_err)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.links_path)
            .map_err(write_err)?;
        writeln!(file, "{}", url).map_err(write_err)?;
        file.sync_data().map_err(write_err)?;
        Ok(())
    }

    /// Largest `end` among `{initial}-{end}` directories; None when there are none.
    pub fn highest_completed_index(&self) -> Result<Option<u32>, FrontierError> {
        let entries = match fs::read_dir(&self.novel_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FrontierError::Scan {
                    path: self.novel_dir.clone(),
                    source: e,
                })
            }
        };
        let mut highest: Option<u32> = None;
        for entry in entries {
            let entry = entry.map_err(|e| FrontierError::Scan {
                path: self.novel_dir.clone(),
                source: e,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some((_, end)) = name.to_str().and_then(parse_batch_name) {
                highest = Some(highest.map_or(end, |h| h.max(end)));
            }
        }
        Ok(highest)
    }
}

/// Parse a batch directory name `{initial}-{end}`.
pub fn parse_batch_name(name: &str) -> Option<(u32, u32)> {
    let (initial, end) = name.split_once('-')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(initial) || !all_digits(end) {
        return None;
    }
    Some((initial.parse().ok()?, end.parse().ok()?))
}
