//! Packaging adapter: writes one harvested batch into its batch directory as EPUB or JSON.

use crate::epub::{write_epub, EpubError};
use crate::model::Book;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Output format selector for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Epub,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Epub => "epub",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error(transparent)]
    Epub(#[from] EpubError),

    #[error("Failed to write output: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write JSON: {0}")]
    Json(#[source] serde_json::Error),
}

/// `{novel} {initial}-{final}.{ext}`
pub fn package_file_name(novel: &str, range: (u32, u32), format: OutputFormat) -> String {
    format!("{} {}-{}.{}", novel, range.0, range.1, format.extension())
}

/// Write `book` into `batch_dir`, creating the directory. Returns the written path.
pub fn package_batch(
    book: &Book,
    batch_dir: &Path,
    novel: &str,
    format: OutputFormat,
) -> Result<PathBuf, PackageError> {
    fs::create_dir_all(batch_dir).map_err(|e| PackageError::Io {
        path: batch_dir.to_path_buf(),
        source: e,
    })?;
    let path = batch_dir.join(package_file_name(novel, book.range, format));
    match format {
        OutputFormat::Epub => write_epub(book, &path)?,
        OutputFormat::Json => {
            let f = fs::File::create(&path).map_err(|e| PackageError::Io {
                path: path.clone(),
                source: e,
            })?;
            serde_json::to_writer_pretty(f, book).map_err(PackageError::Json)?;
        }
    }
    info!(
        "Packaged chapters {}-{} into {}",
        book.range.0,
        book.range.1,
        path.display()
    );
    Ok(path)
}
