//! novelscrape: resumable batch harvester for serialized web novels, outputting EPUB.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod epub;
pub mod logging;
pub mod model;
pub mod package;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use crate::crawl::{BatchReport, CrawlError, Crawler, FrontierStore, Termination};
pub use crate::epub::{write_epub, EpubError};
pub use crate::model::{Book, Chapter};
pub use crate::package::{package_batch, OutputFormat, PackageError};
pub use crate::scraper::{PoliteClient, PoliteClientBuilder, ScraperError, Transport};
