//! Site access: HTTP transport, page parsing, and content cleaning.

mod client;
mod error;

pub mod clean;
pub mod page;

pub use clean::{ContentCleaner, MarkupFragment};
pub use client::{
    HttpResponse, PoliteClient, PoliteClientBuilder, Transport, UserAgentPool,
    DEFAULT_USER_AGENTS,
};
pub use error::{ScraperError, TransportError};
pub use page::{resolve_next_link, PageSelectors, ParsedPage};

use scraper::Selector;

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::InvalidSelector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}
