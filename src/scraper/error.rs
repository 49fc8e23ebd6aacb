//! Errors raised while talking to the source site or reading its pages.

use thiserror::Error;

/// Transport-level failure for a single request. Always treated as transient by the fetcher.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Produced by non-reqwest transports (test doubles, proxies).
    #[error("Transport failure for {url}: {reason}")]
    Other { url: String, reason: String },
}

/// Setup errors for the page fetcher and HTTP client.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
