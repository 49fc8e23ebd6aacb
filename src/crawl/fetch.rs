//! Page fetcher: one chapter's GET, parse, and retry loop.

use super::decision::DecisionProvider;
use super::policy::{Escalation, OnExhaustion, RetryPolicy};
use super::CrawlError;
use crate::model::Chapter;
use crate::scraper::{ContentCleaner, PageSelectors, Transport, UserAgentPool};
use tracing::{error, info, warn};

/// Result of fetching one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// There was no URL to fetch: the novel has no more chapters upstream.
    EndOfContent,
    /// A chapter (real or placeholder) and the next chapter's URL, if the page had one.
    Fetched {
        chapter: Chapter,
        next_url: Option<String>,
    },
}

pub struct PageFetcher<T> {
    transport: T,
    selectors: PageSelectors,
    cleaner: ContentCleaner,
    agents: UserAgentPool,
}

impl<T: Transport> PageFetcher<T> {
    pub fn new(
        transport: T,
        selectors: PageSelectors,
        cleaner: ContentCleaner,
        agents: UserAgentPool,
    ) -> Self {
        Self {
            transport,
            selectors,
            cleaner,
            agents,
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch chapter `index` from `url`.
    ///
    /// Transport failures are retried without limit and do not count as failed attempts.
    /// A page without the content block counts as one failed attempt; every
    /// `policy.max_retries()` failed attempts the policy decides what happens next.
    pub fn fetch_one(
        &mut self,
        url: Option<&str>,
        index: u32,
        policy: &RetryPolicy,
        decisions: &mut dyn DecisionProvider,
    ) -> Result<FetchOutcome, CrawlError> {
        let Some(url) = url else {
            info!("No more chapters to scrape. Stopping at chapter {}", index);
            return Ok(FetchOutcome::EndOfContent);
        };
        let mut url = url.to_string();
        let mut failures: u32 = 0;

        loop {
            let user_agent = self.agents.random().to_string();
            let response = match self.transport.get(&url, &user_agent) {
                Ok(r) => r,
                Err(e) => {
                    error!("Failed to get {}: {}", url, e);
                    continue;
                }
            };
            if !response.is_success() {
                warn!(
                    "HTTP {} for chapter {} at {}",
                    response.status, index, url
                );
            }

            let page = self.selectors.parse(&response.body);
            if let Some(fragment) = page.content {
                let chapter = Chapter::new(index, self.cleaner.clean(&fragment));
                info!(
                    "Successfully scraped chapter {} from URL {} on attempt {}",
                    index,
                    url,
                    failures + 1
                );
                return Ok(FetchOutcome::Fetched {
                    chapter,
                    next_url: page.next_url,
                });
            }

            failures += 1;
            if !policy.escalates_at(failures) {
                info!("Retrying {} for the {} time", url, failures);
                continue;
            }

            match resolve_escalation(policy, index, &url, decisions)? {
                Escalation::KeepRetrying => {
                    info!(
                        "Chapter {} still missing after {} attempts; retrying {}",
                        index, failures, url
                    );
                }
                Escalation::Redirect(new_url) => {
                    info!("Attempting scrape for new URL: {}", new_url);
                    url = new_url;
                }
                Escalation::AcceptGap => {
                    warn!("Unable to scrape chapter {}. Continuing.", index);
                    return Ok(FetchOutcome::Fetched {
                        chapter: Chapter::placeholder(index),
                        next_url: page.next_url,
                    });
                }
                Escalation::Abort => {
                    error!(
                        "Giving up on chapter {} at {} after {} attempts",
                        index, url, failures
                    );
                    return Err(CrawlError::ContentUnavailable { index, url });
                }
            }
        }
    }
}

fn resolve_escalation(
    policy: &RetryPolicy,
    index: u32,
    url: &str,
    decisions: &mut dyn DecisionProvider,
) -> Result<Escalation, CrawlError> {
    Ok(match policy.on_exhaustion {
        OnExhaustion::SkipWithPlaceholder => Escalation::AcceptGap,
        OnExhaustion::Abort => Escalation::Abort,
        OnExhaustion::Retry => match decisions.replacement_url(index, url)? {
            Some(replacement) => Escalation::Redirect(replacement),
            None => Escalation::KeepRetrying,
        },
        OnExhaustion::Ask => decisions.escalate(index, url)?,
    })
}
