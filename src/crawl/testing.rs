//! Test doubles for the crawl: scripted transport and decision provider.

use super::decision::{DecisionError, DecisionProvider};
use super::fetch::PageFetcher;
use super::policy::Escalation;
use crate::scraper::{
    ContentCleaner, HttpResponse, PageSelectors, Transport, TransportError, UserAgentPool,
};
use std::collections::{HashMap, VecDeque};

pub const DOMAIN: &str = "https://example.com";

/// Per-URL queue of responses. The last queued response repeats forever; unknown URLs 404.
#[derive(Debug, Default)]
pub struct FakeTransport {
    scripts: HashMap<String, VecDeque<Result<HttpResponse, String>>>,
    requests: Vec<(String, String)>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&mut self, url: &str, body: String) {
        self.scripts
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(HttpResponse { status: 200, body }));
    }

    pub fn transport_failures(&mut self, url: &str, count: usize) {
        let queue = self.scripts.entry(url.to_string()).or_default();
        for _ in 0..count {
            queue.push_back(Err("connection reset".to_string()));
        }
    }

    /// (url, user agent) of every request, in order.
    pub fn requests(&self) -> &[(String, String)] {
        &self.requests
    }
}

impl Transport for FakeTransport {
    fn get(&mut self, url: &str, user_agent: &str) -> Result<HttpResponse, TransportError> {
        self.requests.push((url.to_string(), user_agent.to_string()));
        let next = match self.scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(TransportError::Other {
                url: url.to_string(),
                reason,
            }),
            None => Ok(HttpResponse {
                status: 404,
                body: "<html><body>Not found</body></html>".to_string(),
            }),
        }
    }
}

/// Decision provider answering from queues; empty queues abort / keep the URL.
#[derive(Debug, Default)]
pub struct Scripted {
    pub seed: Option<String>,
    escalations: VecDeque<Escalation>,
    replacements: VecDeque<Option<String>>,
    pub escalations_asked: usize,
    pub seeds_asked: usize,
}

impl Scripted {
    pub fn seeded(url: &str) -> Self {
        Self {
            seed: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn escalations(answers: Vec<Escalation>) -> Self {
        Self {
            escalations: answers.into(),
            ..Self::default()
        }
    }

    pub fn replacements(answers: Vec<Option<String>>) -> Self {
        Self {
            replacements: answers.into(),
            ..Self::default()
        }
    }
}

impl DecisionProvider for Scripted {
    fn seed_url(&mut self) -> Result<String, DecisionError> {
        self.seeds_asked += 1;
        self.seed.clone().ok_or(DecisionError::NoSeedUrl)
    }

    fn replacement_url(&mut self, _: u32, _: &str) -> Result<Option<String>, DecisionError> {
        Ok(self.replacements.pop_front().flatten())
    }

    fn escalate(&mut self, _: u32, _: &str) -> Result<Escalation, DecisionError> {
        self.escalations_asked += 1;
        Ok(self.escalations.pop_front().unwrap_or(Escalation::Abort))
    }
}

pub fn fetcher(transport: FakeTransport) -> PageFetcher<FakeTransport> {
    PageFetcher::new(
        transport,
        PageSelectors::new(DOMAIN, "txt", "next_chap").unwrap(),
        ContentCleaner::with_defaults().unwrap(),
        UserAgentPool::default(),
    )
}

fn next_anchor(next: Option<&str>) -> String {
    next.map(|href| format!(r#"<a id="next_chap" href="{}">Next</a>"#, href))
        .unwrap_or_default()
}

/// Chapter page whose content block ends with a boilerplate paragraph.
pub fn chapter_page(text: &str, next: Option<&str>) -> String {
    format!(
        r#"<html><body><div class="txt"><p>{}</p><p>trailing boilerplate</p></div>{}</body></html>"#,
        text,
        next_anchor(next)
    )
}

/// Page without the content block (e.g. a rate-limit interstitial).
pub fn empty_page(next: Option<&str>) -> String {
    format!(
        r#"<html><body><div class="notice">Please wait</div>{}</body></html>"#,
        next_anchor(next)
    )
}
