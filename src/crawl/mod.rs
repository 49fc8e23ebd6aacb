//! Batch crawl: resume from the frontier, follow next links for up to N chapters, then
//! checkpoint.
//!
//! The crawl is sequential by construction: chapter `i + 1`'s URL is only known once
//! chapter `i` has been fetched.

pub mod decision;
pub mod fetch;
pub mod frontier;
pub mod policy;

#[cfg(test)]
pub(crate) mod testing;

pub use decision::{Console, DecisionError, DecisionProvider, Unattended};
pub use fetch::{FetchOutcome, PageFetcher};
pub use frontier::{Frontier, FrontierError, FrontierStore};
pub use policy::{Escalation, OnExhaustion, RetryPolicy};

use crate::model::Chapter;
use crate::scraper::Transport;
use thiserror::Error;
use tracing::{error, info, info_span, warn};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Chapter {index} is unavailable at {url}; crawl aborted.")]
    ContentUnavailable { index: u32, url: String },

    #[error(transparent)]
    Frontier(#[from] FrontierError),

    #[error(transparent)]
    Decision(#[from] DecisionError),
}

/// Why a batch stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// All requested chapters were produced.
    BatchFilled,
    /// The previous page had no next link.
    EndOfContent,
    /// A chapter was given up on; it and everything after it are not recorded.
    Aborted { index: u32, url: String },
}

/// Outcome of one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Chapters in index order.
    pub chapters: Vec<Chapter>,
    pub start_index: u32,
    /// URL written to the frontier when the batch ended.
    pub checkpoint: String,
    pub termination: Termination,
}

impl BatchReport {
    /// Inclusive range of produced chapters; None when the batch produced nothing.
    pub fn range(&self) -> Option<(u32, u32)> {
        let first = self.chapters.first()?;
        let last = self.chapters.last()?;
        Some((first.index, last.index))
    }

    /// Append the checkpoint to the frontier. Call only once the batch is recorded on
    /// disk, so the frontier never points past chapters that were not saved.
    pub fn commit(&self, frontier: &FrontierStore) -> Result<(), CrawlError> {
        frontier.append(&self.checkpoint)?;
        info!("Checkpoint saved: {}", self.checkpoint);
        Ok(())
    }

    /// The abort as an error, for callers that package the partial batch first.
    pub fn abort_error(&self) -> Option<CrawlError> {
        match &self.termination {
            Termination::Aborted { index, url } => Some(CrawlError::ContentUnavailable {
                index: *index,
                url: url.clone(),
            }),
            _ => None,
        }
    }
}

/// Drives one batch over a page fetcher and a frontier store.
pub struct Crawler<T> {
    fetcher: PageFetcher<T>,
    frontier: FrontierStore,
    policy: RetryPolicy,
}

impl<T: Transport> Crawler<T> {
    pub fn new(fetcher: PageFetcher<T>, frontier: FrontierStore, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            frontier,
            policy,
        }
    }

    pub fn frontier(&self) -> &FrontierStore {
        &self.frontier
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &PageFetcher<T> {
        &self.fetcher
    }

    /// Harvest up to `size` chapters starting at the frontier.
    ///
    /// The report's checkpoint is the last known good URL: the next link of the last
    /// produced chapter, or the start URL. After an abort it points at the chapter that
    /// failed, never past it. Nothing is written to the frontier here beyond a first seed;
    /// the caller commits the checkpoint with [BatchReport::commit] after packaging.
    /// `progress` receives `(chapters attempted, size)` before each fetch.
    pub fn run_batch(
        &mut self,
        size: u32,
        decisions: &mut dyn DecisionProvider,
        progress: Option<&dyn Fn(u32, u32)>,
    ) -> Result<BatchReport, CrawlError> {
        let frontier = self.frontier.load(decisions)?;
        let start = frontier.start_index;
        let _span = info_span!("batch", start, size).entered();
        info!(
            "Starting batch of {} chapters at chapter {} from {}",
            size, start, frontier.start_url
        );

        let mut chapters: Vec<Chapter> = Vec::with_capacity(size as usize);
        let mut last_good = frontier.start_url.clone();
        let mut current: Option<String> = Some(frontier.start_url);
        let mut termination = Termination::BatchFilled;

        for attempted in 0..size {
            let index = start.saturating_add(attempted);
            if let Some(p) = progress {
                p(attempted + 1, size);
            }
            match self
                .fetcher
                .fetch_one(current.as_deref(), index, &self.policy, decisions)
            {
                Ok(FetchOutcome::EndOfContent) => {
                    termination = Termination::EndOfContent;
                    break;
                }
                Ok(FetchOutcome::Fetched { chapter, next_url }) => {
                    chapters.push(chapter);
                    if let Some(ref next) = next_url {
                        last_good = next.clone();
                    }
                    current = next_url;
                }
                Err(CrawlError::ContentUnavailable { index, url }) => {
                    error!("Batch aborted at chapter {}", index);
                    termination = Termination::Aborted { index, url };
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let report = BatchReport {
            chapters,
            start_index: start,
            checkpoint: last_good,
            termination,
        };
        match report.range() {
            Some((a, b)) => info!(
                "Batch finished with chapters {}-{} ({} unavailable, {:?}); checkpoint {}",
                a,
                b,
                report.chapters.iter().filter(|ch| ch.is_placeholder()).count(),
                report.termination,
                report.checkpoint
            ),
            None => warn!(
                "Batch produced no chapters ({:?}); checkpoint {}",
                report.termination, report.checkpoint
            ),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{chapter_page, empty_page, fetcher, FakeTransport, Scripted};
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn crawler(t: FakeTransport, policy: RetryPolicy) -> (TempDir, Crawler<FakeTransport>) {
        let dir = tempfile::tempdir().unwrap();
        let frontier = FrontierStore::new(dir.path().join("Novel"));
        (dir, Crawler::new(fetcher(t), frontier, policy))
    }

    fn url(n: u32) -> String {
        format!("https://example.com/ch/{}", n)
    }

    fn href(n: u32) -> String {
        format!("/ch/{}", n)
    }

    #[test]
    fn three_pages_then_no_next_link() {
        let mut t = FakeTransport::new();
        t.page(&url(1), chapter_page("one", Some(&href(2))));
        t.page(&url(2), chapter_page("two", Some(&href(3))));
        t.page(&url(3), chapter_page("three", None));
        let (_dir, mut c) = crawler(t, RetryPolicy::new(3, OnExhaustion::Abort));
        let mut d = Scripted::seeded(&url(1));

        let report = c.run_batch(3, &mut d, None).unwrap();

        let indices: Vec<u32> = report.chapters.iter().map(|ch| ch.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(report.range(), Some((1, 3)));
        assert_eq!(report.termination, Termination::BatchFilled);
        assert_eq!(report.checkpoint, url(3));
        report.commit(c.frontier()).unwrap();
        assert_eq!(c.frontier().last_url().unwrap(), Some(url(3)));
    }

    #[test]
    fn end_of_content_stops_early_and_reports_actual_range() {
        let mut t = FakeTransport::new();
        t.page(&url(1), chapter_page("one", Some(&href(2))));
        t.page(&url(2), chapter_page("two", None));
        let (_dir, mut c) = crawler(t, RetryPolicy::new(3, OnExhaustion::Abort));
        let mut d = Scripted::seeded(&url(1));

        let report = c.run_batch(10, &mut d, None).unwrap();

        assert_eq!(report.range(), Some((1, 2)));
        assert_eq!(report.termination, Termination::EndOfContent);
        assert_eq!(report.checkpoint, url(2));
        assert!(report.abort_error().is_none());
    }

    #[test]
    fn placeholder_chapter_keeps_the_crawl_going() {
        let mut t = FakeTransport::new();
        t.page(&url(1), chapter_page("one", Some(&href(2))));
        t.page(&url(2), empty_page(Some(&href(3))));
        t.page(&url(3), chapter_page("three", Some(&href(4))));
        t.page(&url(4), chapter_page("four", Some(&href(5))));
        t.page(&url(5), chapter_page("five", Some(&href(6))));
        let (_dir, mut c) = crawler(t, RetryPolicy::new(3, OnExhaustion::SkipWithPlaceholder));
        let mut d = Scripted::seeded(&url(1));

        let report = c.run_batch(5, &mut d, None).unwrap();

        assert_eq!(report.chapters.len(), 5);
        assert_eq!(report.chapters[1].body, "Chapter not available");
        assert!(report.chapters[2].body.contains("three"));
        let page_two_hits = c
            .fetcher()
            .transport()
            .requests()
            .iter()
            .filter(|(u, _)| *u == url(2))
            .count();
        assert_eq!(page_two_hits, 3);
        assert_eq!(report.checkpoint, url(6));
    }

    #[test]
    fn placeholder_without_next_link_ends_the_batch() {
        let mut t = FakeTransport::new();
        t.page(&url(1), chapter_page("one", Some(&href(2))));
        t.page(&url(2), empty_page(None));
        let (_dir, mut c) = crawler(t, RetryPolicy::new(3, OnExhaustion::SkipWithPlaceholder));
        let mut d = Scripted::seeded(&url(1));

        let report = c.run_batch(5, &mut d, None).unwrap();

        assert_eq!(report.range(), Some((1, 2)));
        assert!(report.chapters[1].is_placeholder());
        assert_eq!(report.termination, Termination::EndOfContent);
        assert_eq!(report.checkpoint, url(2));
    }

    #[test]
    fn abort_keeps_completed_chapters_and_checkpoints_failed_page() {
        let mut t = FakeTransport::new();
        t.page(&url(1), chapter_page("one", Some(&href(2))));
        t.page(&url(2), chapter_page("two", Some(&href(3))));
        t.page(&url(3), empty_page(Some(&href(4))));
        let (_dir, mut c) = crawler(t, RetryPolicy::new(2, OnExhaustion::Abort));
        let mut d = Scripted::seeded(&url(1));

        let report = c.run_batch(5, &mut d, None).unwrap();

        assert_eq!(report.range(), Some((1, 2)));
        assert_eq!(
            report.termination,
            Termination::Aborted {
                index: 3,
                url: url(3)
            }
        );
        assert!(matches!(
            report.abort_error(),
            Some(CrawlError::ContentUnavailable { index: 3, .. })
        ));
        report.commit(c.frontier()).unwrap();
        assert_eq!(c.frontier().last_url().unwrap(), Some(url(3)));
    }

    #[test]
    fn resumes_after_completed_batches() {
        let mut t = FakeTransport::new();
        t.page(&url(11), chapter_page("eleven", Some(&href(12))));
        t.page(&url(12), chapter_page("twelve", Some(&href(13))));
        let (_dir, mut c) = crawler(t, RetryPolicy::new(3, OnExhaustion::Abort));
        std::fs::create_dir_all(c.frontier().batch_dir(1, 10)).unwrap();
        c.frontier().append(&url(11)).unwrap();
        let mut d = Scripted::default();

        let report = c.run_batch(2, &mut d, None).unwrap();

        assert_eq!(report.start_index, 11);
        assert_eq!(report.range(), Some((11, 12)));
        assert_eq!(report.chapters[0].title, "Chapter 11");
        assert_eq!(d.seeds_asked, 0);
        report.commit(c.frontier()).unwrap();
        assert_eq!(c.frontier().last_url().unwrap(), Some(url(13)));
    }

    #[test]
    fn frontier_is_untouched_until_commit() {
        let pages = || {
            let mut t = FakeTransport::new();
            t.page(&url(1), chapter_page("one", Some(&href(2))));
            t.page(&url(2), chapter_page("two", Some(&href(3))));
            t.page(&url(3), chapter_page("three", Some(&href(4))));
            t.page(&url(4), chapter_page("four", Some(&href(5))));
            t
        };
        let (dir, mut c) = crawler(pages(), RetryPolicy::new(3, OnExhaustion::Abort));
        let first = c.run_batch(3, &mut Scripted::seeded(&url(1)), None).unwrap();
        assert_eq!(first.checkpoint, url(4));
        assert_eq!(c.frontier().last_url().unwrap(), Some(url(1)));

        // batch never recorded: the next run harvests the same chapters again
        let frontier = FrontierStore::new(dir.path().join("Novel"));
        let mut again = Crawler::new(
            fetcher(pages()),
            frontier,
            RetryPolicy::new(3, OnExhaustion::Abort),
        );
        let second = again.run_batch(3, &mut Scripted::default(), None).unwrap();
        assert_eq!(second.range(), Some((1, 3)));
        assert!(second.chapters[0].body.contains("one"));
    }

    #[test]
    fn committed_batch_resumes_at_next_chapter() {
        let mut t = FakeTransport::new();
        t.page(&url(1), chapter_page("one", Some(&href(2))));
        t.page(&url(2), chapter_page("two", Some(&href(3))));
        t.page(&url(3), chapter_page("three", None));
        let (_dir, mut c) = crawler(t, RetryPolicy::new(3, OnExhaustion::Abort));
        let first = c.run_batch(2, &mut Scripted::seeded(&url(1)), None).unwrap();
        std::fs::create_dir_all(c.frontier().batch_dir(1, 2)).unwrap();
        first.commit(c.frontier()).unwrap();

        let second = c.run_batch(2, &mut Scripted::default(), None).unwrap();
        assert_eq!(second.start_index, 3);
        assert_eq!(second.range(), Some((3, 3)));
        assert!(second.chapters[0].body.contains("three"));
    }

    #[test]
    fn progress_reports_each_attempt() {
        let mut t = FakeTransport::new();
        t.page(&url(1), chapter_page("one", Some(&href(2))));
        t.page(&url(2), chapter_page("two", Some(&href(3))));
        let (_dir, mut c) = crawler(t, RetryPolicy::new(3, OnExhaustion::Abort));
        let mut d = Scripted::seeded(&url(1));
        let seen = RefCell::new(Vec::new());
        let cb: &dyn Fn(u32, u32) = &|n, total| seen.borrow_mut().push((n, total));

        c.run_batch(2, &mut d, Some(cb)).unwrap();

        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn zero_size_batch_fetches_nothing() {
        let (_dir, mut c) = crawler(
            FakeTransport::new(),
            RetryPolicy::new(3, OnExhaustion::Abort),
        );
        let mut d = Scripted::seeded(&url(1));
        let report = c.run_batch(0, &mut d, None).unwrap();
        assert!(report.chapters.is_empty());
        assert_eq!(report.range(), None);
        assert!(c.fetcher().transport().requests().is_empty());
        report.commit(c.frontier()).unwrap();
        assert_eq!(c.frontier().last_url().unwrap(), Some(url(1)));
    }
}
