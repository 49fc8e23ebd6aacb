//! Retry policy and escalation choices for pages whose content cannot be found.

/// What to do once a page has failed `max_retries` content attempts in a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExhaustion {
    /// Keep retrying, optionally at a replacement URL supplied by the decision provider.
    Retry,
    /// Emit a placeholder chapter and move on.
    SkipWithPlaceholder,
    /// Stop the batch.
    Abort,
    /// Ask the decision provider each time.
    Ask,
}

impl OnExhaustion {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "retry" => Ok(OnExhaustion::Retry),
            "skip" | "placeholder" | "skip-with-placeholder" => {
                Ok(OnExhaustion::SkipWithPlaceholder)
            }
            "abort" | "fail" => Ok(OnExhaustion::Abort),
            "ask" | "prompt" => Ok(OnExhaustion::Ask),
            _ => Err(format!(
                "Invalid on_exhaustion value: '{}'. Use retry, skip, abort, or ask.",
                s
            )),
        }
    }
}

/// Outcome of one escalation. Redirecting the crawl and accepting a gap are distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    KeepRetrying,
    /// Fetch this chapter from another URL; the failure count carries over.
    Redirect(String),
    /// Record the chapter as unavailable.
    AcceptGap,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    pub on_exhaustion: OnExhaustion,
}

impl RetryPolicy {
    /// `max_retries` below 1 is raised to 1.
    pub fn new(max_retries: u32, on_exhaustion: OnExhaustion) -> Self {
        Self {
            max_retries: max_retries.max(1),
            on_exhaustion,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// True when the `failures`-th failed attempt should trigger an escalation.
    pub fn escalates_at(&self, failures: u32) -> bool {
        failures > 0 && failures % self.max_retries == 0
    }
}
