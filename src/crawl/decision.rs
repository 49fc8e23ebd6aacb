//! Decision providers: where the seed URL and escalation answers come from.

use super::policy::{Escalation, OnExhaustion};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("No start URL: the novel has no saved progress and none was provided (use --start-url or answer the prompt).")]
    NoSeedUrl,

    #[error("Input closed while waiting for an answer.")]
    InputClosed,

    #[error("Failed to read answer: {0}")]
    Io(#[from] io::Error),
}

/// Answers the questions the crawl cannot settle on its own.
pub trait DecisionProvider {
    /// First chapter URL for a novel with no saved progress.
    fn seed_url(&mut self) -> Result<String, DecisionError>;

    /// Replacement URL for a chapter under the `retry` policy. None keeps the current URL.
    fn replacement_url(
        &mut self,
        index: u32,
        current_url: &str,
    ) -> Result<Option<String>, DecisionError>;

    /// Choice for a chapter under the `ask` policy.
    fn escalate(&mut self, index: u32, current_url: &str) -> Result<Escalation, DecisionError>;
}

/// Non-interactive provider. Answers from configuration only.
#[derive(Debug, Clone)]
pub struct Unattended {
    seed_url: Option<String>,
    fallback: Escalation,
}

impl Unattended {
    /// `fallback` decides `ask` escalations; `ask` itself (nobody to ask) aborts.
    pub fn new(seed_url: Option<String>, fallback: OnExhaustion) -> Self {
        let fallback = match fallback {
            OnExhaustion::Retry => Escalation::KeepRetrying,
            OnExhaustion::SkipWithPlaceholder => Escalation::AcceptGap,
            OnExhaustion::Abort | OnExhaustion::Ask => Escalation::Abort,
        };
        Self { seed_url, fallback }
    }
}

impl DecisionProvider for Unattended {
    fn seed_url(&mut self) -> Result<String, DecisionError> {
        self.seed_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or(DecisionError::NoSeedUrl)
    }

    fn replacement_url(&mut self, _: u32, _: &str) -> Result<Option<String>, DecisionError> {
        Ok(None)
    }

    fn escalate(&mut self, _: u32, _: &str) -> Result<Escalation, DecisionError> {
        Ok(self.fallback.clone())
    }
}

/// Line-based prompts on a reader/writer pair (stdin/stderr in the CLI).
pub struct Console<R, W> {
    input: R,
    output: W,
    seed_url: Option<String>,
}

impl Console<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            seed_url: None,
        }
    }

    /// Use this URL instead of prompting when the novel has no saved progress.
    pub fn with_seed_url(mut self, seed_url: Option<String>) -> Self {
        self.seed_url = seed_url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Print `prompt` and read one trimmed line.
    pub fn ask_line(&mut self, prompt: &str) -> Result<String, DecisionError> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(DecisionError::InputClosed);
        }
        Ok(line.trim().to_string())
    }

    /// Re-prompts until the answer parses as a positive integer.
    pub fn ask_positive(&mut self, prompt: &str) -> Result<u32, DecisionError> {
        loop {
            let answer = self.ask_line(&format!("{}: ", prompt))?;
            match answer.parse::<u32>() {
                Ok(n) if n > 0 => return Ok(n),
                _ => continue,
            }
        }
    }

    /// Novel name, title-cased like "Shadow Slave".
    pub fn ask_novel_name(&mut self) -> Result<String, DecisionError> {
        loop {
            let answer = self.ask_line("Enter the name of the novel: ")?;
            if !answer.is_empty() {
                return Ok(title_case(&answer));
            }
        }
    }
}

impl<R: BufRead, W: Write> DecisionProvider for Console<R, W> {
    fn seed_url(&mut self) -> Result<String, DecisionError> {
        if let Some(url) = self.seed_url.take() {
            return Ok(url);
        }
        loop {
            let answer = self.ask_line("Enter the First URL: ")?;
            if !answer.is_empty() {
                return Ok(answer);
            }
        }
    }

    fn replacement_url(
        &mut self,
        index: u32,
        _current_url: &str,
    ) -> Result<Option<String>, DecisionError> {
        let answer = self.ask_line(&format!(
            "Enter the URL for chapter {} (blank to keep retrying): ",
            index
        ))?;
        Ok(Some(answer).filter(|a| !a.is_empty()))
    }

    fn escalate(&mut self, index: u32, current_url: &str) -> Result<Escalation, DecisionError> {
        writeln!(
            self.output,
            "Chapter {} has no content at {}.",
            index, current_url
        )?;
        loop {
            let answer = self.ask_line(
                "Keep retrying (y), try another URL (c), skip with placeholder (n), abort (a): ",
            )?;
            match answer.to_lowercase().as_str() {
                "y" => return Ok(Escalation::KeepRetrying),
                "n" => return Ok(Escalation::AcceptGap),
                "a" => return Ok(Escalation::Abort),
                "c" => {
                    return Ok(match self.replacement_url(index, current_url)? {
                        Some(url) => Escalation::Redirect(url),
                        None => Escalation::KeepRetrying,
                    })
                }
                _ => writeln!(self.output, "Please answer y, c, n, or a.")?,
            }
        }
    }
}

/// Uppercase the first letter of each word and lowercase the rest.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
