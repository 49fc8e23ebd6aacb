//! CLI parsing and orchestration. Resolves settings, runs one batch inside the novel's
//! log session, packages what was harvested, and maps errors to exit codes.

use crate::config::{self, Config, ConfigError, CrawlSettings};
use crate::crawl::decision::title_case;
use crate::crawl::{
    BatchReport, Console, CrawlError, Crawler, DecisionError, DecisionProvider, Escalation,
    FrontierStore, OnExhaustion, PageFetcher, Unattended,
};
use crate::logging::session_dispatch;
use crate::model::Book;
use crate::package::{package_batch, OutputFormat, PackageError};
use crate::scraper::{ContentCleaner, PageSelectors, PoliteClient, ScraperError, UserAgentPool};
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Decision(#[from] DecisionError),

    #[error("{0}")]
    Crawl(#[from] CrawlError),

    #[error("{0}")]
    Package(#[from] PackageError),

    #[error("Cannot open log file {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_)
            | CliRunError::Config(_)
            | CliRunError::Scraper(_)
            | CliRunError::Decision(_)
            | CliRunError::Crawl(CrawlError::Decision(_)) => 1,
            CliRunError::Crawl(_) => 2,
            CliRunError::Package(_) | CliRunError::Log { .. } => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "novelscrape")]
#[command(about = "Harvest a web novel chapter by chapter in resumable batches and write EPUB")]
#[command(
    after_help = "Config file keys (domain, next_button_id, content_class, max_retries, on_exhaustion, forbidden_line_patterns, excluded_phrases, output_dir, start_url, user_agents, request_delay_secs, timeout_secs, author, description, language) are read from ./novelscrape.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Novel name. Prompted for when absent.
    pub novel: Option<String>,

    /// Number of chapters to harvest in this run. Prompted for when absent.
    #[arg(short = 'n', long)]
    pub batch_size: Option<u32>,

    /// First chapter URL, used only when the novel has no saved progress.
    #[arg(long)]
    pub start_url: Option<String>,

    /// What to do when a chapter keeps failing: retry, skip, abort, or ask.
    #[arg(long, value_parser = parse_on_exhaustion)]
    pub on_exhaustion: Option<String>,

    /// Failed attempts per escalation.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Site root used to resolve relative next links.
    #[arg(long)]
    pub domain: Option<String>,

    /// id of the next-chapter anchor.
    #[arg(long)]
    pub next_button_id: Option<String>,

    /// Class of the block holding chapter text.
    #[arg(long)]
    pub content_class: Option<String>,

    /// Output root. Default: ./epub
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Output format: epub or json.
    #[arg(long, default_value = "epub", value_parser = parse_format)]
    pub format: OutputFormat,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug-level session log and verbose error chain.
    #[arg(long)]
    pub verbose: bool,

    /// Never prompt. Missing answers become errors; `ask` escalations abort.
    #[arg(long)]
    pub non_interactive: bool,
}

impl Args {
    /// Values given on the command line, layered over the config file.
    fn config_overrides(&self) -> Config {
        Config {
            domain: self.domain.clone(),
            next_button_id: self.next_button_id.clone(),
            content_class: self.content_class.clone(),
            max_retries: self.max_retries,
            on_exhaustion: self.on_exhaustion.clone(),
            output_dir: self.output_dir.clone(),
            start_url: self.start_url.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            ..Config::default()
        }
    }
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "epub" => Ok(OutputFormat::Epub),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!(
            "Invalid --format value: '{}'. Use epub or json.",
            s
        )),
    }
}

fn parse_on_exhaustion(s: &str) -> Result<String, String> {
    OnExhaustion::parse(s).map(|_| s.to_string())
}

/// Directory name for a novel: spaces become underscores.
fn novel_dir_name(novel: &str) -> Result<String, CliRunError> {
    let novel = novel.trim();
    if novel.is_empty() {
        return Err(CliRunError::InvalidInput(
            "Novel name must not be empty.".to_string(),
        ));
    }
    if novel.contains(['/', '\\']) || novel == "." || novel == ".." {
        return Err(CliRunError::InvalidInput(format!(
            "Novel name '{}' cannot be used as a directory name.",
            novel
        )));
    }
    Ok(novel.replace(' ', "_"))
}

fn resolve_settings(args: &Args) -> Result<CrawlSettings, CliRunError> {
    let file_config = config::load_config()?.unwrap_or_default();
    Ok(CrawlSettings::resolve(
        file_config.merge(args.config_overrides()),
    )?)
}

type StdioConsole = Console<std::io::StdinLock<'static>, std::io::Stderr>;

fn novel_name(args: &Args, console: Option<&mut StdioConsole>) -> Result<String, CliRunError> {
    match (&args.novel, console) {
        (Some(n), _) => Ok(title_case(n.trim())),
        (None, Some(c)) => Ok(c.ask_novel_name()?),
        (None, None) => Err(CliRunError::InvalidInput(
            "A novel name is required with --non-interactive.".to_string(),
        )),
    }
}

fn batch_size(args: &Args, console: Option<&mut StdioConsole>) -> Result<u32, CliRunError> {
    match (args.batch_size, console) {
        (Some(0), _) => Err(CliRunError::InvalidInput(
            "--batch-size must be at least 1.".to_string(),
        )),
        (Some(n), _) => Ok(n),
        (None, Some(c)) => Ok(c.ask_positive("Enter the number of chapters to scrape")?),
        (None, None) => Err(CliRunError::InvalidInput(
            "--batch-size is required with --non-interactive.".to_string(),
        )),
    }
}

/// Hides the progress bar while the wrapped provider prompts on the terminal.
struct SuspendProgress<'a> {
    inner: &'a mut dyn DecisionProvider,
    bar: &'a RefCell<Option<indicatif::ProgressBar>>,
}

impl SuspendProgress<'_> {
    fn hidden<R>(&mut self, f: impl FnOnce(&mut dyn DecisionProvider) -> R) -> R {
        let bar = self.bar.borrow().clone();
        match bar {
            Some(pb) => pb.suspend(|| f(&mut *self.inner)),
            None => f(&mut *self.inner),
        }
    }
}

impl DecisionProvider for SuspendProgress<'_> {
    fn seed_url(&mut self) -> Result<String, DecisionError> {
        self.hidden(|d| d.seed_url())
    }

    fn replacement_url(
        &mut self,
        index: u32,
        current_url: &str,
    ) -> Result<Option<String>, DecisionError> {
        self.hidden(|d| d.replacement_url(index, current_url))
    }

    fn escalate(&mut self, index: u32, current_url: &str) -> Result<Escalation, DecisionError> {
        self.hidden(|d| d.escalate(index, current_url))
    }
}

/// Metadata stamped on a packaged batch.
struct BatchMeta<'a> {
    novel: &'a str,
    author: &'a str,
    description: &'a str,
    language: &'a str,
    format: OutputFormat,
}

/// Package the harvested chapters, then commit the checkpoint. A failed write leaves the
/// frontier where it was. An aborted batch is packaged and committed before the abort is
/// returned.
fn finish_batch(
    mut report: BatchReport,
    frontier: &FrontierStore,
    meta: &BatchMeta<'_>,
    quiet: bool,
) -> Result<Option<PathBuf>, CliRunError> {
    let aborted = report.abort_error();
    let written = match report.range() {
        Some(range) => {
            let book = Book {
                title: meta.novel.to_string(),
                author: meta.author.to_string(),
                description: Some(meta.description.to_string()),
                language: meta.language.to_string(),
                chapters: std::mem::take(&mut report.chapters),
                range,
            };
            let batch_dir = frontier.batch_dir(range.0, range.1);
            Some(package_batch(&book, &batch_dir, meta.novel, meta.format)?)
        }
        None => None,
    };
    report.commit(frontier)?;

    if !quiet {
        match &written {
            Some(path) => eprintln!("Wrote {}", path.display()),
            None => eprintln!("No chapters harvested for {}.", meta.novel),
        }
    }
    match aborted {
        Some(e) => Err(e.into()),
        None => Ok(written),
    }
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let settings = resolve_settings(args)?;

    let mut console = if args.non_interactive {
        None
    } else {
        Some(Console::stdio())
    };
    let novel = novel_name(args, console.as_mut())?;
    let size = batch_size(args, console.as_mut())?;

    let novel_dir = settings.output_dir.join(novel_dir_name(&novel)?);
    let log_path = novel_dir.join(format!("{}.log", novel));
    let dispatch = session_dispatch(&log_path, args.verbose).map_err(|e| CliRunError::Log {
        path: log_path.clone(),
        source: e,
    })?;

    let client = PoliteClient::builder()
        .delay_secs(settings.request_delay_secs)
        .timeout_secs(settings.timeout_secs)
        .build()
        .map_err(ScraperError::from)?;
    let selectors = PageSelectors::new(
        &settings.domain,
        &settings.content_class,
        &settings.next_button_id,
    )?;
    let cleaner = ContentCleaner::new(
        &settings.forbidden_line_patterns,
        &settings.excluded_phrases,
    )?;
    let agents = UserAgentPool::new(settings.user_agents.clone());
    let fetcher = PageFetcher::new(client, selectors, cleaner, agents);
    let frontier = FrontierStore::new(&novel_dir);
    let mut crawler = Crawler::new(fetcher, frontier, settings.retry);

    let mut decisions: Box<dyn DecisionProvider> = match console {
        Some(c) => Box::new(c.with_seed_url(settings.start_url.clone())),
        None => Box::new(Unattended::new(
            settings.start_url.clone(),
            settings.retry.on_exhaustion,
        )),
    };

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, total: u32| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
            {
                bar.set_style(
                    style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                        .progress_chars("█▉▊▋▌▍▎▏ "),
                );
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(n as u64);
        pb.set_message(format!("Fetching chapter {}/{}", n, total));
    };
    let progress: Option<&dyn Fn(u32, u32)> = if args.quiet { None } else { Some(&progress_cb) };

    let mut prompts = SuspendProgress {
        inner: decisions.as_mut(),
        bar: &progress_state,
    };
    let report = tracing::dispatcher::with_default(&dispatch, || {
        crawler.run_batch(size, &mut prompts, progress)
    })?;

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    let meta = BatchMeta {
        novel: &novel,
        author: &settings.author,
        description: &settings.description,
        language: &settings.language,
        format: args.format,
    };
    tracing::dispatcher::with_default(&dispatch, || {
        finish_batch(report, crawler.frontier(), &meta, args.quiet)
    })?;
    Ok(())
}
