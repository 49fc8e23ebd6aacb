//! Config file loading and validation. Search order: ./novelscrape.toml, then
//! $XDG_CONFIG_HOME/novelscrape/config.toml (or ~/.config/novelscrape/config.toml).

use crate::crawl::{OnExhaustion, RetryPolicy};
use crate::scraper::clean::{DEFAULT_EXCLUDED_PHRASES, DEFAULT_FORBIDDEN_LINE_PATTERNS};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_OUTPUT_DIR: &str = "epub";
const DEFAULT_AUTHOR: &str = "Unknown";
const DEFAULT_DESCRIPTION: &str = "A Novel";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_DELAY_SECS: u64 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration value: {key}. Set it in novelscrape.toml or pass --{flag}.", flag = .key.replace('_', "-"))]
    Missing { key: &'static str },

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cannot determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Site root prefixed to relative next links, e.g. "https://libread.com".
    pub domain: Option<String>,
    /// id of the `<a>` element linking to the next chapter.
    pub next_button_id: Option<String>,
    /// class of the `<div>` holding chapter text.
    pub content_class: Option<String>,
    /// Failed content attempts per escalation.
    pub max_retries: Option<u32>,
    /// retry, skip, abort, or ask (default ask).
    pub on_exhaustion: Option<String>,
    /// Lines containing any of these (case-insensitive) are dropped.
    pub forbidden_line_patterns: Option<Vec<String>>,
    /// Removed wherever they occur (case-sensitive).
    pub excluded_phrases: Option<Vec<String>>,
    /// Root for per-novel directories. Relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// First chapter URL for a novel without saved progress.
    pub start_url: Option<String>,
    /// User agents to rotate through; defaults to a built-in browser list.
    pub user_agents: Option<Vec<String>>,
    pub request_delay_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
}

impl Config {
    /// Values set in `overrides` win over values in `self`.
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            domain: overrides.domain.or(self.domain),
            next_button_id: overrides.next_button_id.or(self.next_button_id),
            content_class: overrides.content_class.or(self.content_class),
            max_retries: overrides.max_retries.or(self.max_retries),
            on_exhaustion: overrides.on_exhaustion.or(self.on_exhaustion),
            forbidden_line_patterns: overrides
                .forbidden_line_patterns
                .or(self.forbidden_line_patterns),
            excluded_phrases: overrides.excluded_phrases.or(self.excluded_phrases),
            output_dir: overrides.output_dir.or(self.output_dir),
            start_url: overrides.start_url.or(self.start_url),
            user_agents: overrides.user_agents.or(self.user_agents),
            request_delay_secs: overrides.request_delay_secs.or(self.request_delay_secs),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            author: overrides.author.or(self.author),
            description: overrides.description.or(self.description),
            language: overrides.language.or(self.language),
        }
    }
}

/// Validated settings for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub domain: String,
    pub next_button_id: String,
    pub content_class: String,
    pub retry: RetryPolicy,
    pub forbidden_line_patterns: Vec<String>,
    pub excluded_phrases: Vec<String>,
    pub output_dir: PathBuf,
    pub start_url: Option<String>,
    pub user_agents: Vec<String>,
    pub request_delay_secs: u64,
    pub timeout_secs: u64,
    pub author: String,
    pub description: String,
    pub language: String,
}

impl CrawlSettings {
    pub fn resolve(config: Config) -> Result<Self, ConfigError> {
        let domain = required(config.domain, "domain")?;
        let next_button_id = required(config.next_button_id, "next_button_id")?;
        let content_class = required(config.content_class, "content_class")?;
        let max_retries = config
            .max_retries
            .ok_or(ConfigError::Missing { key: "max_retries" })?;
        if max_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        let on_exhaustion = match config.on_exhaustion.as_deref() {
            Some(s) => OnExhaustion::parse(s).map_err(|reason| ConfigError::Invalid {
                key: "on_exhaustion",
                reason,
            })?,
            None => OnExhaustion::Ask,
        };

        Ok(CrawlSettings {
            domain,
            next_button_id,
            content_class,
            retry: RetryPolicy::new(max_retries, on_exhaustion),
            forbidden_line_patterns: config.forbidden_line_patterns.unwrap_or_else(|| {
                DEFAULT_FORBIDDEN_LINE_PATTERNS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            excluded_phrases: config.excluded_phrases.unwrap_or_else(|| {
                DEFAULT_EXCLUDED_PHRASES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            output_dir: config
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            start_url: config.start_url.filter(|u| !u.trim().is_empty()),
            user_agents: config.user_agents.unwrap_or_default(),
            request_delay_secs: config.request_delay_secs.unwrap_or(DEFAULT_DELAY_SECS),
            timeout_secs: config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            author: config
                .author
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            description: config
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            language: config
                .language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { key })
}

/// Search order: (1) ./novelscrape.toml, (2) $XDG_CONFIG_HOME/novelscrape/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, ConfigError> {
    let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
    let mut paths = vec![cwd.join("novelscrape.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("novelscrape").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return load_config_file(path).map(Some);
        }
    }
    Ok(None)
}

/// Load one config file.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&s).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
