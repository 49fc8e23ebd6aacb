//! Data model shared by the crawler and the packaging writers.

use serde::{Deserialize, Serialize};

/// Body used when a chapter is accepted as a gap in the sequence.
pub const PLACEHOLDER_BODY: &str = "Chapter not available";

/// One harvested chapter.
///
/// Built once by the page fetcher and never mutated afterwards. `body` is the cleaned
/// markup of the chapter's content block (or [PLACEHOLDER_BODY]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    /// 1-based position in the novel, unique within a run.
    pub index: u32,
    pub body: String,
}

impl Chapter {
    pub fn new(index: u32, body: impl Into<String>) -> Self {
        Self {
            title: chapter_title(index),
            index,
            body: body.into(),
        }
    }

    /// Chapter standing in for one whose content could not be found.
    pub fn placeholder(index: u32) -> Self {
        Self::new(index, PLACEHOLDER_BODY)
    }

    pub fn is_placeholder(&self) -> bool {
        self.body == PLACEHOLDER_BODY
    }

    /// Stable manifest id.
    pub fn id(&self) -> String {
        format!("chapter-{}", self.index)
    }

    /// File name inside the package.
    pub fn file_name(&self) -> String {
        format!("chapter{}.xhtml", self.index)
    }
}

pub fn chapter_title(index: u32) -> String {
    format!("Chapter {}", index)
}

/// One packaged batch: metadata plus the chapters harvested in index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub language: String,
    pub chapters: Vec<Chapter>,
    /// Inclusive chapter range covered by this batch.
    pub range: (u32, u32),
}
