//! Chapter content cleaning: Unicode normalization, watermark line removal, phrase removal,
//! and dropping the trailing paragraph.

use super::error::ScraperError;
use super::parse_selector;
use scraper::{ElementRef, Html, Node, Selector};
use unicode_normalization::UnicodeNormalization;

/// Watermark matched against whole lines when the configuration does not name any.
pub const DEFAULT_FORBIDDEN_LINE_PATTERNS: &[&str] = &["libread.com"];

/// Credit phrases removed in place when the configuration does not name any.
pub const DEFAULT_EXCLUDED_PHRASES: &[&str] = &[
    "Translator:",
    "Atlas Studios",
    "Editor:",
    "EndlessFantasy Translation",
];

/// Raw markup of a content block, one child node per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupFragment(String);

impl MarkupFragment {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    /// Serialize the children of `container`, each on its own line, so that line-based
    /// filtering sees one paragraph per line regardless of the source's formatting.
    pub fn from_element(container: ElementRef<'_>) -> Self {
        let mut lines = Vec::new();
        for child in container.children() {
            match child.value() {
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        lines.push(el.html());
                    }
                }
                Node::Text(text) => {
                    let t = text.trim();
                    if !t.is_empty() {
                        lines.push(escape_text(t));
                    }
                }
                _ => {}
            }
        }
        Self(lines.join("\n"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Configured cleaner. Pure: holds only its pattern lists and a compiled selector.
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    /// Lowercased; a line containing any of these is dropped.
    forbidden_lines: Vec<String>,
    excluded_phrases: Vec<String>,
    trailing_block: Selector,
}

impl ContentCleaner {
    pub fn new(
        forbidden_line_patterns: &[String],
        excluded_phrases: &[String],
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            forbidden_lines: forbidden_line_patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
            excluded_phrases: excluded_phrases
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
            trailing_block: parse_selector("p")?,
        })
    }

    /// Cleaner with the built-in watermark and credit lists.
    pub fn with_defaults() -> Result<Self, ScraperError> {
        let lines: Vec<String> = DEFAULT_FORBIDDEN_LINE_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .collect();
        let phrases: Vec<String> = DEFAULT_EXCLUDED_PHRASES
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::new(&lines, &phrases)
    }

    pub fn clean(&self, raw: &MarkupFragment) -> String {
        let text = self.scrub(raw.as_str());
        self.remove_last_block(&text)
    }

    /// Text passes only: NFKC, forbidden lines, excluded phrases.
    pub fn scrub(&self, text: &str) -> String {
        let normalized: String = text.nfkc().collect();
        let kept = self.remove_forbidden_lines(&normalized);
        self.remove_excluded_phrases(&kept)
    }

    fn remove_forbidden_lines(&self, text: &str) -> String {
        if self.forbidden_lines.is_empty() {
            return text.to_string();
        }
        text.split('\n')
            .filter(|line| {
                let lower = line.to_lowercase();
                !self.forbidden_lines.iter().any(|p| lower.contains(p.as_str()))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Single left-to-right pass; at each position the first listed phrase that matches wins.
    fn remove_excluded_phrases(&self, text: &str) -> String {
        if self.excluded_phrases.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        'scan: while !rest.is_empty() {
            for phrase in &self.excluded_phrases {
                if let Some(after) = rest.strip_prefix(phrase.as_str()) {
                    rest = after;
                    continue 'scan;
                }
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
        out
    }

    fn remove_last_block(&self, text: &str) -> String {
        let mut fragment = Html::parse_fragment(text);
        let last = fragment
            .select(&self.trailing_block)
            .last()
            .map(|el| el.id());
        let Some(id) = last else {
            return text.to_string();
        };
        if let Some(mut node) = fragment.tree.get_mut(id) {
            node.detach();
        }
        fragment.root_element().inner_html()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> ContentCleaner {
        ContentCleaner::with_defaults().unwrap()
    }

    #[test]
    fn drops_whole_line_containing_watermark_case_insensitively() {
        let raw = MarkupFragment::new(
            "<p>Keep me.</p>\n<p>Read at LibRead.com first!</p>\n<p>Also kept.</p>\n<p>tail</p>",
        );
        let out = cleaner().clean(&raw);
        assert!(out.contains("Keep me."));
        assert!(out.contains("Also kept."));
        assert!(!out.to_lowercase().contains("libread"));
        assert!(!out.contains("Read at"));
    }

    #[test]
    fn removes_excluded_phrases_in_place() {
        let c = cleaner();
        let out = c.scrub("<p>Translator: Atlas Studios and friends</p>");
        assert_eq!(out, "<p>  and friends</p>");
    }

    #[test]
    fn excluded_phrases_are_case_sensitive() {
        let out = cleaner().scrub("<p>translator: someone</p>");
        assert_eq!(out, "<p>translator: someone</p>");
    }

    #[test]
    fn removes_exactly_the_last_paragraph() {
        let raw = MarkupFragment::new("<p>one</p>\n<p>two</p>\n<p>Read more at our site</p>");
        let out = cleaner().clean(&raw);
        assert!(out.contains("<p>one</p>"));
        assert!(out.contains("<p>two</p>"));
        assert!(!out.contains("Read more"));
    }

    #[test]
    fn no_paragraphs_leaves_text_untouched() {
        let raw = MarkupFragment::new("<div>only a div</div>");
        assert_eq!(cleaner().clean(&raw), "<div>only a div</div>");
    }

    #[test]
    fn normalizes_to_nfkc() {
        // U+FB01 LATIN SMALL LIGATURE FI, U+2460 CIRCLED DIGIT ONE
        let out = cleaner().scrub("\u{FB01}ne \u{2460}");
        assert_eq!(out, "fine 1");
    }

    #[test]
    fn scrub_is_idempotent() {
        let c = cleaner();
        let input = "<p>Editor: EndlessFantasy Translation</p>\nline libread.com\n<p>caf\u{0065}\u{0301}</p>";
        let once = c.scrub(input);
        assert_eq!(c.scrub(&once), once);
    }

    #[test]
    fn clean_is_deterministic() {
        let c = cleaner();
        let raw = MarkupFragment::new("<p>a</p>\n<p>b</p>\n<p>c</p>");
        assert_eq!(c.clean(&raw), c.clean(&raw));
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let c = ContentCleaner::new(&["mirror.example".to_string()], &["[ad]".to_string()])
            .unwrap();
        let out = c.scrub("keep [ad]this\nfrom MIRROR.EXAMPLE\nlibread.com stays");
        assert_eq!(out, "keep this\nlibread.com stays");
    }

    #[test]
    fn fragment_from_element_puts_children_on_lines() {
        let doc = Html::parse_document(
            r#"<div class="txt"><p>one</p><p>two &amp; more</p> loose text </div>"#,
        );
        let sel = Selector::parse("div.txt").unwrap();
        let div = doc.select(&sel).next().unwrap();
        let frag = MarkupFragment::from_element(div);
        assert_eq!(
            frag.as_str(),
            "<p>one</p>\n<p>two &amp; more</p>\nloose text"
        );
    }
}
