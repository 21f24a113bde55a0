//! ATX header splitting.
//!
//! Divides a Markdown document into [`Section`]s at `#` through `####`
//! headings. Each section records the heading stack that governs it; the
//! heading lines themselves do not appear in section text. Deeper headings
//! (`#####`, `######`) and anything inside a fenced code block are treated
//! as ordinary content.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::passage::HEADER_KEY_PREFIX;

/// Deepest heading level that opens a new section.
pub const DEFAULT_SPLIT_DEPTH: u8 = 4;

// ── Section ────────────────────────────────────────────────────────────

/// One header-delimited slice of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section body, heading lines removed, surrounding whitespace trimmed.
    pub text: String,
    /// Heading stack governing this section, outermost first. Empty for
    /// content that precedes the first heading.
    pub heading_path: Vec<(u8, String)>,
}

impl Section {
    /// Metadata map in corpus form: one `Header_<level>` entry per stack
    /// element.
    #[must_use]
    pub fn metadata(&self) -> Map<String, Value> {
        self.heading_path
            .iter()
            .map(|(level, title)| {
                (
                    format!("{HEADER_KEY_PREFIX}{level}"),
                    Value::String(title.clone()),
                )
            })
            .collect()
    }

    /// `"Guide > Install"` breadcrumb for the heading stack; empty when the
    /// stack is empty.
    #[must_use]
    pub fn breadcrumb(&self) -> String {
        let titles: Vec<&str> = self
            .heading_path
            .iter()
            .map(|(_, title)| title.as_str())
            .collect();
        titles.join(" > ")
    }
}

// ── HeaderSplitter ─────────────────────────────────────────────────────

/// Splits Markdown into [`Section`]s on ATX headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSplitter {
    split_depth: u8,
}

impl Default for HeaderSplitter {
    fn default() -> Self {
        Self {
            split_depth: DEFAULT_SPLIT_DEPTH,
        }
    }
}

impl HeaderSplitter {
    /// Splitter that opens sections on headings of level 1..=`split_depth`.
    #[must_use]
    pub fn new(split_depth: u8) -> Self {
        Self { split_depth }
    }

    /// Split `markdown` into sections.
    ///
    /// A heading at level L pops stack entries at level >= L before pushing
    /// itself. Sections whose body is empty (a heading directly followed by
    /// another heading) are not emitted.
    #[must_use]
    pub fn split(&self, markdown: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut stack: Vec<(u8, String)> = Vec::new();
        let mut body: Vec<&str> = Vec::new();
        let mut fence: Option<&str> = None;

        for line in markdown.lines() {
            let trimmed = line.trim_start();

            if let Some(marker) = fence_marker(trimmed) {
                match fence {
                    Some(open) if trimmed.starts_with(open) => fence = None,
                    Some(_) => {}
                    None => fence = Some(marker),
                }
                body.push(line);
                continue;
            }

            if fence.is_none()
                && let Some((level, title)) = parse_heading(trimmed)
                && level <= self.split_depth
            {
                flush(&mut sections, &mut body, &stack);
                while stack.last().is_some_and(|(depth, _)| *depth >= level) {
                    stack.pop();
                }
                stack.push((level, title));
                continue;
            }

            body.push(line);
        }
        flush(&mut sections, &mut body, &stack);

        tracing::debug!(sections = sections.len(), "split markdown on headers");
        sections
    }
}

fn flush(sections: &mut Vec<Section>, body: &mut Vec<&str>, stack: &[(u8, String)]) {
    let text = body.join("\n").trim().to_string();
    body.clear();
    if !text.is_empty() {
        sections.push(Section {
            text,
            heading_path: stack.to_vec(),
        });
    }
}

/// Opening/closing code-fence marker at the start of a trimmed line.
fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Optional closing hash sequence per ATX rules.
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*?)(?:\s+#+)?\s*$").expect("valid heading pattern"))
}

/// `(level, title)` when the line is an ATX heading with a non-empty title.
fn parse_heading(trimmed: &str) -> Option<(u8, String)> {
    let captures = heading_re().captures(trimmed)?;
    let level = captures.get(1)?.as_str().len() as u8;
    let title = captures.get(2)?.as_str().trim();
    if title.is_empty() {
        return None;
    }
    Some((level, title.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(section: &Section) -> Vec<(u8, &str)> {
        section
            .heading_path
            .iter()
            .map(|(level, title)| (*level, title.as_str()))
            .collect()
    }

    #[test]
    fn tracks_the_heading_stack() {
        let doc = "# Guide\n\nIntro text.\n\n## Install\n\nRun the installer.\n\n## Configure\n\nEdit the file.\n\n# Reference\n\nTables.";
        let sections = HeaderSplitter::default().split(doc);

        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0].text, "Intro text.");
        assert_eq!(path(&sections[0]), vec![(1, "Guide")]);
        assert_eq!(path(&sections[1]), vec![(1, "Guide"), (2, "Install")]);
        assert_eq!(path(&sections[2]), vec![(1, "Guide"), (2, "Configure")]);
        assert_eq!(path(&sections[3]), vec![(1, "Reference")]);
    }

    #[test]
    fn preamble_before_any_heading_has_an_empty_path() {
        let sections = HeaderSplitter::default().split("Loose intro.\n\n# First\n\nBody.");
        assert_eq!(sections.len(), 2);
        assert!(sections[0].heading_path.is_empty());
        assert_eq!(sections[0].text, "Loose intro.");
    }

    #[test]
    fn heading_lines_are_not_part_of_section_text() {
        let sections = HeaderSplitter::default().split("# Top\n\nBody only.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text, "Body only.");
    }

    #[test]
    fn empty_sections_between_adjacent_headings_are_skipped() {
        let sections = HeaderSplitter::default().split("# A\n## B\n\nOnly this body.");
        assert_eq!(sections.len(), 1);
        assert_eq!(path(&sections[0]), vec![(1, "A"), (2, "B")]);
    }

    #[test]
    fn hashes_inside_code_fences_are_content() {
        let doc = "# Shell\n\n```sh\n# not a heading\necho hi\n```\n\nDone.";
        let sections = HeaderSplitter::default().split(doc);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].text.contains("# not a heading"));
    }

    #[test]
    fn deep_headings_stay_in_the_body() {
        let doc = "# Top\n\n##### minor note\n\nBody.";
        let sections = HeaderSplitter::default().split(doc);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].text.contains("##### minor note"));
        assert_eq!(path(&sections[0]), vec![(1, "Top")]);
    }

    #[test]
    fn closing_hashes_are_stripped_from_titles() {
        let sections = HeaderSplitter::default().split("## Setup ##\n\nBody.");
        assert_eq!(path(&sections[0]), vec![(2, "Setup")]);
    }

    #[test]
    fn metadata_uses_corpus_header_keys() {
        let sections = HeaderSplitter::default().split("# Guide\n\n## Install\n\nBody.");
        let metadata = sections[0].metadata();
        assert_eq!(metadata["Header_1"], "Guide");
        assert_eq!(metadata["Header_2"], "Install");
        assert_eq!(sections[0].breadcrumb(), "Guide > Install");
    }
}
