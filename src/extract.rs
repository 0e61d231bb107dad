//! Pull the title, lead and body out of a generated HTML fragment.
//!
//! The generator is asked for `<h1>` + paragraphs + `<h2>` sections, but what
//! comes back is not guaranteed. Extraction therefore never fails: a missing
//! heading or paragraph is replaced with a placeholder and the run goes on.
//!
//! The fragment is flattened into a list of top-level blocks first. Wrapper
//! elements (`article`, `div`, `section`, ...) that only group other blocks are
//! descended into, so `<article><h1>..</h1><p>..</p></article>` and the bare
//! form extract the same way.

use crate::models::{ArticleDraft, Extracted, Outline};
use crate::utils::{collapse_whitespace, escape_html, truncate_chars};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, instrument, warn};

pub const PLACEHOLDER_TITLE: &str = "Untitled draft";
pub const PLACEHOLDER_LEAD: &str = "Lead paragraph unavailable.";
pub const MAX_DESCRIPTION_CHARS: usize = 160;

/// Headings that introduce a self-authored bibliography, in English or French.
static REFERENCES_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(r[ée]f[ée]rences|sources)(\s+(and|et)\s+(r[ée]f[ée]rences|sources))?\s*:?$")
        .expect("references heading regex")
});

const WRAPPERS: &[&str] = &["html", "body", "article", "main", "section", "div", "header"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Heading(u8),
    Paragraph,
    Other,
}

#[derive(Debug, Clone)]
struct Block {
    kind: BlockKind,
    html: String,
    inner_html: String,
    text: String,
}

impl Block {
    fn from_element(el: ElementRef<'_>) -> Self {
        let name = el.value().name();
        let kind = match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                BlockKind::Heading(name[1..].parse().unwrap_or(6))
            }
            "p" => BlockKind::Paragraph,
            _ => BlockKind::Other,
        };
        Self {
            kind,
            html: el.html(),
            inner_html: el.inner_html(),
            text: collapse_whitespace(&el.text().collect::<String>()),
        }
    }

    fn from_text(text: &str) -> Self {
        let escaped = escape_html(text);
        Self {
            kind: BlockKind::Other,
            html: escaped.clone(),
            inner_html: escaped,
            text: collapse_whitespace(text),
        }
    }

    fn is_heading(&self) -> bool {
        matches!(self.kind, BlockKind::Heading(_))
    }
}

fn is_block_container(el: ElementRef<'_>) -> bool {
    el.children().any(|c| {
        ElementRef::wrap(c)
            .map(|child| {
                matches!(
                    child.value().name(),
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "ul" | "ol" | "blockquote"
                        | "figure" | "table" | "article" | "section" | "div" | "header"
                )
            })
            .unwrap_or(false)
    })
}

fn collect_blocks(el: ElementRef<'_>, out: &mut Vec<Block>) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if matches!(name, "script" | "style" | "head" | "title" | "meta" | "link") {
                continue;
            }
            if WRAPPERS.contains(&name) && is_block_container(child_el) {
                collect_blocks(child_el, out);
            } else {
                out.push(Block::from_element(child_el));
            }
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push(Block::from_text(trimmed));
            }
        }
    }
}

/// Remove every heading whose text names a references/sources section, along
/// with the blocks that follow it up to the next heading.
fn strip_reference_sections(blocks: Vec<Block>) -> Vec<Block> {
    let mut kept = Vec::with_capacity(blocks.len());
    let mut skipping = false;
    for block in blocks {
        if block.is_heading() {
            skipping = REFERENCES_HEADING.is_match(block.text.trim());
            if skipping {
                debug!(heading = %block.text, "Dropping self-authored references section");
                continue;
            }
        }
        if !skipping {
            kept.push(block);
        }
    }
    kept
}

/// Extract an [`ArticleDraft`] from a generated HTML fragment.
///
/// - `title`: text of the first `<h1>`, else of the first heading of any level,
///   else [`PLACEHOLDER_TITLE`]
/// - `lead_html`: the first `<p>` after that heading, re-tagged `class="lead"`,
///   else a placeholder lead paragraph
/// - `body_html`: every block after the title except the lead, minus reference
///   sections
#[instrument(level = "info", skip_all, fields(bytes = fragment.len()))]
pub fn extract_article(fragment: &str) -> ArticleDraft {
    let document = Html::parse_fragment(fragment);
    let mut blocks = Vec::new();
    collect_blocks(document.root_element(), &mut blocks);
    let blocks = strip_reference_sections(blocks);

    let title_idx = blocks
        .iter()
        .position(|b| b.kind == BlockKind::Heading(1))
        .or_else(|| blocks.iter().position(|b| b.is_heading()))
        .filter(|&i| !blocks[i].text.is_empty());

    let search_from = title_idx.map(|i| i + 1).unwrap_or(0);
    let lead_idx = blocks
        .iter()
        .enumerate()
        .skip(search_from)
        .find(|(_, b)| b.kind == BlockKind::Paragraph && !b.text.is_empty())
        .map(|(i, _)| i);

    let title = match title_idx {
        Some(i) => Extracted::Found(blocks[i].text.clone()),
        None => {
            warn!("Generated fragment has no heading; using placeholder title");
            Extracted::Placeholder(PLACEHOLDER_TITLE.to_string())
        }
    };

    let (lead_html, lead_text) = match lead_idx {
        Some(i) => (
            Extracted::Found(format!(r#"<p class="lead">{}</p>"#, blocks[i].inner_html.trim())),
            blocks[i].text.clone(),
        ),
        None => {
            warn!("Generated fragment has no lead paragraph; using placeholder");
            (
                Extracted::Placeholder(format!(r#"<p class="lead">{}</p>"#, PLACEHOLDER_LEAD)),
                String::new(),
            )
        }
    };

    // Blocks sitting between the title and the lead open the body.
    let body_start = title_idx.map(|i| i + 1).unwrap_or(0);
    let body_blocks: Vec<&Block> = blocks
        .iter()
        .enumerate()
        .filter(|(i, _)| *i >= body_start && Some(*i) != lead_idx)
        .map(|(_, b)| b)
        .collect();
    let body_html = body_blocks
        .iter()
        .map(|b| b.html.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let subheadings = body_blocks
        .iter()
        .filter(|b| b.is_heading() && !b.text.is_empty())
        .map(|b| b.text.clone())
        .collect();
    let mut paragraphs: Vec<String> = Vec::with_capacity(2);
    if !lead_text.is_empty() {
        paragraphs.push(lead_text.clone());
    }
    paragraphs.extend(
        body_blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Paragraph && !b.text.is_empty())
            .map(|b| b.text.clone())
            .take(2 - paragraphs.len()),
    );

    let description_source = if lead_text.is_empty() {
        title.as_str().to_string()
    } else {
        lead_text
    };

    ArticleDraft {
        title,
        lead_html,
        body_html,
        description: truncate_chars(&description_source, MAX_DESCRIPTION_CHARS),
        outline: Outline {
            subheadings,
            paragraphs,
        },
    }
}
