//! Data models shared across the generation pipeline.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleDraft`]: Title, lead and body pulled out of the generated fragment
//! - [`SourceLink`] / [`SourceList`]: Deduplicated, capped citation links
//! - [`HeroImage`]: The hero illustration, or its explicit absence
//! - [`CardRecord`]: Everything the feed card needs about one published article
//!
//! Fallible-but-degradable values carry an explicit presence marker
//! ([`Extracted`], [`HeroImage`]) instead of sentinel strings.

use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

/// A field pulled from generated markup, or the placeholder that stands in for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Found(String),
    Placeholder(String),
}

impl Extracted {
    pub fn as_str(&self) -> &str {
        match self {
            Extracted::Found(s) | Extracted::Placeholder(s) => s,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Extracted::Placeholder(_))
    }
}

/// Plain-text outline of the article used to build search queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    /// Text of every subheading in the body, in document order.
    pub subheadings: Vec<String>,
    /// Text of the first two paragraphs (lead included).
    pub paragraphs: Vec<String>,
}

/// The article as extracted from one generator response.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    /// Plain text, not escaped.
    pub title: Extracted,
    /// A single `<p class="lead">` element.
    pub lead_html: Extracted,
    /// Everything after the lead, with any self-authored reference section removed.
    pub body_html: String,
    /// Lead text cut to at most 160 characters, for meta tags and the card excerpt.
    pub description: String,
    pub outline: Outline,
}

/// A citation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLink {
    pub url: String,
    pub title: String,
    /// Lowercased host without a leading `www.`.
    pub domain: String,
}

/// Ordered, capped, duplicate-free list of [`SourceLink`]s.
///
/// Uniqueness is keyed on `(domain, normalized title)` and on the URL itself;
/// the first link seen for a key wins.
#[derive(Debug, Clone)]
pub struct SourceList {
    links: Vec<SourceLink>,
    seen_keys: HashSet<(String, String)>,
    seen_urls: HashSet<String>,
    cap: usize,
}

impl SourceList {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            links: Vec::new(),
            seen_keys: HashSet::new(),
            seen_urls: HashSet::new(),
            cap,
        }
    }

    /// Append `link` unless the list is full or the link is a duplicate.
    ///
    /// Returns whether the link was accepted.
    pub fn push(&mut self, link: SourceLink) -> bool {
        if self.is_full() {
            return false;
        }
        let key = (link.domain.clone(), normalize_title(&link.title));
        if self.seen_keys.contains(&key) || self.seen_urls.contains(&link.url) {
            return false;
        }
        self.seen_keys.insert(key);
        self.seen_urls.insert(link.url.clone());
        self.links.push(link);
        true
    }

    pub fn is_full(&self) -> bool {
        self.links.len() >= self.cap
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn into_links(self) -> Vec<SourceLink> {
        self.links
    }
}

/// Lowercase and collapse whitespace; the dedupe key for link titles.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The hero illustration for an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeroImage {
    Present {
        /// File name inside the images directory, e.g. `2026-10-18-slug-hero.jpg`.
        filename: String,
        alt: String,
    },
    /// Every prompt/size combination failed, or image generation was skipped.
    Absent,
}

impl HeroImage {
    pub fn filename(&self) -> Option<&str> {
        match self {
            HeroImage::Present { filename, .. } => Some(filename),
            HeroImage::Absent => None,
        }
    }
}

/// Where the article file lives and what it is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSlot {
    pub publish_date: NaiveDate,
    /// Slugified title, at most 60 characters.
    pub slug: String,
    /// `{date}-{slug}` plus a `-N` suffix when an earlier run took the plain stem.
    pub stem: String,
}

impl ArticleSlot {
    pub fn article_filename(&self) -> String {
        format!("{}.html", self.stem)
    }

    pub fn hero_filename(&self) -> String {
        format!("{}-hero.jpg", self.stem)
    }
}

/// One feed card, as persisted in the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRecord {
    pub title: String,
    pub description: String,
    /// Link target relative to the index page.
    pub article_path: String,
    /// Thumbnail relative to the index page; the configured placeholder when there is no hero.
    pub thumbnail_path: String,
    pub publish_date: NaiveDate,
    /// Element id of the card; the article file stem, so unique across runs.
    pub id: String,
}

/// Format a date the way the site shows it on cards, e.g. `18 oct. 2026`.
pub fn display_date(date: NaiveDate, months: [&str; 12]) -> String {
    format!("{} {} {}", date.day(), months[date.month0() as usize], date.year())
}
