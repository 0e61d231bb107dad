//! Article page rendering.
//!
//! The template is a plain HTML document carrying `{{TOKEN}}` placeholders.
//! All tokens are resolved in one pass over the template from a single
//! substitution map, so a value that happens to contain token syntax is never
//! expanded a second time.
//!
//! # Tokens
//!
//! | Token              | Value                                                   |
//! |--------------------|---------------------------------------------------------|
//! | `TITLE`            | Article title, HTML-escaped                             |
//! | `LEAD_HTML`        | The `<p class="lead">` element                          |
//! | `BODY_HTML`        | Remaining body markup                                   |
//! | `SOURCES_LIST`     | `<ul class="sources">` with one anchor per source       |
//! | `HERO_ALT`         | Alt text for the hero image (empty without one)         |
//! | `HERO_SRC`         | Relative path to the hero, or a transparent 1x1 GIF     |
//! | `HERO_BLOCK`       | A complete `<figure>`, or nothing                       |
//! | `DESCRIPTION`      | Plain-text description, HTML-escaped                    |
//! | `PUBLISHED_DATE`   | Localized display date                                  |
//! | `LANG`             | Site language code (`fr`, `en`)                         |
//!
//! Unknown tokens are replaced with an empty string and logged.

use crate::config::SiteConfig;
use crate::error::FatalError;
use crate::models::{ArticleDraft, ArticleSlot, HeroImage, SourceLink, display_date};
use crate::utils::{escape_html, slugify};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Write;
use std::path::{Component, Path};
use tokio::fs;
use tracing::{info, instrument, warn};

/// Transparent 1x1 GIF used as `HERO_SRC` when there is no hero image.
pub const EMPTY_IMAGE_SRC: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Suffixes `-2` through this value are tried before giving up on a stem.
const MAX_SLOT_ATTEMPTS: usize = 999;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").expect("valid token regex"));

/// Replace every `{{TOKEN}}` in `template` with its value from `values`.
///
/// Values are inserted verbatim except that any `{{` they contain is broken
/// up, so the output never carries a token-like sequence that came from data.
pub fn render_template(template: &str, values: &HashMap<&str, String>) -> String {
    TOKEN_RE
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match values.get(name) {
                Some(value) => neutralize_braces(value),
                None => {
                    warn!(token = %name, "Unknown template token; replacing with empty string");
                    String::new()
                }
            }
        })
        .into_owned()
}

fn neutralize_braces(value: &str) -> String {
    value.replace("{{", "{&#123;")
}

/// Render the collected sources as an HTML list.
pub fn render_sources_list(sources: &[SourceLink]) -> String {
    let mut html = String::from("<ul class=\"sources\">\n");
    for link in sources {
        writeln!(
            html,
            "  <li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a> <span class=\"source-domain\">{}</span></li>",
            escape_html(&link.url),
            escape_html(&link.title),
            escape_html(&link.domain)
        )
        .unwrap();
    }
    html.push_str("</ul>");
    html
}

/// Path from a page inside `articles_dir` up to the site root.
fn up_to_root(articles_dir: &str) -> String {
    let depth = Path::new(articles_dir)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    "../".repeat(depth)
}

/// Join a site-relative directory and a file name into a URL path.
pub fn join_web_path(dir: &str, file: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() || dir == "." {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

/// Hero image source as seen from the article page.
pub fn hero_src(site: &SiteConfig, hero: &HeroImage) -> String {
    match hero.filename() {
        Some(filename) => format!(
            "{}{}",
            up_to_root(&site.articles_dir),
            join_web_path(&site.images_dir, filename)
        ),
        None => EMPTY_IMAGE_SRC.to_string(),
    }
}

/// Build the substitution map for one article.
pub fn article_values(
    draft: &ArticleDraft,
    sources: &[SourceLink],
    hero: &HeroImage,
    site: &SiteConfig,
    publish_date: NaiveDate,
) -> HashMap<&'static str, String> {
    let title = escape_html(draft.title.as_str());
    let src = hero_src(site, hero);

    let (hero_alt, hero_block) = match hero {
        HeroImage::Present { alt, .. } => {
            let alt = escape_html(alt);
            let block = format!(
                "<figure class=\"hero\"><img src=\"{src}\" alt=\"{alt}\" loading=\"eager\"></figure>"
            );
            (alt, block)
        }
        HeroImage::Absent => (String::new(), String::new()),
    };

    HashMap::from([
        ("TITLE", title),
        ("LEAD_HTML", draft.lead_html.as_str().to_string()),
        ("BODY_HTML", draft.body_html.clone()),
        ("SOURCES_LIST", render_sources_list(sources)),
        ("HERO_ALT", hero_alt),
        ("HERO_SRC", src),
        ("HERO_BLOCK", hero_block),
        ("DESCRIPTION", escape_html(&draft.description)),
        (
            "PUBLISHED_DATE",
            display_date(publish_date, site.language.months()),
        ),
        ("LANG", site.language.code().to_string()),
    ])
}

/// Pick the file stem for today's article.
///
/// The stem is `{date}-{slug}`; when `{stem}.html` already exists in
/// `articles_dir` the first free `-2`, `-3`, ... suffix is used instead.
#[instrument(level = "info", skip(articles_dir), fields(dir = %articles_dir.display()))]
pub fn reserve_slot(
    articles_dir: &Path,
    publish_date: NaiveDate,
    title: &str,
) -> Result<ArticleSlot, FatalError> {
    let slug = slugify(title);
    let base = format!("{}-{}", publish_date.format("%Y-%m-%d"), slug);

    let mut stem = base.clone();
    let mut attempt = 1usize;
    while articles_dir.join(format!("{stem}.html")).exists() {
        attempt += 1;
        if attempt > MAX_SLOT_ATTEMPTS {
            return Err(FatalError::SlugExhausted(base));
        }
        stem = format!("{base}-{attempt}");
    }

    if attempt > 1 {
        info!(%stem, "Article name already taken today; using suffixed stem");
    }
    Ok(ArticleSlot {
        publish_date,
        slug,
        stem,
    })
}

/// Write the rendered article to `articles_dir/{stem}.html`.
#[instrument(level = "info", skip_all, fields(stem = %slot.stem))]
pub async fn write_article(
    articles_dir: &Path,
    slot: &ArticleSlot,
    html: &str,
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(articles_dir).await?;
    let path = articles_dir.join(slot.article_filename());
    fs::write(&path, html).await?;
    info!(path = %path.display(), bytes = html.len(), "Wrote article");
    Ok(())
}
