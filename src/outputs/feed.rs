//! Feed card insertion into the site index.
//!
//! The index page carries two comment sentinels, [`FEED_START`] and
//! [`FEED_END`]. Each run inserts one card right after the start marker, so
//! the feed reads newest first, and appends a build stamp comment at the end
//! of the document so the file always differs from the previous run.
//!
//! # Marker placement
//!
//! When the sentinels are missing they are placed, in order of preference:
//! 1. Next to the lone marker that is present
//! 2. Just inside the first `div`, `section` or `main` whose class list
//!    contains `grid`, `feed` or `cards`
//! 3. Inside a new `<section class="grid feed">` right after `<body>`
//!
//! An end marker found before the start marker is dropped and replaced by
//! one right after the start marker.
//!
//! An index without a `<body>` tag has no insertion point and aborts the run.
//! [`check_insertion_point`] runs that check before anything is generated.

use crate::config::{Language, SiteConfig};
use crate::error::FatalError;
use crate::models::{ArticleDraft, ArticleSlot, CardRecord, HeroImage, display_date};
use crate::outputs::article::join_web_path;
use crate::utils::{build_stamp, escape_html};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

pub const FEED_START: &str = "<!-- FEED:start -->";
pub const FEED_END: &str = "<!-- FEED:end -->";

static BODY_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<body\b[^>]*>").expect("valid body regex"));

static CONTAINER_OPEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<(div|section|main)\b[^>]*?\bclass\s*=\s*["']([^"']*)["'][^>]*>"#)
        .expect("valid container regex")
});

static CONTAINER_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(/?)(div|section|main)\b[^>]*>").expect("valid tag regex")
});

const GRID_CLASSES: [&str; 3] = ["grid", "feed", "cards"];

/// Describe the card for a freshly written article, with paths relative to the index.
pub fn card_for(
    draft: &ArticleDraft,
    slot: &ArticleSlot,
    hero: &HeroImage,
    site: &SiteConfig,
) -> CardRecord {
    let thumbnail_path = match hero.filename() {
        Some(filename) => join_web_path(&site.images_dir, filename),
        None => site.placeholder_thumbnail.clone(),
    };
    CardRecord {
        title: draft.title.as_str().to_string(),
        description: draft.description.clone(),
        article_path: join_web_path(&site.articles_dir, &slot.article_filename()),
        thumbnail_path,
        publish_date: slot.publish_date,
        id: slot.stem.clone(),
    }
}

/// Render the card fragment for one article.
pub fn render_card(card: &CardRecord, language: Language, badge: &str) -> String {
    let title = escape_html(&card.title);
    let href = escape_html(&card.article_path);
    format!(
        r#"
      <article class="card" id="{id}">
        <a class="thumb" href="{href}" aria-label="{aria} {title}">
          <img src="{thumb}" alt="{title}" loading="lazy">
        </a>
        <div class="card-body">
          <h2 class="title">{title}</h2>
          <p class="excerpt">{excerpt}</p>
          <div class="meta">
            <span class="badge">{badge}</span>
            <span>{published} {date}</span>
          </div>
          <a class="link" href="{href}">{read}</a>
        </div>
      </article>
"#,
        id = escape_html(&card.id),
        aria = language.read_aria_prefix(),
        thumb = escape_html(&card.thumbnail_path),
        excerpt = escape_html(&card.description),
        badge = escape_html(badge),
        published = language.published_label(),
        date = display_date(card.publish_date, language.months()),
        read = language.read_label(),
    )
}

/// Make sure both feed markers are present, placing them if needed.
pub fn ensure_markers(index: &str) -> Result<String, FatalError> {
    let start = index.find(FEED_START);
    let end = index.find(FEED_END);

    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(index.to_string()),
        (Some(_), Some(e)) => {
            warn!("Feed end marker sits before the start marker; removing it");
            let cleaned = format!("{}{}", &index[..e], &index[e + FEED_END.len()..]);
            ensure_markers(&cleaned)
        }
        (Some(s), None) => {
            warn!("Feed end marker missing; adding one after the start marker");
            let at = s + FEED_START.len();
            Ok(splice(index, at, &format!("\n{FEED_END}")))
        }
        (None, Some(e)) => {
            warn!("Feed start marker missing; adding one before the end marker");
            Ok(splice(index, e, &format!("{FEED_START}\n")))
        }
        (None, None) => place_markers(index),
    }
}

fn splice(doc: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(doc.len() + insert.len());
    out.push_str(&doc[..at]);
    out.push_str(insert);
    out.push_str(&doc[at..]);
    out
}

fn place_markers(index: &str) -> Result<String, FatalError> {
    if let Some((open_end, close_start)) = find_grid_container(index) {
        info!("Placing feed markers inside the existing grid container");
        let mut out = String::with_capacity(index.len() + 64);
        out.push_str(&index[..open_end]);
        out.push('\n');
        out.push_str(FEED_START);
        out.push('\n');
        match close_start {
            Some(close) => {
                out.push_str(&index[open_end..close]);
                out.push_str(FEED_END);
                out.push('\n');
                out.push_str(&index[close..]);
            }
            None => {
                out.push_str(FEED_END);
                out.push_str(&index[open_end..]);
            }
        }
        return Ok(out);
    }

    let body = BODY_OPEN_RE.find(index).ok_or(FatalError::NoInsertionPoint)?;
    info!("No feed container found; synthesizing one after <body>");
    Ok(splice(
        index,
        body.end(),
        &format!("\n<section class=\"grid feed\">\n{FEED_START}\n{FEED_END}\n</section>"),
    ))
}

/// Locate the first grid-like container.
///
/// Returns the byte offset right after its opening tag and, when the
/// matching closing tag exists, the offset where that closing tag starts.
fn find_grid_container(index: &str) -> Option<(usize, Option<usize>)> {
    let caps = CONTAINER_OPEN_RE.captures_iter(index).find(|caps| {
        caps[2]
            .split_whitespace()
            .any(|class| GRID_CLASSES.contains(&class.to_ascii_lowercase().as_str()))
    })?;
    let open = caps.get(0)?;
    let tag = caps[1].to_ascii_lowercase();

    let mut depth = 1usize;
    for m in CONTAINER_TAG_RE.captures_iter(&index[open.end()..]) {
        if !m[2].eq_ignore_ascii_case(&tag) {
            continue;
        }
        if m[1].is_empty() {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                let close = m.get(0)?;
                return Some((open.end(), Some(open.end() + close.start())));
            }
        }
    }
    Some((open.end(), None))
}

/// Insert `card_html` directly after the start marker.
///
/// Fails when the insertion left the document unchanged, which would mean
/// the card never made it into the feed.
pub fn insert_card(index: &str, card_html: &str) -> Result<String, FatalError> {
    let with_markers = ensure_markers(index)?;
    let at = with_markers
        .find(FEED_START)
        .ok_or(FatalError::NoInsertionPoint)?
        + FEED_START.len();
    let updated = splice(&with_markers, at, card_html);
    if updated == index {
        return Err(FatalError::UnchangedIndex);
    }
    Ok(updated)
}

/// Append the build stamp comment.
pub fn append_stamp(doc: &mut String, stamp: &str) {
    if !doc.ends_with('\n') {
        doc.push('\n');
    }
    doc.push_str(&format!("<!-- automated-build {stamp} -->\n"));
}

/// Confirm the index exists and has somewhere to take a card, without writing it.
#[instrument(level = "debug", fields(path = %index_path.display()))]
pub async fn check_insertion_point(index_path: &Path) -> Result<(), Box<dyn Error>> {
    if !index_path.exists() {
        return Err(FatalError::MissingFile(index_path.to_path_buf()).into());
    }
    let index = fs::read_to_string(index_path).await?;
    ensure_markers(&index)?;
    Ok(())
}

/// Read the index, insert the card, stamp it and write it back.
#[instrument(level = "info", skip(card_html), fields(path = %index_path.display()))]
pub async fn update_index_file(index_path: &Path, card_html: &str) -> Result<(), Box<dyn Error>> {
    if !index_path.exists() {
        return Err(FatalError::MissingFile(index_path.to_path_buf()).into());
    }
    let original = fs::read_to_string(index_path).await?;
    let mut updated = insert_card(&original, card_html)?;
    append_stamp(&mut updated, &build_stamp());
    fs::write(index_path, &updated).await?;
    info!(
        before = original.len(),
        after = updated.len(),
        "Index updated with new card"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn card(title: &str, slug: &str) -> CardRecord {
        CardRecord {
            title: title.to_string(),
            description: "Résumé court.".to_string(),
            article_path: format!("articles/2026-10-18-{slug}.html"),
            thumbnail_path: "images/placeholder.jpg".to_string(),
            publish_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            id: format!("2026-10-18-{slug}"),
        }
    }

    #[test]
    fn test_card_for_paths() {
        let draft = ArticleDraft {
            title: crate::models::Extracted::Found("Budget".to_string()),
            lead_html: crate::models::Extracted::Found("<p class=\"lead\">L</p>".to_string()),
            body_html: String::new(),
            description: "L".to_string(),
            outline: Default::default(),
        };
        let slot = ArticleSlot {
            publish_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            slug: "budget".to_string(),
            stem: "2026-10-18-budget-2".to_string(),
        };
        let site = SiteConfig::default();

        let with_hero = card_for(
            &draft,
            &slot,
            &HeroImage::Present {
                filename: slot.hero_filename(),
                alt: "Budget".to_string(),
            },
            &site,
        );
        assert_eq!(with_hero.article_path, "articles/2026-10-18-budget-2.html");
        assert_eq!(with_hero.thumbnail_path, "images/2026-10-18-budget-2-hero.jpg");
        assert_eq!(with_hero.id, "2026-10-18-budget-2");

        let without = card_for(&draft, &slot, &HeroImage::Absent, &site);
        assert_eq!(without.thumbnail_path, "images/placeholder.jpg");
    }

    const WITH_MARKERS: &str = "<html><body><section class=\"grid\">\n<!-- FEED:start -->\n<!-- FEED:end -->\n</section></body></html>";

    #[test]
    fn test_render_card_fr() {
        let html = render_card(&card("Budget & dette", "budget"), Language::Fr, "Automat.");
        assert!(html.contains("<article class=\"card\" id=\"2026-10-18-budget\">"));
        assert!(html.contains("aria-label=\"Lire : Budget &amp; dette\""));
        assert!(html.contains("<h2 class=\"title\">Budget &amp; dette</h2>"));
        assert!(html.contains("<span>Publié le 18 oct. 2026</span>"));
        assert!(html.contains(">Lire l’article</a>"));
        assert!(html.contains("src=\"images/placeholder.jpg\""));
    }

    #[test]
    fn test_render_card_en() {
        let html = render_card(&card("Budget", "budget"), Language::En, "Auto");
        assert!(html.contains("<span>Published 18 Oct 2026</span>"));
        assert!(html.contains(">Read the article</a>"));
    }

    #[test]
    fn test_existing_markers_untouched() {
        assert_eq!(ensure_markers(WITH_MARKERS).unwrap(), WITH_MARKERS);
    }

    #[test]
    fn test_markers_idempotent_over_two_runs() {
        let once = insert_card(WITH_MARKERS, "<article>one</article>").unwrap();
        let twice = insert_card(&once, "<article>two</article>").unwrap();
        assert_eq!(twice.matches(FEED_START).count(), 1);
        assert_eq!(twice.matches(FEED_END).count(), 1);
        let one = twice.find("one").unwrap();
        let two = twice.find("two").unwrap();
        assert!(two < one, "newest card must come first");
    }

    #[test]
    fn test_synthesizes_container_after_body() {
        let index = "<html><body class=\"home\"><h1>Site</h1></body></html>";
        let out = insert_card(index, "<article>new</article>").unwrap();
        assert!(out.starts_with(
            "<html><body class=\"home\">\n<section class=\"grid feed\">\n<!-- FEED:start --><article>new</article>\n<!-- FEED:end -->\n</section><h1>Site</h1>"
        ));
    }

    #[test]
    fn test_markers_go_inside_grid_container() {
        let index = "<body><main class=\"wrap\"><div class=\"cards\"><div class=\"card\">old</div></div><footer></footer></main></body>";
        let out = ensure_markers(index).unwrap();
        assert_eq!(
            out,
            "<body><main class=\"wrap\"><div class=\"cards\">\n<!-- FEED:start -->\n<div class=\"card\">old</div><!-- FEED:end -->\n</div><footer></footer></main></body>"
        );
    }

    #[test]
    fn test_grid_container_without_close_gets_adjacent_markers() {
        let index = "<body><section class=\"feed\"><p>x</p>";
        let out = ensure_markers(index).unwrap();
        assert_eq!(
            out,
            "<body><section class=\"feed\">\n<!-- FEED:start -->\n<!-- FEED:end --><p>x</p>"
        );
    }

    #[test]
    fn test_lone_start_marker_gets_end() {
        let out = ensure_markers("<body><!-- FEED:start --></body>").unwrap();
        assert_eq!(out, "<body><!-- FEED:start -->\n<!-- FEED:end --></body>");
    }

    #[test]
    fn test_lone_end_marker_gets_start() {
        let out = ensure_markers("<body><!-- FEED:end --></body>").unwrap();
        assert_eq!(out, "<body><!-- FEED:start -->\n<!-- FEED:end --></body>");
    }

    #[test]
    fn test_end_marker_before_start_is_moved() {
        let out =
            ensure_markers("<body><!-- FEED:end --><section><!-- FEED:start --></section></body>")
                .unwrap();
        assert_eq!(
            out,
            "<body><section><!-- FEED:start -->\n<!-- FEED:end --></section></body>"
        );
        assert_eq!(out.matches(FEED_START).count(), 1);
        assert_eq!(out.matches(FEED_END).count(), 1);
    }

    #[test]
    fn test_no_body_is_fatal() {
        let err = insert_card("<html><p>bare</p></html>", "<article/>").unwrap_err();
        assert!(matches!(err, FatalError::NoInsertionPoint));
    }

    #[test]
    fn test_empty_card_is_unchanged_error() {
        let err = insert_card(WITH_MARKERS, "").unwrap_err();
        assert!(matches!(err, FatalError::UnchangedIndex));
    }

    #[test]
    fn test_stamp_appended() {
        let mut doc = "<html></html>".to_string();
        append_stamp(&mut doc, "2026-10-18T08:00:00.000001Z");
        assert_eq!(
            doc,
            "<html></html>\n<!-- automated-build 2026-10-18T08:00:00.000001Z -->\n"
        );
    }

    #[tokio::test]
    async fn test_update_index_file_always_changes_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.html");
        std::fs::write(&path, WITH_MARKERS).unwrap();
        let card_html = render_card(&card("Même titre", "meme"), Language::Fr, "Automat.");

        update_index_file(&path, &card_html).await.unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        update_index_file(&path, &card_html).await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.matches("automated-build").count(), 2);
        assert_eq!(second.matches("<article class=\"card\"").count(), 2);
        assert_eq!(second.matches(FEED_START).count(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_index_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = update_index_file(&tmp.path().join("nope.html"), "<article/>")
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<FatalError>().is_some());
    }

    #[tokio::test]
    async fn test_check_insertion_point_leaves_index_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let bare = tmp.path().join("bare.html");
        std::fs::write(&bare, "<html><p>bare index</p></html>").unwrap();
        let err = check_insertion_point(&bare).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FatalError>(),
            Some(FatalError::NoInsertionPoint)
        ));
        assert_eq!(
            std::fs::read_to_string(&bare).unwrap(),
            "<html><p>bare index</p></html>"
        );

        let good = tmp.path().join("index.html");
        std::fs::write(&good, WITH_MARKERS).unwrap();
        assert!(check_insertion_point(&good).await.is_ok());
        assert!(check_insertion_point(&tmp.path().join("nope.html")).await.is_err());
    }
}
