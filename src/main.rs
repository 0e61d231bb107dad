//! # Awful Newsroom
//!
//! Generates one article for a static news site per run: a generative text
//! API writes the article, a web search gathers citation links, an image API
//! draws a hero illustration, and the result is written as a standalone page
//! plus a card at the top of the site's index feed.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=... awful_newsroom -s ./site
//! ```
//!
//! ## Architecture
//!
//! The application is a linear pipeline:
//! 1. **Generation**: Ask the text generator for an HTML fragment (or read `--draft`)
//! 2. **Extraction**: Pull title, lead and body out of the fragment
//! 3. **Enrichment**: Harvest citation links and generate the hero image, concurrently
//! 4. **Output**: Render the article page, then splice a card into the index
//!
//! Degraded stages (no sources found, no image) fall back and keep going.
//! Configuration problems abort with a [`FatalError`](error::FatalError).

use chrono::Local;
use clap::Parser;
use rand::rng;
use rand::seq::IndexedRandom;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod extract;
mod images;
mod models;
mod outputs;
mod scrapers;
mod sources;
mod utils;

use api::{OpenAiApi, generate_article_html};
use cli::Cli;
use config::Config;
use error::FatalError;
use extract::extract_article;
use images::acquire_hero;
use models::HeroImage;
use outputs::{article, feed};
use sources::Harvester;
use sources::allowlist::Allowlist;
use utils::{ensure_writable_dir, truncate_for_log};

const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("awful_newsroom starting up");

    let args = Cli::parse();
    debug!(site_root = %args.site_root.display(), topic = ?args.topic, draft = ?args.draft, "Parsed CLI arguments");

    if let Err(e) = run(&args).await {
        error!(error = %e, "Run aborted");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

async fn run(args: &Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::load(args.config.as_deref())?;

    // ---- Fail fast on configuration problems ----
    let api = match resolve_api_key(args)? {
        Some(key) => Some(OpenAiApi::new(&config.api, key)?),
        None => None,
    };
    let template_path = args.template_path();
    let index_path = args.index_path();
    require_file(&template_path)?;
    feed::check_insertion_point(&index_path).await?;

    let articles_dir = args.site_root.join(&config.site.articles_dir);
    let images_dir = args.site_root.join(&config.site.images_dir);
    ensure_writable_dir(&articles_dir).await?;
    if !args.no_image {
        ensure_writable_dir(&images_dir).await?;
    }

    // ---- Generation ----
    let fragment = match (&args.draft, &api) {
        (Some(path), _) => {
            require_file(path)?;
            info!(path = %path.display(), "Using pre-written draft");
            tokio::fs::read_to_string(path).await?
        }
        (None, Some(api)) => {
            let topic = pick_topic(args.topic.as_deref(), &config.site.topics)?;
            info!(%topic, "Generating article");
            generate_article_html(api, &topic, config.site.language, config.api.max_retries).await?
        }
        (None, None) => return Err(FatalError::MissingCredential(API_KEY_ENV).into()),
    };

    // ---- Extraction ----
    let draft = extract_article(&fragment);
    if draft.title.is_placeholder() || draft.lead_html.is_placeholder() {
        warn!(
            title_missing = draft.title.is_placeholder(),
            lead_missing = draft.lead_html.is_placeholder(),
            fragment_preview = %truncate_for_log(&fragment, 300),
            "Generated fragment incomplete; using placeholders"
        );
    }
    info!(title = %draft.title.as_str(), "Article extracted");

    let publish_date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let slot = article::reserve_slot(&articles_dir, publish_date, draft.title.as_str())?;
    info!(stem = %slot.stem, "Article slot reserved");

    // ---- Enrichment: sources and hero image run side by side ----
    let hero_task = async {
        match (&api, args.no_image) {
            (Some(api), false) => {
                acquire_hero(
                    api,
                    &config.images,
                    draft.title.as_str(),
                    &images_dir,
                    &slot.hero_filename(),
                )
                .await
            }
            _ => {
                info!("Hero image generation skipped");
                HeroImage::Absent
            }
        }
    };

    let backends = if args.no_sources {
        info!("Web search skipped; using curated sources only");
        Vec::new()
    } else {
        let client = scrapers::build_client(&config.search)?;
        scrapers::default_backends(&client, config.site.language)
    };
    let allowlist = Allowlist::new(config.search.allowlist.as_slice());
    if allowlist.is_empty() {
        warn!("Allowlist is empty; every web result will be rejected");
    }
    debug!(domains = allowlist.len(), "Allowlist loaded");

    let harvester = Harvester::new(
        backends,
        allowlist,
        config.curated.clone(),
        (&config.search).into(),
    );
    let sources_task = harvester.harvest(&draft);

    let (hero, sources) = tokio::join!(hero_task, sources_task);
    info!(sources = sources.len(), hero = hero.filename().is_some(), "Enrichment complete");

    // ---- Article page ----
    let template = tokio::fs::read_to_string(&template_path).await?;
    let values = article::article_values(&draft, &sources, &hero, &config.site, publish_date);
    let html = article::render_template(&template, &values);
    if html.contains("{{") {
        warn!("Rendered article still contains brace pairs; check the template for malformed tokens");
    }
    article::write_article(&articles_dir, &slot, &html).await?;

    // ---- Index feed ----
    let card = feed::card_for(&draft, &slot, &hero, &config.site);
    let card_html = feed::render_card(&card, config.site.language, &config.site.badge);
    feed::update_index_file(&index_path, &card_html).await?;

    info!(
        article = %slot.article_filename(),
        index = %index_path.display(),
        "Article published"
    );
    Ok(())
}

/// The API key, when this run needs one.
fn resolve_api_key(args: &Cli) -> Result<Option<String>, FatalError> {
    if !args.needs_api() {
        info!("Offline run; no API calls will be made");
        return Ok(None);
    }
    match args.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(Some(key.to_string())),
        _ => Err(FatalError::MissingCredential(API_KEY_ENV)),
    }
}

fn require_file(path: &Path) -> Result<(), FatalError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(FatalError::MissingFile(path.to_path_buf()))
    }
}

/// The explicit topic, or a random one from the configured list.
fn pick_topic(explicit: Option<&str>, topics: &[String]) -> Result<String, Box<dyn Error>> {
    if let Some(topic) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(topic.to_string());
    }
    topics
        .choose(&mut rng())
        .cloned()
        .ok_or_else(|| "no --topic given and site.topics is empty".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_topic_prefers_explicit() {
        let topics = vec!["a".to_string()];
        assert_eq!(pick_topic(Some(" budget "), &topics).unwrap(), "budget");
        assert_eq!(pick_topic(Some("  "), &topics).unwrap(), "a");
        assert!(pick_topic(None, &[]).is_err());
    }

    #[test]
    fn test_missing_key_is_fatal_only_when_needed() {
        let online = Cli::parse_from(["awful_newsroom", "--api-key", " "]);
        assert!(matches!(
            resolve_api_key(&online),
            Err(FatalError::MissingCredential(_))
        ));

        let offline = Cli::parse_from([
            "awful_newsroom",
            "--draft",
            "d.html",
            "--no-image",
            "--api-key",
            "",
        ]);
        assert!(resolve_api_key(&offline).unwrap().is_none());

        let keyed = Cli::parse_from(["awful_newsroom", "--api-key", "sk-test"]);
        assert_eq!(resolve_api_key(&keyed).unwrap().as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_require_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.html");
        assert!(matches!(require_file(&path), Err(FatalError::MissingFile(_))));
        std::fs::write(&path, "<body></body>").unwrap();
        assert!(require_file(&path).is_ok());
    }
}
