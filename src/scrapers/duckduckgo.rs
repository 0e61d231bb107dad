//! DuckDuckGo HTML results scraper.
//!
//! Uses the JavaScript-free endpoint at `html.duckduckgo.com`. Result links
//! point at `//duckduckgo.com/l/?uddg=<destination>`; the harvester unwraps them.

use crate::config::Language;
use crate::scrapers::fetch_page;
use crate::sources::links::Candidate;
use crate::sources::{BackendError, SearchBackend};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";

static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a").expect("duckduckgo result selector"));

pub struct DuckDuckGo {
    client: Client,
    language: Language,
}

impl DuckDuckGo {
    pub fn new(client: Client, language: Language) -> Self {
        Self { client, language }
    }

    /// Results URL for `query`, localized through the `kl` region code.
    fn search_url(&self, query: &str) -> String {
        let region = match self.language {
            Language::Fr => "fr-fr",
            Language::En => "us-en",
        };
        format!("{}?q={}&kl={}", ENDPOINT, urlencoding::encode(query), region)
    }
}

/// Extract result links from a DuckDuckGo HTML results page.
pub fn parse_results(html: &str) -> Vec<Candidate> {
    let Ok(base) = Url::parse(ENDPOINT) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();
    for element in document.select(&RESULT_LINK) {
        if let Some(href) = element.value().attr("href") {
            if let Ok(resolved) = base.join(href) {
                let title = element.text().collect::<Vec<_>>().join(" ");
                candidates.push(Candidate::new(resolved.to_string(), title));
            }
        }
    }
    candidates
}

#[async_trait]
impl SearchBackend for DuckDuckGo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    #[instrument(level = "info", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, BackendError> {
        let body = fetch_page(&self.client, &self.search_url(query)).await?;
        let candidates = parse_results(&body);
        debug!(count = candidates.len(), "Parsed DuckDuckGo results");
        Ok(candidates)
    }
}
