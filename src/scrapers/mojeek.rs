//! Mojeek results scraper.

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

const ENDPOINT: &str = "https://www.mojeek.com/search";

static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul.results-standard a.title").expect("mojeek result selector"));

pub struct Mojeek {
    client: Client,
    language: Language,
}

impl Mojeek {
    pub fn new(client: Client, language: Language) -> Self {
        Self { client, language }
    }

    /// `lb` biases results toward pages in the given language.
    fn search_url(&self, query: &str) -> String {
        format!(
            "{}?q={}&lb={}",
            ENDPOINT,
            urlencoding::encode(query),
            self.language.code()
        )
    }
}

/// Extract result links from a Mojeek results page.
pub fn parse_results(html: &str) -> Vec<Candidate> {
    let Ok(base) = Url::parse(ENDPOINT) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&RESULT_LINK)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let resolved = base.join(href).ok()?;
            let title = element.text().collect::<Vec<_>>().join(" ");
            Some(Candidate::new(resolved.to_string(), title))
        })
        .collect()
}

#[async_trait]
impl SearchBackend for Mojeek {
    fn name(&self) -> &'static str {
        "mojeek"
    }

    #[instrument(level = "info", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, BackendError> {
        let body = fetch_page(&self.client, &self.search_url(query)).await?;
        let candidates = parse_results(&body);
        debug!(count = candidates.len(), "Parsed Mojeek results");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let page = r#"<html><body><ul class="results-standard">
<li><a class="ob" href="https://www.ipcc.ch/report/ar6/syr/">https://www.ipcc.ch</a>
<h2><a class="title" href="https://www.ipcc.ch/report/ar6/syr/">AR6 Synthesis Report</a></h2></li>
<li><h2><a class="title" href="/redirect/local">Local page</a></h2></li>
</ul>
<a class="title" href="https://outside.example.org/">Not a result</a>
</body></html>"#;
        let results = parse_results(page);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.ipcc.ch/report/ar6/syr/");
        assert_eq!(results[0].title, "AR6 Synthesis Report");
        assert_eq!(results[1].url, "https://www.mojeek.com/redirect/local");
    }

    #[test]
    fn test_search_url_carries_language() {
        let url = Mojeek::new(Client::new(), Language::En).search_url("climate report");
        assert_eq!(url, "https://www.mojeek.com/search?q=climate%20report&lb=en");
    }
}
