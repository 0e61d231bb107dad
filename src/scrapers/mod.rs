//! Web search backends scraped for citation candidates.
//!
//! Each backend implements [`SearchBackend`](crate::sources::SearchBackend)
//! and follows the same two-step pattern:
//!
//! 1. **Fetching**: GET the engine's results page for a query
//! 2. **Parsing**: Pull `(href, title)` pairs out of the page with a pure,
//!    synchronous `parse_results` function
//!
//! # Supported Engines
//!
//! | Engine | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | DuckDuckGo | [`duckduckgo`] | HTML scraping | Links wrapped in `/l/?uddg=` redirects |
//! | Bing | [`bing`] | RSS via `quick-xml` | `format=rss` results endpoint |
//! | Mojeek | [`mojeek`] | HTML scraping | Independent index, plain links |
//!
//! A non-2xx status or a page shorter than [`MIN_PAGE_BYTES`] is reported as
//! an error; the harvester turns that into zero candidates.

pub mod bing;
pub mod duckduckgo;
pub mod mojeek;

use crate::config::{Language, SearchConfig};
use crate::sources::{BackendError, SearchBackend};
use reqwest::Client;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result pages shorter than this are treated as a block or captcha page.
pub const MIN_PAGE_BYTES: usize = 512;

/// Build the HTTP client shared by every backend.
pub fn build_client(config: &SearchConfig) -> Result<Client, Box<dyn Error>> {
    Ok(Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .build()?)
}

/// Every built-in backend, sharing `client` and localized to `language`.
pub fn default_backends(client: &Client, language: Language) -> Vec<Arc<dyn SearchBackend>> {
    vec![
        Arc::new(duckduckgo::DuckDuckGo::new(client.clone(), language)),
        Arc::new(bing::Bing::new(client.clone(), language)),
        Arc::new(mojeek::Mojeek::new(client.clone(), language)),
    ]
}

/// GET `url` and return the body, rejecting error statuses and near-empty pages.
#[instrument(level = "debug", skip(client))]
pub async fn fetch_page(client: &Client, url: &str) -> Result<String, BackendError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}").into());
    }
    let body = response.text().await?;
    check_page(&body)?;
    debug!(bytes = body.len(), "Fetched results page");
    Ok(body)
}

fn check_page(body: &str) -> Result<(), BackendError> {
    if body.len() < MIN_PAGE_BYTES {
        return Err(format!(
            "results page is only {} bytes; engine is probably blocking us",
            body.len()
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_page_is_blocked() {
        assert!(check_page("<html></html>").is_err());
        assert!(check_page(&"x".repeat(MIN_PAGE_BYTES)).is_ok());
    }

    #[test]
    fn test_default_backends() {
        let client = build_client(&SearchConfig::default()).unwrap();
        let names: Vec<_> = default_backends(&client, Language::En).iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["duckduckgo", "bing", "mojeek"]);
    }
}
