//! Bing results via the RSS output format.
//!
//! `https://www.bing.com/search?format=rss&q=...` returns a plain RSS 2.0
//! channel whose `<item>`s carry the result title and destination link,
//! which is far more stable to parse than the HTML results page.

use crate::config::Language;
use crate::scrapers::fetch_page;
use crate::sources::links::Candidate;
use crate::sources::{BackendError, SearchBackend};
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use reqwest::Client;
use tracing::{debug, instrument};

const ENDPOINT: &str = "https://www.bing.com/search";

pub struct Bing {
    client: Client,
    language: Language,
}

impl Bing {
    pub fn new(client: Client, language: Language) -> Self {
        Self { client, language }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}?format=rss&setlang={}&q={}",
            ENDPOINT,
            self.language.code(),
            urlencoding::encode(query)
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
}

/// Extract `(link, title)` pairs from the `<item>`s of an RSS document.
pub fn parse_rss(xml: &str) -> Result<Vec<Candidate>, BackendError> {
    let mut reader = Reader::from_str(xml);
    let mut candidates = Vec::new();
    let mut in_item = false;
    let mut field: Option<Field> = None;
    let mut title = String::new();
    let mut link = String::new();

    loop {
        let piece = match reader.read_event()? {
            Event::Start(e) => {
                match e.local_name().as_ref() {
                    b"item" => {
                        in_item = true;
                        title.clear();
                        link.clear();
                    }
                    b"title" if in_item => field = Some(Field::Title),
                    b"link" if in_item => field = Some(Field::Link),
                    _ => {}
                }
                None
            }
            Event::End(e) => {
                match e.local_name().as_ref() {
                    b"item" => {
                        in_item = false;
                        if !link.trim().is_empty() {
                            candidates.push(Candidate::new(link.trim(), title.trim()));
                        }
                    }
                    b"title" | b"link" => field = None,
                    _ => {}
                }
                None
            }
            Event::Text(t) => Some(t.decode().map_err(|e| e.to_string())?.into_owned()),
            Event::CData(c) => Some(c.decode().map_err(|e| e.to_string())?.into_owned()),
            Event::GeneralRef(r) => {
                if let Some(ch) = r.resolve_char_ref().map_err(|e| e.to_string())? {
                    Some(ch.to_string())
                } else {
                    let name = r.decode().map_err(|e| e.to_string())?;
                    Some(
                        resolve_predefined_entity(&name)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("&{name};")),
                    )
                }
            }
            Event::Eof => break,
            _ => None,
        };

        if let (Some(text), Some(target)) = (piece, field) {
            match target {
                Field::Title => title.push_str(&text),
                Field::Link => link.push_str(&text),
            }
        }
    }

    Ok(candidates)
}

#[async_trait]
impl SearchBackend for Bing {
    fn name(&self) -> &'static str {
        "bing"
    }

    #[instrument(level = "info", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, BackendError> {
        let body = fetch_page(&self.client, &self.search_url(query)).await?;
        let candidates = parse_rss(&body)?;
        debug!(count = candidates.len(), "Parsed Bing RSS results");
        Ok(candidates)
    }
}
