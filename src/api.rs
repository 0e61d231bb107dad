//! Generator API interaction with exponential backoff retry logic.
//!
//! This module talks to an OpenAI-compatible HTTP API for both collaborators
//! of the pipeline: the text generator (chat completions) and the image
//! generator (image generations). Text requests go through a retry decorator
//! with exponential backoff and jitter; image requests are retried by the
//! prompt/size matrix in [`crate::images`] instead.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async text generation
//! - [`ChatAsk`]: Chat-completions call implementing [`AskAsync`]
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//! - [`OpenAiApi`]: Shared HTTP client, credential and model names; also
//!   implements [`ImageGenerator`]
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts (configurable)
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::{ApiConfig, Language};
use crate::images::{ImageGenerator, ImagePayload};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async text generation.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let chat = ChatAsk { api: &api, system_prompt: &system };
    /// let retry_client = RetryAsk::new(chat, 5, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let exp = (attempt - 1).min(16) as u32;
                    let mut delay = self.base_delay.saturating_mul(1u32 << exp);
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Connection to an OpenAI-compatible API.
pub struct OpenAiApi {
    client: Client,
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
}

impl fmt::Debug for OpenAiApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiApi")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

impl OpenAiApi {
    pub fn new(config: &ApiConfig, api_key: String) -> Result<Self, Box<dyn Error>> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    /// POST a JSON body and return the parsed JSON response.
    ///
    /// Non-2xx answers become errors carrying the status and a truncated body.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, Box<dyn Error>> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("{} returned {}: {}", path, status, truncate_for_log(&text, 300)).into());
        }
        Ok(response.json().await?)
    }

    /// Plain GET, used to download image URLs returned by the image endpoint.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, Box<dyn Error>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

impl ImageGenerator for OpenAiApi {
    #[instrument(level = "info", skip(self, prompt))]
    async fn generate(&self, prompt: &str, size: &str) -> Result<ImagePayload, Box<dyn Error>> {
        let body = json!({
            "model": self.image_model,
            "prompt": prompt,
            "size": size,
            "n": 1,
        });
        let value = self.post_json("images/generations", &body).await?;
        let parsed: ImagesResponse = serde_json::from_value(value)?;
        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or("image response contained no data")?;
        match (datum.b64_json, datum.url) {
            (Some(b64), _) if !b64.is_empty() => Ok(ImagePayload::Base64(b64)),
            (_, Some(url)) if !url.is_empty() => Ok(ImagePayload::Url(url)),
            _ => Err("image response had neither b64_json nor url".into()),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, Box<dyn Error>> {
        self.get_bytes(url).await
    }
}

/// One chat-completions call with a fixed system prompt.
#[derive(Debug)]
pub struct ChatAsk<'a> {
    pub api: &'a OpenAiApi,
    pub system_prompt: &'a str,
}

impl<'a> AskAsync for ChatAsk<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = json!({
            "model": self.api.text_model,
            "temperature": 0.7,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": text },
            ],
        });
        let res = async {
            let value = self.api.post_json("chat/completions", &body).await?;
            let parsed: ChatResponse = serde_json::from_value(value)?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|c| !c.trim().is_empty())
                .ok_or("chat completion returned no content")?;
            Ok::<String, Box<dyn Error>>(content)
        }
        .await;
        let dt = t0.elapsed();

        if let Err(e) = &res {
            warn!(elapsed_ms = dt.as_millis(), error = %e, "API call failed");
        }
        res
    }
}

fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::Fr => {
            "Tu es un journaliste francophone rigoureux. Tu écris des articles d'actualité \
             factuels, nuancés et sourcés, sans sensationnalisme."
        }
        Language::En => {
            "You are a rigorous news journalist. You write factual, balanced news articles \
             without sensationalism."
        }
    }
}

/// The user prompt asking for an article fragment on `topic`.
pub fn article_prompt(topic: &str, language: Language) -> String {
    match language {
        Language::Fr => format!(
            "Rédige un article d'actualité d'environ 700 mots sur : {topic}.\n\
             Réponds uniquement avec un fragment HTML, sans Markdown :\n\
             - un <h1> pour le titre ;\n\
             - un premier <p> d'introduction qui résume l'essentiel ;\n\
             - trois à cinq sections, chacune avec un <h2> et des <p>.\n\
             N'ajoute aucune section « Sources » ou « Références »."
        ),
        Language::En => format!(
            "Write a news article of about 700 words on: {topic}.\n\
             Answer with an HTML fragment only, no Markdown:\n\
             - one <h1> for the title;\n\
             - a first <p> introduction summarizing the story;\n\
             - three to five sections, each with an <h2> and <p> elements.\n\
             Do not add a \"Sources\" or \"References\" section."
        ),
    }
}

/// Remove a surrounding Markdown code fence (optionally tagged `html`).
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim().to_string()
}

/// Ask the text generator for an article on `topic`, with retries.
///
/// Returns the HTML fragment with any code fence stripped.
#[instrument(level = "info", skip(api))]
pub async fn generate_article_html(
    api: &OpenAiApi,
    topic: &str,
    language: Language,
    max_retries: usize,
) -> Result<String, Box<dyn Error>> {
    let t0 = Instant::now();
    let chat = ChatAsk {
        api,
        system_prompt: system_prompt(language),
    };
    let client = RetryAsk::new(chat, max_retries, StdDuration::from_secs(1));
    let res = client.ask(&article_prompt(topic, language)).await;
    let dt = t0.elapsed();

    match res {
        Ok(raw) => {
            info!(elapsed_ms_total = dt.as_millis(), bytes = raw.len(), "Article text generated");
            Ok(strip_code_fences(&raw))
        }
        Err(e) => {
            error!(elapsed_ms_total = dt.as_millis(), error = %e, "Article text generation failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Flaky {
        failures_left: Cell<usize>,
        calls: Cell<usize>,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err("503 Service Unavailable".into());
            }
            Ok(format!("echo: {text}"))
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let flaky = Flaky {
            failures_left: Cell::new(2),
            calls: Cell::new(0),
        };
        let retry = RetryAsk::new(flaky, 5, StdDuration::from_millis(1));
        let out = retry.ask("hello").await.unwrap();
        assert_eq!(out, "echo: hello");
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let flaky = Flaky {
            failures_left: Cell::new(10),
            calls: Cell::new(0),
        };
        let retry = RetryAsk::new(flaky, 2, StdDuration::from_millis(1));
        assert!(retry.ask("hello").await.is_err());
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```html\n<h1>T</h1>\n```"), "<h1>T</h1>");
        assert_eq!(strip_code_fences("```\n<p>x</p>```"), "<p>x</p>");
        assert_eq!(strip_code_fences("  <h1>T</h1>  "), "<h1>T</h1>");
    }

    #[test]
    fn test_article_prompt_mentions_topic_and_structure() {
        let fr = article_prompt("la dette publique", Language::Fr);
        assert!(fr.contains("la dette publique"));
        assert!(fr.contains("<h1>"));
        let en = article_prompt("public debt", Language::En);
        assert!(en.contains("public debt"));
        assert!(en.contains("<h2>"));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let api = OpenAiApi::new(&ApiConfig::default(), "sk-secret".to_string()).unwrap();
        let shown = format!("{:?}", api);
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("gpt-4o-mini"));
    }
}
