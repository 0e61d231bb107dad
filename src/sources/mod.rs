//! Citation harvesting.
//!
//! Given an [`ArticleDraft`], the [`Harvester`] derives a few search queries,
//! fans them out to every configured [`SearchBackend`], and keeps the results
//! whose domain is on the [`Allowlist`]. Backends are best-effort: an error or
//! a timeout from one of them counts as zero results and never aborts the
//! harvest.
//!
//! # Fallback ladder
//!
//! 1. Web results, in completion order, until `max_links` are accepted
//! 2. Curated links for the article's topic if fewer than `min_links` were found
//! 3. Global fallback links if the list is still empty
//!
//! Curated and fallback links go through the same allowlist as web results;
//! configured links outside it are dropped with a warning.

pub mod allowlist;
pub mod classify;
pub mod links;
pub mod queries;

use crate::config::{CuratedConfig, LinkSpec, SearchConfig};
use crate::models::{ArticleDraft, SourceLink, SourceList};
use allowlist::Allowlist;
use async_trait::async_trait;
use classify::{classify, curated_links};
use futures::stream::{self, StreamExt};
use links::{Candidate, to_source_link};
use queries::build_queries;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub type BackendError = Box<dyn Error + Send + Sync>;

/// A web search engine that can be scraped for candidate links.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run one query. Hrefs should be absolute; redirect wrappers are
    /// unwrapped by the harvester.
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, BackendError>;
}

/// Limits applied to one harvest.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub max_links: usize,
    pub min_links: usize,
    pub max_queries: usize,
    pub workers: usize,
    pub timeout: Duration,
}

impl From<&SearchConfig> for HarvestSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_links: config.max_links,
            min_links: config.min_links,
            max_queries: config.max_queries,
            workers: config.workers,
            timeout: config.timeout(),
        }
    }
}

pub struct Harvester {
    backends: Vec<Arc<dyn SearchBackend>>,
    allowlist: Allowlist,
    curated: CuratedConfig,
    settings: HarvestSettings,
}

impl Harvester {
    pub fn new(
        backends: Vec<Arc<dyn SearchBackend>>,
        allowlist: Allowlist,
        curated: CuratedConfig,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            backends,
            allowlist,
            curated,
            settings,
        }
    }

    /// Produce the citation list for `draft`.
    ///
    /// Never fails. The result holds at most `max_links` entries, no two with
    /// the same `(domain, title)`, and is non-empty as long as fallback links
    /// are configured.
    #[instrument(level = "info", skip_all, fields(title = %draft.title.as_str()))]
    pub async fn harvest(&self, draft: &ArticleDraft) -> Vec<SourceLink> {
        let mut sources = SourceList::with_cap(self.settings.max_links);
        let queries = build_queries(draft, self.settings.max_queries);
        info!(queries = ?queries, backends = self.backends.len(), "Harvesting sources");

        if !queries.is_empty() && !self.backends.is_empty() {
            self.search_all(&queries, &mut sources).await;
        }
        let from_web = sources.len();

        if sources.len() < self.settings.min_links {
            let lead = draft
                .outline
                .paragraphs
                .first()
                .map(String::as_str)
                .unwrap_or(&draft.description);
            let topic = classify(draft.title.as_str(), lead);
            let added = self.append_configured(&mut sources, curated_links(&self.curated, topic));
            info!(?topic, found = from_web, added, "Too few web sources; appended curated links");
        }

        if sources.is_empty() {
            let added = self.append_configured(&mut sources, &self.curated.fallback);
            warn!(added, "No sources found; using global fallback links");
        }

        info!(total = sources.len(), from_web, "Source harvest complete");
        sources.into_links()
    }

    /// Fan every query out to every backend and fill `sources` from the
    /// completions, stopping as soon as the list is full.
    async fn search_all(&self, queries: &[String], sources: &mut SourceList) {
        let jobs: Vec<(String, Arc<dyn SearchBackend>)> = queries
            .iter()
            .flat_map(|q| self.backends.iter().map(move |b| (q.clone(), Arc::clone(b))))
            .collect();
        let total_jobs = jobs.len();
        let timeout = self.settings.timeout;

        let mut completions = stream::iter(jobs)
            .map(move |(query, backend)| async move {
                let name = backend.name();
                let candidates = match tokio::time::timeout(timeout, backend.search(&query)).await {
                    Ok(Ok(candidates)) => {
                        debug!(backend = name, %query, count = candidates.len(), "Backend answered");
                        candidates
                    }
                    Ok(Err(e)) => {
                        warn!(backend = name, %query, error = %e, "Search backend failed; ignoring");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(backend = name, %query, ?timeout, "Search backend timed out; ignoring");
                        Vec::new()
                    }
                };
                (name, candidates)
            })
            .buffer_unordered(self.settings.workers.max(1));

        let mut completed = 0usize;
        let mut off_list = 0usize;
        while let Some((name, candidates)) = completions.next().await {
            completed += 1;
            for candidate in &candidates {
                let Some(link) = to_source_link(candidate, None) else {
                    continue;
                };
                if !self.allowlist.admits(&link.domain) {
                    off_list += 1;
                    continue;
                }
                if sources.push(link) {
                    debug!(backend = name, total = sources.len(), "Accepted source");
                }
                if sources.is_full() {
                    break;
                }
            }
            if sources.is_full() {
                info!(
                    completed,
                    abandoned = total_jobs - completed,
                    "Source cap reached; abandoning pending searches"
                );
                break;
            }
        }
        debug!(off_list, accepted = sources.len(), "Web search pass finished");
    }

    fn append_configured(&self, sources: &mut SourceList, links: &[LinkSpec]) -> usize {
        links
            .iter()
            .filter_map(|l| to_source_link(&Candidate::new(l.url.as_str(), l.title.as_str()), None))
            .filter(|link| {
                let admitted = self.allowlist.admits(&link.domain);
                if !admitted {
                    warn!(url = %link.url, domain = %link.domain, "Configured link is outside the allowlist; dropping it");
                }
                admitted
            })
            .filter(|link| sources.push(link.clone()))
            .count()
    }
}
