//! Run configuration loaded from an optional YAML file.
//!
//! Every field has a default, so running without `--config` uses the built-in
//! values below. A config path that was given but does not exist is a fatal
//! error rather than a silent fallback to defaults.

use crate::error::FatalError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub search: SearchConfig,
    pub curated: CuratedConfig,
    pub images: ImageConfig,
    pub site: SiteConfig,
}

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-4o-mini".to_string(),
            image_model: "gpt-image-1".to_string(),
            timeout_secs: 120,
            max_retries: 5,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hard cap on harvested links.
    pub max_links: usize,
    /// Below this many web results the curated topic links are appended.
    pub min_links: usize,
    pub max_queries: usize,
    /// Concurrent backend requests in flight.
    pub workers: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Trusted domains; subdomains of an entry are admitted too.
    pub allowlist: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_links: 10,
            min_links: 3,
            max_queries: 4,
            workers: 6,
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            allowlist: default_allowlist(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_allowlist() -> Vec<String> {
    [
        // French public institutions and statistics
        "gouv.fr",
        "insee.fr",
        "banque-france.fr",
        "vie-publique.fr",
        "cnil.fr",
        "arcep.fr",
        "assemblee-nationale.fr",
        "senat.fr",
        // International organisations
        "europa.eu",
        "un.org",
        "unep.org",
        "who.int",
        "oecd.org",
        "imf.org",
        "worldbank.org",
        "ipcc.ch",
        // Newsrooms and agencies
        "afp.com",
        "reuters.com",
        "apnews.com",
        "bbc.com",
        "bbc.co.uk",
        "lemonde.fr",
        "lesechos.fr",
        "francetvinfo.fr",
        "rfi.fr",
        "france24.com",
        "courrierinternational.com",
        "theguardian.com",
        "nytimes.com",
        "ft.com",
        "economist.com",
        // Science
        "nature.com",
        "science.org",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// A vetted link that ships with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkSpec {
    pub url: String,
    pub title: String,
}

impl LinkSpec {
    fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
        }
    }
}

/// Curated links per topic, used when web search comes back short.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CuratedConfig {
    pub economy: Vec<LinkSpec>,
    pub international: Vec<LinkSpec>,
    pub technology: Vec<LinkSpec>,
    pub environment: Vec<LinkSpec>,
    pub generic: Vec<LinkSpec>,
    /// Last resort so an article never ships without citations.
    pub fallback: Vec<LinkSpec>,
}

impl Default for CuratedConfig {
    fn default() -> Self {
        Self {
            economy: vec![
                LinkSpec::new("https://www.insee.fr/fr/statistiques", "Insee – Statistiques et études"),
                LinkSpec::new("https://www.banque-france.fr/fr/statistiques", "Banque de France – Statistiques"),
                LinkSpec::new("https://www.oecd.org/fr/economie.html", "OCDE – Économie"),
                LinkSpec::new("https://www.imf.org/fr/Publications/WEO", "FMI – Perspectives de l'économie mondiale"),
            ],
            international: vec![
                LinkSpec::new("https://news.un.org/fr/", "ONU Info"),
                LinkSpec::new("https://www.diplomatie.gouv.fr/fr/", "Ministère de l'Europe et des Affaires étrangères"),
                LinkSpec::new("https://european-union.europa.eu/index_fr", "Union européenne – Portail officiel"),
                LinkSpec::new("https://www.reuters.com/world/", "Reuters – World"),
            ],
            technology: vec![
                LinkSpec::new("https://www.cnil.fr/fr/intelligence-artificielle", "CNIL – Intelligence artificielle"),
                LinkSpec::new("https://www.arcep.fr/", "Arcep – Régulation des communications électroniques"),
                LinkSpec::new("https://digital-strategy.ec.europa.eu/fr", "Commission européenne – Stratégie numérique"),
                LinkSpec::new("https://www.oecd.org/fr/numerique/", "OCDE – Numérique"),
            ],
            environment: vec![
                LinkSpec::new("https://www.ipcc.ch/", "GIEC – Groupe d'experts intergouvernemental sur l'évolution du climat"),
                LinkSpec::new("https://www.ecologie.gouv.fr/", "Ministère de la Transition écologique"),
                LinkSpec::new("https://www.unep.org/fr", "Programme des Nations unies pour l'environnement"),
                LinkSpec::new("https://www.eea.europa.eu/fr", "Agence européenne pour l'environnement"),
            ],
            generic: Vec::new(),
            fallback: vec![
                LinkSpec::new("https://www.vie-publique.fr/", "Vie publique"),
                LinkSpec::new("https://www.afp.com/fr", "AFP – Agence France-Presse"),
                LinkSpec::new("https://www.reuters.com/", "Reuters"),
                LinkSpec::new("https://apnews.com/", "Associated Press"),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Prompt templates; `{title}` is replaced with the article title.
    pub prompt_variants: Vec<String>,
    /// Sizes tried for each prompt, in order.
    pub sizes: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            prompt_variants: vec![
                "Editorial news photograph illustrating: {title}. Natural light, no text, no logos.".to_string(),
                "Clean editorial illustration for a news article titled \"{title}\". No text.".to_string(),
            ],
            sizes: vec!["1536x1024".to_string(), "1024x1024".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::En => "en",
        }
    }

    pub fn published_label(self) -> &'static str {
        match self {
            Language::Fr => "Publié le",
            Language::En => "Published",
        }
    }

    pub fn read_label(self) -> &'static str {
        match self {
            Language::Fr => "Lire l’article",
            Language::En => "Read the article",
        }
    }

    pub fn read_aria_prefix(self) -> &'static str {
        match self {
            Language::Fr => "Lire :",
            Language::En => "Read:",
        }
    }

    /// Short month names, January first.
    pub fn months(self) -> [&'static str; 12] {
        match self {
            Language::Fr => [
                "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.",
                "nov.", "déc.",
            ],
            Language::En => [
                "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    pub language: Language,
    /// Relative to the site root.
    pub articles_dir: String,
    /// Relative to the site root.
    pub images_dir: String,
    /// Card thumbnail used when no hero image was produced, relative to the site root.
    pub placeholder_thumbnail: String,
    pub badge: String,
    /// Topics drawn from at random when `--topic` is not given.
    pub topics: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            language: Language::Fr,
            articles_dir: "articles".to_string(),
            images_dir: "images".to_string(),
            placeholder_thumbnail: "images/placeholder.jpg".to_string(),
            badge: "Automat.".to_string(),
            topics: vec![
                "la politique budgétaire française".to_string(),
                "la transition énergétique en Europe".to_string(),
                "la régulation de l'intelligence artificielle".to_string(),
                "les tensions commerciales internationales".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from `path`, or return defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(FatalError::MissingFile(path.to_path_buf()).into());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, Box<dyn Error>> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::allowlist::Allowlist;
    use crate::sources::links::domain_of;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.search.max_links, 10);
        assert_eq!(config.search.min_links, 3);
        assert_eq!(config.site.language, Language::Fr);
        assert!(!config.curated.fallback.is_empty());
        assert!(config.curated.generic.is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
search:
  max_links: 5
  allowlist: ["insee.fr"]
site:
  language: en
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.search.max_links, 5);
        assert_eq!(config.search.min_links, 3);
        assert_eq!(config.search.allowlist, vec!["insee.fr".to_string()]);
        assert_eq!(config.site.language, Language::En);
        assert_eq!(config.api.max_retries, 5);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("  \n").unwrap();
        assert_eq!(config.search.workers, 6);
    }

    #[test]
    fn test_missing_config_path_is_fatal() {
        let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(err.to_string().contains("required file not found"));
    }

    #[test]
    fn test_curated_domains_are_allowlisted() {
        let config = Config::default();
        let allowlist = Allowlist::new(&config.search.allowlist);
        let curated = &config.curated;
        let all_links = curated
            .economy
            .iter()
            .chain(&curated.international)
            .chain(&curated.technology)
            .chain(&curated.environment)
            .chain(&curated.generic)
            .chain(&curated.fallback);
        for link in all_links {
            let domain = domain_of(&link.url).unwrap();
            assert!(allowlist.admits(&domain), "{} not allowlisted", domain);
        }
    }
}
