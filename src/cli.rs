//! Command-line interface definitions for Awful Newsroom.
//!
//! All paths except `--config` and `--draft` are resolved against the site
//! root. The API key can also come from the `OPENAI_API_KEY` environment
//! variable.

use chrono::NaiveDate;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Command-line arguments for one generation run.
///
/// # Examples
///
/// ```sh
/// # Generate an article on a random configured topic
/// awful_newsroom -s ./site
///
/// # Fixed topic, no hero image
/// awful_newsroom -s ./site --topic "la dette publique" --no-image
///
/// # Offline run from a saved fragment
/// awful_newsroom -s ./site --draft draft.html --no-image --no-sources
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Root directory of the static site
    #[arg(short, long, default_value = ".")]
    pub site_root: PathBuf,

    /// Index page receiving the new card, relative to the site root
    #[arg(short, long, default_value = "index.html")]
    pub index: PathBuf,

    /// Article template, relative to the site root
    #[arg(short, long, default_value = "templates/article.html")]
    pub template: PathBuf,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Article topic; a configured topic is drawn at random when omitted
    #[arg(long)]
    pub topic: Option<String>,

    /// Use a pre-written HTML fragment instead of calling the text generator
    #[arg(long)]
    pub draft: Option<PathBuf>,

    /// Skip the web search for citation links
    #[arg(long)]
    pub no_sources: bool,

    /// Skip hero image generation
    #[arg(long)]
    pub no_image: bool,

    /// Publish date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// API key for the OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl Cli {
    /// Whether this run will call the text or image API at all.
    pub fn needs_api(&self) -> bool {
        self.draft.is_none() || !self.no_image
    }

    pub fn index_path(&self) -> PathBuf {
        self.under_root(&self.index)
    }

    pub fn template_path(&self) -> PathBuf {
        self.under_root(&self.template)
    }

    fn under_root(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.site_root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["awful_newsroom"]);

        assert_eq!(cli.site_root, PathBuf::from("."));
        assert_eq!(cli.index_path(), PathBuf::from("./index.html"));
        assert_eq!(cli.template_path(), PathBuf::from("./templates/article.html"));
        assert!(cli.topic.is_none());
        assert!(!cli.no_sources);
        assert!(!cli.no_image);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "awful_newsroom",
            "-s",
            "/srv/site",
            "-i",
            "home.html",
            "-t",
            "/etc/tpl.html",
            "-c",
            "conf.yaml",
        ]);

        assert_eq!(cli.index_path(), PathBuf::from("/srv/site/home.html"));
        assert_eq!(cli.template_path(), PathBuf::from("/etc/tpl.html"));
        assert_eq!(cli.config, Some(PathBuf::from("conf.yaml")));
    }

    #[test]
    fn test_cli_date_parsing() {
        let cli = Cli::parse_from(["awful_newsroom", "--date", "2026-10-18"]);
        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2026, 10, 18));
        assert!(Cli::try_parse_from(["awful_newsroom", "--date", "18/10/2026"]).is_err());
    }

    #[test]
    fn test_needs_api() {
        let offline = Cli::parse_from(["awful_newsroom", "--draft", "d.html", "--no-image"]);
        assert!(!offline.needs_api());

        let draft_with_image = Cli::parse_from(["awful_newsroom", "--draft", "d.html"]);
        assert!(draft_with_image.needs_api());

        let generated = Cli::parse_from(["awful_newsroom", "--no-image"]);
        assert!(generated.needs_api());
    }
}
