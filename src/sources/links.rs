//! Turning raw search-result hrefs into [`SourceLink`]s.
//!
//! Result pages rarely link straight to the destination: DuckDuckGo wraps
//! links in `/l/?uddg=`, Bing in `/ck/a?u=a1<base64>`, Google in `/url?q=`.
//! The real destination is decoded before the domain is looked at.

use crate::models::SourceLink;
use crate::utils::collapse_whitespace;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use url::Url;

/// A `(url, title)` pair as scraped from a results page, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub title: String,
}

impl Candidate {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// Lowercased host of `url` without a leading `www.`.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() { None } else { Some(host) }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn decode_bing_target(encoded: &str) -> Option<String> {
    let payload = encoded.strip_prefix("a1").unwrap_or(encoded);
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    String::from_utf8(bytes).ok()
}

/// Resolve `href` against `base` and unwrap known redirect wrappers.
///
/// Returns `None` when the result is not an absolute http(s) URL.
pub fn resolve_destination(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let parsed = if href.starts_with("//") {
        Url::parse(&format!("https:{href}")).ok()?
    } else {
        match Url::parse(href) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok()?,
            Err(_) => return None,
        }
    };

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let path = parsed.path();
    let unwrapped = if host.ends_with("duckduckgo.com") && path.starts_with("/l/") {
        query_param(&parsed, "uddg")
    } else if host.ends_with("bing.com") && path.starts_with("/ck/a") {
        query_param(&parsed, "u").and_then(|u| decode_bing_target(&u))
    } else if host.contains("google.") && path == "/url" {
        query_param(&parsed, "q").or_else(|| query_param(&parsed, "url"))
    } else {
        None
    };

    let target = match unwrapped {
        Some(inner) => Url::parse(&inner).ok()?,
        None => parsed,
    };
    match target.scheme() {
        "http" | "https" if target.host_str().is_some() => Some(target.to_string()),
        _ => None,
    }
}

/// Normalize a scraped candidate into a [`SourceLink`].
///
/// Discards candidates with an empty title or without an absolute http(s)
/// destination. The allowlist is checked by the caller.
pub fn to_source_link(candidate: &Candidate, base: Option<&Url>) -> Option<SourceLink> {
    let title = collapse_whitespace(&candidate.title);
    if title.is_empty() {
        return None;
    }
    let url = resolve_destination(&candidate.url, base)?;
    let domain = domain_of(&url)?;
    Some(SourceLink { url, title, domain })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://www.insee.fr/fr/stat"), Some("insee.fr".to_string()));
        assert_eq!(domain_of("https://News.UN.org/fr/"), Some("news.un.org".to_string()));
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn test_plain_absolute_url() {
        assert_eq!(
            resolve_destination("https://www.lemonde.fr/economie/article.html", None),
            Some("https://www.lemonde.fr/economie/article.html".to_string())
        );
    }

    #[test]
    fn test_duckduckgo_redirect() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.insee.fr%2Ffr%2Fstatistiques%3Fq%3D1&rut=abc";
        assert_eq!(
            resolve_destination(href, None),
            Some("https://www.insee.fr/fr/statistiques?q=1".to_string())
        );
    }

    #[test]
    fn test_bing_redirect() {
        let target = "https://www.reuters.com/world/";
        let encoded = format!("a1{}", URL_SAFE_NO_PAD.encode(target));
        let href = format!("https://www.bing.com/ck/a?!&&p=abc&u={}&ntb=1", encoded);
        assert_eq!(resolve_destination(&href, None), Some(target.to_string()));
    }

    #[test]
    fn test_google_redirect_relative_to_base() {
        let base = Url::parse("https://www.google.com/search?q=x").unwrap();
        let href = "/url?q=https://www.oecd.org/fr/&sa=U";
        assert_eq!(
            resolve_destination(href, Some(&base)),
            Some("https://www.oecd.org/fr/".to_string())
        );
    }

    #[test]
    fn test_relative_without_base_is_discarded() {
        assert_eq!(resolve_destination("/some/path", None), None);
    }

    #[test]
    fn test_relative_with_base_is_resolved() {
        let base = Url::parse("https://www.mojeek.com/search?q=x").unwrap();
        assert_eq!(
            resolve_destination("/about", Some(&base)),
            Some("https://www.mojeek.com/about".to_string())
        );
    }

    #[test]
    fn test_non_http_scheme_is_discarded() {
        assert_eq!(resolve_destination("mailto:someone@example.org", None), None);
        assert_eq!(resolve_destination("javascript:void(0)", None), None);
        assert_eq!(resolve_destination("www.insee.fr/page", None), None);
    }

    #[test]
    fn test_to_source_link_requires_title() {
        let c = Candidate::new("https://www.insee.fr/", "   ");
        assert_eq!(to_source_link(&c, None), None);

        let c = Candidate::new("https://www.insee.fr/", "  Insee \n accueil ");
        let link = to_source_link(&c, None).unwrap();
        assert_eq!(link.title, "Insee accueil");
        assert_eq!(link.domain, "insee.fr");
    }
}
