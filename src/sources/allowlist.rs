//! Trusted-domain allowlist.

use std::collections::HashSet;

/// A set of trusted domains, matched on the domain itself or any subdomain.
///
/// `insee.fr` admits `insee.fr` and `www.insee.fr`, never `notinsee.fr`.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    entries: HashSet<String>,
}

impl Allowlist {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|e| normalize(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn admits(&self, domain: &str) -> bool {
        let domain = normalize(domain);
        if domain.is_empty() {
            return false;
        }
        if self.entries.contains(&domain) {
            return true;
        }
        // Walk up the parents: a.b.example.org -> b.example.org -> example.org
        let mut rest = domain.as_str();
        while let Some(pos) = rest.find('.') {
            rest = &rest[pos + 1..];
            if self.entries.contains(rest) {
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(domain: &str) -> String {
    let d = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    d.strip_prefix("www.").map(str::to_string).unwrap_or(d)
}
