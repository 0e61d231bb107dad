//! Keyword topic classifier for picking curated links.

use crate::config::{CuratedConfig, LinkSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Economy,
    International,
    Technology,
    Environment,
    Generic,
}

const ECONOMY: &[&str] = &[
    "économie", "economie", "economy", "economic", "inflation", "budget", "croissance", "growth",
    "pib", "gdp", "chômage", "chomage", "unemployment", "emploi", "dette", "debt", "impôt", "impot",
    "tax", "marché", "markets", "bourse", "taux", "interest rate", "banque", "bank", "bce", "ecb",
    "salaire", "wages", "retraite", "pension",
];

const INTERNATIONAL: &[&str] = &[
    "international", "géopolitique", "geopolitique", "geopolitics", "diplomatie", "diplomacy",
    "guerre", "war", "conflit", "conflict", "otan", "nato", "onu", "united nations", "sommet",
    "summit", "sanctions", "traité", "treaty", "ukraine", "russie", "russia", "chine", "china",
    "états-unis", "etats-unis", "united states", "union européenne", "european union", "élection",
    "election", "frontière", "border", "commerce mondial", "tarifs douaniers", "tariffs",
];

const TECHNOLOGY: &[&str] = &[
    "technologie", "technology", "tech", "numérique", "numerique", "digital",
    "intelligence artificielle", "artificial intelligence", "ia", "ai", "algorithme",
    "algorithm", "données", "donnees", "data", "cybersécurité", "cybersecurite", "cybersecurity",
    "logiciel", "software", "puce", "semi-conducteur", "semiconductor", "robot", "startup",
    "internet", "réseaux sociaux", "social media", "cloud",
];

const ENVIRONMENT: &[&str] = &[
    "environnement", "environment", "climat", "climate", "réchauffement", "warming", "carbone",
    "carbon", "émissions", "emissions", "co2", "biodiversité", "biodiversity", "énergie",
    "energy", "renouvelable", "renewable", "éolien", "eolien", "wind", "solaire", "solar",
    "pollution", "sécheresse", "drought", "inondation", "flood", "transition écologique",
    "nucléaire", "nuclear",
];

/// Count whole-word (or whole-phrase) occurrences of `keywords` in `text`.
///
/// `text` must already be lowercased. Apostrophes split words so French
/// elisions (`l'otan`) still match.
fn score(text: &str, keywords: &[&str]) -> usize {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();
    let padded = format!(" {} ", words.join(" "));

    keywords
        .iter()
        .map(|kw| padded.matches(&format!(" {kw} ")).count())
        .sum()
}

/// Classify an article from its title and lead text.
///
/// Highest keyword score wins; ties resolve in declaration order
/// (economy, international, technology, environment). No hit at all is
/// [`Topic::Generic`].
pub fn classify(title: &str, lead: &str) -> Topic {
    let text = format!("{title} {lead}").to_lowercase();
    let scored = [
        (Topic::Economy, score(&text, ECONOMY)),
        (Topic::International, score(&text, INTERNATIONAL)),
        (Topic::Technology, score(&text, TECHNOLOGY)),
        (Topic::Environment, score(&text, ENVIRONMENT)),
    ];

    let mut best = (Topic::Generic, 0usize);
    for (topic, s) in scored {
        if s > best.1 {
            best = (topic, s);
        }
    }
    best.0
}

/// Curated links configured for `topic`.
pub fn curated_links(curated: &CuratedConfig, topic: Topic) -> &[LinkSpec] {
    match topic {
        Topic::Economy => &curated.economy,
        Topic::International => &curated.international,
        Topic::Technology => &curated.technology,
        Topic::Environment => &curated.environment,
        Topic::Generic => &curated.generic,
    }
}
