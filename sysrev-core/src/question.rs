//! Research question analysis.
//!
//! Turns the raw natural-language question into an ordered sequence of
//! keyword phrases and a boolean-style search query suitable for the
//! literature-search API (e.g. `"gene therapy" AND hemophilia`). The
//! extraction is deterministic: the question is produced once at pipeline
//! start and never mutated afterward.

use serde::{Deserialize, Serialize};

/// Function words dropped during keyword extraction. Runs of content words
/// between them become the keyword phrases.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "do", "does", "for",
    "from", "has", "have", "how", "in", "into", "is", "it", "its", "of", "on", "or", "over",
    "should", "such", "than", "that", "the", "their", "there", "these", "this", "to", "use",
    "used", "versus", "vs", "was", "we", "were", "what", "when", "where", "which", "who", "why",
    "will", "with",
];

/// The immutable input to a pipeline run: the raw question plus its derived
/// keyword phrases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQuestion {
    raw: String,
    keywords: Vec<String>,
}

impl ResearchQuestion {
    /// Analyze a raw question string.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let keywords = extract_keywords(&raw);
        Self { raw, keywords }
    }

    /// The original question as given.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Ordered keyword phrases extracted from the question.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Build a boolean-style search query: multi-word phrases quoted,
    /// phrases joined with `AND`.
    pub fn boolean_query(&self) -> String {
        self.keywords
            .iter()
            .map(|phrase| {
                if phrase.contains(' ') {
                    format!("\"{phrase}\"")
                } else {
                    phrase.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Extract keyword phrases: lowercase, strip punctuation, drop stopwords,
/// and group consecutive content words into phrases. Duplicate phrases keep
/// their first occurrence.
fn extract_keywords(raw: &str) -> Vec<String> {
    let lowered = raw.to_lowercase();
    let tokens = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|t| !t.is_empty());

    let mut phrases: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for token in tokens {
        if STOPWORDS.contains(&token) {
            if !current.is_empty() {
                push_phrase(&mut phrases, current.join(" "));
                current.clear();
            }
        } else {
            current.push(token);
        }
    }
    if !current.is_empty() {
        push_phrase(&mut phrases, current.join(" "));
    }

    phrases
}

fn push_phrase(phrases: &mut Vec<String>, phrase: String) {
    if !phrases.contains(&phrase) {
        phrases.push(phrase);
    }
}
