// Corpus model
// Documents are produced by the external scrapers and never mutated here

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a corpus document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Medium,
    Linkedin,
    Github,
    Resume,
    Other,
}

impl fmt::Display for SourceKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Medium => "medium",
            SourceKind::Linkedin => "linkedin",
            SourceKind::Github => "github",
            SourceKind::Resume => "resume",
            SourceKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A source document as delivered by a scraper.
///
/// `raw_text` is plain UTF-8 with markup already stripped; `id` is a stable
/// identifier derived from the document's origin, so re-scraping the same
/// article produces the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_kind: SourceKind,
    pub title: String,
    pub url: Option<String>,
    pub raw_text: String,
    pub fetched_at: DateTime<Utc>,
}
