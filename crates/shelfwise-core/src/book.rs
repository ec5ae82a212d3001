use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::BookRecord;

/// Placeholder author used when a catalog does not report authorship.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Separator between the provider prefix and the native id in a composite id.
pub const ID_SEPARATOR: char = ':';

/// External catalog a [`UnifiedBook`] was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSource {
    Google,
    OpenLibrary,
}

impl BookSource {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenLibrary => "openlibrary",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "google" => Some(Self::Google),
            "openlibrary" => Some(Self::OpenLibrary),
            _ => None,
        }
    }

    /// Build `"<prefix>:<native_id>"`.
    pub fn composite_id(&self, native_id: &str) -> String {
        format!("{}{ID_SEPARATOR}{native_id}", self.prefix())
    }
}

impl fmt::Display for BookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Split a composite id on its first separator into `(prefix, native_id)`.
///
/// Open Library keys contain further slashes but never a colon, so only the
/// first separator is significant: `"openlibrary:/works/OL1W"` yields
/// `("openlibrary", "/works/OL1W")`.
pub fn split_composite_id(composite_id: &str) -> Option<(&str, &str)> {
    composite_id.split_once(ID_SEPARATOR)
}

/// Provider-agnostic book record produced by a catalog adapter.
///
/// `id` and `source` are fixed at construction so the id prefix can never
/// disagree with the source. All optional fields mean "the provider did not
/// report this"; adapters never store empty strings or zero page counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedBook {
    id: String,
    source: BookSource,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn10: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl UnifiedBook {
    pub fn new(source: BookSource, native_id: &str, title: impl Into<String>) -> Self {
        Self {
            id: source.composite_id(native_id),
            source,
            title: title.into(),
            authors: vec![UNKNOWN_AUTHOR.to_string()],
            description: None,
            cover_url: None,
            published_date: None,
            page_count: None,
            categories: None,
            isbn10: None,
            isbn13: None,
            publisher: None,
            language: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> BookSource {
        self.source
    }

    /// The provider's own id, without the source prefix.
    pub fn native_id(&self) -> &str {
        split_composite_id(&self.id)
            .map(|(_, native)| native)
            .unwrap_or_default()
    }

    /// Replace the author list, keeping the placeholder when `authors` is empty.
    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        if !authors.is_empty() {
            self.authors = authors;
        }
        self
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// Natural key used to detect that two catalog records describe the same book.
    ///
    /// ISBN-13, else ISBN-10, else `lowercase(title)-lowercase(first author)`.
    /// Punctuation and inner whitespace are not normalized.
    pub fn identity_key(&self) -> String {
        if let Some(isbn13) = &self.isbn13 {
            return isbn13.clone();
        }
        if let Some(isbn10) = &self.isbn10 {
            return isbn10.clone();
        }
        format!(
            "{}-{}",
            self.title.to_lowercase(),
            self.first_author().unwrap_or_default().to_lowercase()
        )
    }

    /// Crude completeness heuristic: description 3, cover 2, page count 1,
    /// plus one per category.
    pub fn completeness_score(&self) -> u32 {
        let mut score = 0;
        if self.description.is_some() {
            score += 3;
        }
        if self.cover_url.is_some() {
            score += 2;
        }
        if self.page_count.is_some() {
            score += 1;
        }
        score + self.categories.as_ref().map_or(0, |c| c.len() as u32)
    }

    pub fn to_record(&self) -> BookRecord {
        BookRecord::from(self)
    }
}
