use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use shelfwise_core::{BookSource, CatalogConfig, UnifiedBook};
use tracing::{debug, warn};

use crate::error::{CatalogError, Result};
use crate::http::{CatalogClient, join_segments, parse_base_url};
use crate::sources::{CatalogSource, SourceStatus, decode_entries, non_blank, non_empty};

const COVER_URL_TEMPLATE: &str = "https://covers.openlibrary.org/b/id";
const MAX_CATEGORIES: usize = 5;

// ─── Native payload ──────────────────────────────────────────────────────────

/// `GET /search.json` response body.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchResponse {
    /// Raw entries; see [`SearchResponse::docs`].
    #[serde(rename = "docs")]
    pub raw_docs: Option<Vec<serde_json::Value>>,
    #[serde(rename = "numFound")]
    pub num_found: u64,
}

impl SearchResponse {
    /// Decoded search hits. Entries that fail to decode are logged and skipped.
    pub fn docs(self) -> Vec<OpenLibraryDoc> {
        decode_entries(BookSource::OpenLibrary, self.raw_docs)
    }
}

/// One search hit. `key` is a work key such as `/works/OL893415W`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenLibraryDoc {
    pub key: String,
    pub title: Option<String>,
    pub author_name: Option<Vec<String>>,
    pub first_publish_year: Option<i64>,
    pub isbn: Option<Vec<String>>,
    pub publisher: Option<Vec<String>>,
    pub language: Option<Vec<String>>,
    pub number_of_pages_median: Option<u32>,
    pub cover_i: Option<i64>,
    pub subject: Option<Vec<String>>,
}

/// `GET <key>.json` for a work.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenLibraryWork {
    pub title: Option<String>,
    pub description: Option<TextValue>,
    pub covers: Option<Vec<i64>>,
    pub subjects: Option<Vec<String>>,
    pub first_publish_date: Option<String>,
}

/// `GET /isbn/<isbn>.json`, which resolves to an edition.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenLibraryEdition {
    pub key: Option<String>,
    pub title: Option<String>,
    pub description: Option<TextValue>,
    pub covers: Option<Vec<i64>>,
    pub publishers: Option<Vec<String>>,
    pub publish_date: Option<String>,
    pub number_of_pages: Option<u32>,
    pub languages: Option<Vec<KeyRef>>,
    pub isbn_10: Option<Vec<String>>,
    pub isbn_13: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KeyRef {
    pub key: String,
}

/// Open Library text fields arrive either bare or as `{"type": ..., "value": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextValue {
    Plain(String),
    Typed { value: String },
}

impl TextValue {
    pub fn into_string(self) -> String {
        match self {
            Self::Plain(s) | Self::Typed { value: s } => s,
        }
    }
}

fn cover_url(cover_id: Option<i64>) -> Option<String> {
    cover_id
        .filter(|id| *id > 0)
        .map(|id| format!("{COVER_URL_TEMPLATE}/{id}-L.jpg"))
}

fn first(values: Option<&Vec<String>>) -> Option<String> {
    non_blank(values.and_then(|v| v.first()).cloned())
}

/// First entry of exactly `len` characters. No checksum validation.
fn first_of_length(values: Option<&Vec<String>>, len: usize) -> Option<String> {
    values?
        .iter()
        .find(|s| s.chars().count() == len)
        .cloned()
}

fn leading_categories(values: Option<Vec<String>>) -> Option<Vec<String>> {
    non_empty(values.map(|v| v.into_iter().take(MAX_CATEGORIES).collect()))
}

impl OpenLibraryDoc {
    pub fn to_unified(&self) -> UnifiedBook {
        let mut book = UnifiedBook::new(
            BookSource::OpenLibrary,
            &self.key,
            self.title.clone().unwrap_or_default(),
        )
        .with_authors(self.author_name.clone().unwrap_or_default());

        book.cover_url = cover_url(self.cover_i);
        book.published_date = self.first_publish_year.map(|year| year.to_string());
        book.page_count = self.number_of_pages_median.filter(|n| *n > 0);
        book.categories = leading_categories(self.subject.clone());
        book.isbn10 = first_of_length(self.isbn.as_ref(), 10);
        book.isbn13 = first_of_length(self.isbn.as_ref(), 13);
        book.publisher = first(self.publisher.as_ref());
        book.language = first(self.language.as_ref());
        book
    }
}

impl OpenLibraryWork {
    /// Author references are not resolved; the record keeps the placeholder author.
    pub fn to_unified(&self, work_key: &str) -> UnifiedBook {
        let mut book = UnifiedBook::new(
            BookSource::OpenLibrary,
            work_key,
            self.title.clone().unwrap_or_default(),
        );

        book.description = non_blank(self.description.clone().map(TextValue::into_string));
        book.cover_url = cover_url(self.covers.as_ref().and_then(|c| c.first().copied()));
        book.categories = leading_categories(self.subjects.clone());
        book.published_date = non_blank(self.first_publish_date.clone());
        book
    }
}

impl OpenLibraryEdition {
    /// Author references are not resolved; the record keeps the placeholder author.
    pub fn to_unified(&self, isbn: &str) -> UnifiedBook {
        let native_key = self
            .key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| format!("/books/{isbn}"));
        let mut book = UnifiedBook::new(
            BookSource::OpenLibrary,
            &native_key,
            self.title.clone().unwrap_or_default(),
        );

        book.description = non_blank(self.description.clone().map(TextValue::into_string));
        book.cover_url = cover_url(self.covers.as_ref().and_then(|c| c.first().copied()));
        book.published_date = non_blank(self.publish_date.clone());
        book.page_count = self.number_of_pages.filter(|n| *n > 0);
        book.isbn10 = first(self.isbn_10.as_ref());
        book.isbn13 = first(self.isbn_13.as_ref());
        book.publisher = first(self.publishers.as_ref());
        book.language = self
            .languages
            .as_ref()
            .and_then(|langs| langs.first())
            .and_then(|lang| lang.key.rsplit('/').next())
            .map(ToOwned::to_owned)
            .filter(|code| !code.is_empty());
        book
    }
}

// ─── Source ──────────────────────────────────────────────────────────────────

pub struct OpenLibrarySource {
    client: CatalogClient,
    base_url: Url,
}

impl OpenLibrarySource {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        Ok(Self {
            client: CatalogClient::new(config)?,
            base_url: parse_base_url(&config.openlibrary_url)?,
        })
    }

    /// `GET /search.json?q=<query>&limit=<n>`
    pub async fn try_search(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        let mut url = join_segments(&self.base_url, ["search.json"])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());
        self.client.get_json(&url).await
    }

    /// `GET <work_key>.json`, e.g. `/works/OL893415W.json`.
    pub async fn try_fetch_work(&self, work_key: &str) -> Result<OpenLibraryWork> {
        let url = self.key_url(work_key)?;
        self.client.get_json(&url).await
    }

    /// `GET /isbn/<isbn>.json`
    pub async fn try_fetch_edition(&self, isbn: &str) -> Result<OpenLibraryEdition> {
        let file = format!("{isbn}.json");
        let url = join_segments(&self.base_url, ["isbn", file.as_str()])?;
        self.client.get_json(&url).await
    }

    fn key_url(&self, key: &str) -> Result<Url> {
        let mut segments: Vec<String> = key
            .split('/')
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        let Some(last) = segments.last_mut() else {
            return Err(CatalogError::InvalidUrl(format!("empty Open Library key: {key:?}")));
        };
        last.push_str(".json");
        join_segments(&self.base_url, segments.iter().map(String::as_str))
    }
}

#[async_trait]
impl CatalogSource for OpenLibrarySource {
    fn source(&self) -> BookSource {
        BookSource::OpenLibrary
    }

    async fn search(&self, query: &str, limit: usize) -> Vec<UnifiedBook> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        match self.try_search(query, limit).await {
            Ok(resp) => {
                let total = resp.num_found;
                let books: Vec<UnifiedBook> =
                    resp.docs().iter().map(OpenLibraryDoc::to_unified).collect();
                debug!(query, count = books.len(), total, "openlibrary search");
                books
            }
            Err(e) => {
                warn!(query, error = %e, "Open Library search failed");
                Vec::new()
            }
        }
    }

    async fn fetch_by_id(&self, native_id: &str) -> Option<UnifiedBook> {
        let native_id = native_id.trim();
        if native_id.is_empty() {
            return None;
        }

        match self.try_fetch_work(native_id).await {
            Ok(work) => Some(work.to_unified(native_id)),
            Err(e) => {
                warn!(key = native_id, error = %e, "Open Library work fetch failed");
                None
            }
        }
    }

    async fn fetch_by_isbn(&self, isbn: &str) -> Option<UnifiedBook> {
        let isbn = isbn.trim();
        if isbn.is_empty() {
            return None;
        }

        match self.try_fetch_edition(isbn).await {
            Ok(edition) => Some(edition.to_unified(isbn)),
            Err(e) => {
                warn!(isbn, error = %e, "Open Library edition fetch failed");
                None
            }
        }
    }

    async fn health_check(&self) -> SourceStatus {
        let start = Instant::now();
        let available = self.try_search("books", 1).await.is_ok();
        SourceStatus {
            source: self.source(),
            available,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            last_checked: Utc::now(),
        }
    }
}
