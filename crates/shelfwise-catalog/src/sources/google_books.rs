use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use shelfwise_core::{BookSource, CatalogConfig, UnifiedBook};
use tracing::{debug, warn};

use crate::error::Result;
use crate::http::{CatalogClient, join_segments, parse_base_url};
use crate::sources::{CatalogSource, SourceStatus, decode_entries, non_blank, non_empty};

// ─── Native payload ──────────────────────────────────────────────────────────

/// `GET <endpoint>?q=...` response body.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeSearchResponse {
    /// Raw entries; see [`VolumeSearchResponse::volumes`].
    pub items: Option<Vec<serde_json::Value>>,
    pub total_items: u64,
}

impl VolumeSearchResponse {
    /// Decoded volumes. Entries that fail to decode are logged and skipped.
    pub fn volumes(self) -> Vec<GoogleVolume> {
        decode_entries(BookSource::Google, self.items)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GoogleVolume {
    pub id: String,
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub description: Option<String>,
    pub image_links: Option<ImageLinks>,
    pub published_date: Option<String>,
    pub page_count: Option<u32>,
    pub categories: Option<Vec<String>>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub industry_identifiers: Option<Vec<IndustryIdentifier>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

impl GoogleVolume {
    pub fn to_unified(&self) -> UnifiedBook {
        let info = &self.volume_info;
        let mut book = UnifiedBook::new(
            BookSource::Google,
            &self.id,
            info.title.clone().unwrap_or_default(),
        )
        .with_authors(info.authors.clone().unwrap_or_default());

        book.description = non_blank(info.description.clone());
        book.cover_url = non_blank(
            info.image_links
                .as_ref()
                .and_then(|links| links.thumbnail.as_deref())
                .map(upgrade_to_https),
        );
        book.published_date = non_blank(info.published_date.clone());
        book.page_count = info.page_count.filter(|n| *n > 0);
        book.categories = non_empty(info.categories.clone());
        book.isbn10 = self.identifier("ISBN_10");
        book.isbn13 = self.identifier("ISBN_13");
        book.publisher = non_blank(info.publisher.clone());
        book.language = non_blank(info.language.clone());
        book
    }

    /// First identifier carrying the given type tag.
    fn identifier(&self, kind: &str) -> Option<String> {
        self.volume_info
            .industry_identifiers
            .as_ref()?
            .iter()
            .find(|id| id.kind == kind)
            .map(|id| id.identifier.clone())
            .filter(|id| !id.trim().is_empty())
    }
}

/// Rewrite the first `http:` to `https:`; thumbnails are served over both.
fn upgrade_to_https(url: &str) -> String {
    url.replacen("http:", "https:", 1)
}

// ─── Source ──────────────────────────────────────────────────────────────────

pub struct GoogleBooksSource {
    client: CatalogClient,
    endpoint: Url,
    api_key: Option<String>,
}

impl GoogleBooksSource {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        Ok(Self {
            client: CatalogClient::new(config)?,
            endpoint: parse_base_url(&config.google_books_url)?,
            api_key: config.google_api_key.clone(),
        })
    }

    /// `GET <endpoint>?q=<query>&startIndex=<n>&maxResults=<n>`
    pub async fn try_search(
        &self,
        query: &str,
        start_index: usize,
        max_results: usize,
    ) -> Result<VolumeSearchResponse> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("startIndex", &start_index.to_string())
            .append_pair("maxResults", &max_results.to_string());
        self.append_key(&mut url);

        self.client.get_json(&url).await
    }

    /// `GET <endpoint>/<volumeId>`
    pub async fn try_fetch_volume(&self, volume_id: &str) -> Result<GoogleVolume> {
        let mut url = join_segments(&self.endpoint, [volume_id])?;
        self.append_key(&mut url);
        self.client.get_json(&url).await
    }

    fn append_key(&self, url: &mut Url) {
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
    }
}

#[async_trait]
impl CatalogSource for GoogleBooksSource {
    fn source(&self) -> BookSource {
        BookSource::Google
    }

    async fn search(&self, query: &str, limit: usize) -> Vec<UnifiedBook> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        match self.try_search(query, 0, limit).await {
            Ok(resp) => {
                let total = resp.total_items;
                let books: Vec<UnifiedBook> =
                    resp.volumes().iter().map(GoogleVolume::to_unified).collect();
                debug!(query, count = books.len(), total, "google search");
                books
            }
            Err(e) => {
                warn!(query, error = %e, "Google Books search failed");
                Vec::new()
            }
        }
    }

    async fn fetch_by_id(&self, native_id: &str) -> Option<UnifiedBook> {
        let native_id = native_id.trim();
        if native_id.is_empty() {
            return None;
        }

        match self.try_fetch_volume(native_id).await {
            Ok(volume) => Some(volume.to_unified()),
            Err(e) => {
                warn!(id = native_id, error = %e, "Google Books volume fetch failed");
                None
            }
        }
    }

    async fn fetch_by_isbn(&self, isbn: &str) -> Option<UnifiedBook> {
        let isbn = isbn.trim();
        if isbn.is_empty() {
            return None;
        }

        match self.try_search(&format!("isbn:{isbn}"), 0, 1).await {
            Ok(resp) => resp.volumes().first().map(GoogleVolume::to_unified),
            Err(e) => {
                warn!(isbn, error = %e, "Google Books ISBN search failed");
                None
            }
        }
    }

    async fn health_check(&self) -> SourceStatus {
        let start = Instant::now();
        let available = self.try_search("books", 0, 1).await.is_ok();
        SourceStatus {
            source: self.source(),
            available,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            last_checked: Utc::now(),
        }
    }
}
