use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shelfwise_core::{BookSource, UnifiedBook};
use tracing::warn;

pub mod google_books;
pub mod openlibrary;
#[cfg(test)]
pub(crate) mod testing;

/// One external book catalog, seen through the unified record shape.
///
/// Implementations never surface transport or payload failures: they log and
/// degrade to an empty list or `None`. Blank input returns immediately
/// without touching the network.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn source(&self) -> BookSource;

    async fn search(&self, query: &str, limit: usize) -> Vec<UnifiedBook>;

    /// Resolve one record by the provider's native id (the composite id minus its prefix).
    async fn fetch_by_id(&self, native_id: &str) -> Option<UnifiedBook>;

    async fn fetch_by_isbn(&self, isbn: &str) -> Option<UnifiedBook>;

    async fn health_check(&self) -> SourceStatus;
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source: BookSource,
    pub available: bool,
    pub latency_ms: Option<u64>,
    pub last_checked: chrono::DateTime<chrono::Utc>,
}

/// `Some(s)` unless the string is empty or whitespace.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// `Some(v)` unless the list is empty.
pub(crate) fn non_empty<T>(value: Option<Vec<T>>) -> Option<Vec<T>> {
    value.filter(|v| !v.is_empty())
}

/// Decode list entries one at a time so a single malformed entry is skipped
/// instead of failing the whole response.
pub(crate) fn decode_entries<T: DeserializeOwned>(
    source: BookSource,
    entries: Option<Vec<serde_json::Value>>,
) -> Vec<T> {
    entries
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(%source, index, error = %e, "skipping undecodable catalog entry");
                None
            }
        })
        .collect()
}
