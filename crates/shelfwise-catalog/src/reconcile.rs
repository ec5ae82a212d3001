use std::collections::HashMap;
use std::sync::Arc;

use shelfwise_core::{CatalogConfig, UnifiedBook};
use tracing::debug;

use crate::error::Result;
use crate::sources::google_books::GoogleBooksSource;
use crate::sources::openlibrary::OpenLibrarySource;
use crate::sources::{CatalogSource, SourceStatus};

/// Records requested from each catalog per multi-catalog search.
pub const PROVIDER_SEARCH_LIMIT: usize = 20;

/// Upper bound on the merged result list.
pub const MAX_MERGED_RESULTS: usize = 40;

/// Two catalogs queried side by side. The primary wins ties and is asked first
/// in fallback chains.
pub struct MultiCatalog {
    pub(crate) primary: Arc<dyn CatalogSource>,
    pub(crate) secondary: Arc<dyn CatalogSource>,
}

impl MultiCatalog {
    /// Google Books as primary, Open Library as secondary.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        Ok(Self::with_sources(
            Arc::new(GoogleBooksSource::new(config)?),
            Arc::new(OpenLibrarySource::new(config)?),
        ))
    }

    pub fn with_sources(primary: Arc<dyn CatalogSource>, secondary: Arc<dyn CatalogSource>) -> Self {
        Self { primary, secondary }
    }

    /// Search both catalogs concurrently and merge the answers.
    ///
    /// A blank query returns nothing without contacting either catalog. Each
    /// catalog degrades to an empty list on its own failure, so one outage
    /// only shrinks the result.
    pub async fn multi_search(&self, query: &str) -> Vec<UnifiedBook> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let (primary, secondary) = tokio::join!(
            self.primary.search(query, PROVIDER_SEARCH_LIMIT),
            self.secondary.search(query, PROVIDER_SEARCH_LIMIT),
        );
        debug!(
            query,
            primary = primary.len(),
            secondary = secondary.len(),
            "multi-catalog candidates"
        );

        let mut merged = merge_candidates(primary.into_iter().chain(secondary));
        merged.truncate(MAX_MERGED_RESULTS);
        merged
    }

    pub async fn health(&self) -> Vec<SourceStatus> {
        let (primary, secondary) =
            tokio::join!(self.primary.health_check(), self.secondary.health_check());
        vec![primary, secondary]
    }
}

/// Deduplicate candidates by identity key, keeping first-seen order.
///
/// A later candidate replaces the stored one, in the stored one's position,
/// only when its completeness score is strictly higher. Equal scores keep the
/// earlier candidate.
pub fn merge_candidates(candidates: impl IntoIterator<Item = UnifiedBook>) -> Vec<UnifiedBook> {
    let mut merged: Vec<UnifiedBook> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let key = candidate.identity_key();
        match slots.get(&key) {
            Some(&slot) => {
                let existing = &merged[slot];
                let (new_score, old_score) =
                    (candidate.completeness_score(), existing.completeness_score());
                if new_score > old_score {
                    debug!(
                        key = %key,
                        kept = candidate.id(),
                        dropped = existing.id(),
                        new_score,
                        old_score,
                        "replacing less complete duplicate"
                    );
                    merged[slot] = candidate;
                }
            }
            None => {
                slots.insert(key, merged.len());
                merged.push(candidate);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use mockito::{Matcher, Server};
    use serde_json::json;
    use shelfwise_core::BookSource;

    use super::*;
    use crate::sources::testing::{FakeSource, book};

    fn catalog(primary: Vec<UnifiedBook>, secondary: Vec<UnifiedBook>) -> (MultiCatalog, Arc<FakeSource>, Arc<FakeSource>) {
        let a = Arc::new(FakeSource::new(BookSource::Google, primary));
        let b = Arc::new(FakeSource::new(BookSource::OpenLibrary, secondary));
        (MultiCatalog::with_sources(a.clone(), b.clone()), a, b)
    }

    #[tokio::test]
    async fn blank_query_contacts_no_catalog() {
        let (multi, a, b) = catalog(
            vec![book(BookSource::Google, "g1", "Dune", "Frank Herbert")],
            vec![book(BookSource::OpenLibrary, "/works/OL1W", "Dune", "Frank Herbert")],
        );

        assert!(multi.multi_search("").await.is_empty());
        assert!(multi.multi_search("   ").await.is_empty());
        assert_eq!(a.call_count(), 0);
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test]
    async fn both_catalogs_asked_for_twenty() {
        let (multi, a, b) = catalog(vec![], vec![]);
        multi.multi_search("dune").await;
        assert_eq!(*a.limits.lock().unwrap(), vec![PROVIDER_SEARCH_LIMIT]);
        assert_eq!(*b.limits.lock().unwrap(), vec![PROVIDER_SEARCH_LIMIT]);
    }

    /// Catalog whose search only completes once every catalog sharing the barrier has started.
    struct GatedSource {
        source: BookSource,
        gate: Arc<tokio::sync::Barrier>,
    }

    #[async_trait::async_trait]
    impl CatalogSource for GatedSource {
        fn source(&self) -> BookSource {
            self.source
        }

        async fn search(&self, _query: &str, _limit: usize) -> Vec<UnifiedBook> {
            self.gate.wait().await;
            vec![book(self.source, "gated", &format!("{} pick", self.source), "A")]
        }

        async fn fetch_by_id(&self, _native_id: &str) -> Option<UnifiedBook> {
            None
        }

        async fn fetch_by_isbn(&self, _isbn: &str) -> Option<UnifiedBook> {
            None
        }

        async fn health_check(&self) -> SourceStatus {
            SourceStatus {
                source: self.source,
                available: true,
                latency_ms: None,
                last_checked: chrono::Utc::now(),
            }
        }
    }

    #[tokio::test]
    async fn both_searches_run_concurrently() {
        let gate = Arc::new(tokio::sync::Barrier::new(2));
        let multi = MultiCatalog::with_sources(
            Arc::new(GatedSource { source: BookSource::Google, gate: gate.clone() }),
            Arc::new(GatedSource { source: BookSource::OpenLibrary, gate }),
        );

        let out = tokio::time::timeout(std::time::Duration::from_secs(5), multi.multi_search("dune"))
            .await
            .expect("second search never started while the first was pending");
        let ids: Vec<&str> = out.iter().map(UnifiedBook::id).collect();
        assert_eq!(ids, vec!["google:gated", "openlibrary:gated"]);
    }

    #[tokio::test]
    async fn primary_outage_returns_secondary_in_order() {
        let secondary = vec![
            book(BookSource::OpenLibrary, "/works/OL1W", "Dune", "Frank Herbert"),
            book(BookSource::OpenLibrary, "/works/OL2W", "Children of Dune", "Frank Herbert"),
            book(BookSource::OpenLibrary, "/works/OL3W", "Dune", "Frank Herbert"),
        ];
        let (multi, _, _) = catalog(vec![], secondary.clone());

        let out = multi.multi_search("dune").await;
        assert_eq!(out, merge_candidates(secondary));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id(), "openlibrary:/works/OL1W");
        assert_eq!(out[1].id(), "openlibrary:/works/OL2W");
    }

    #[tokio::test]
    async fn secondary_outage_returns_primary_in_order() {
        let primary = vec![
            book(BookSource::Google, "g1", "Dune", "Frank Herbert"),
            book(BookSource::Google, "g2", "Dune Messiah", "Frank Herbert"),
        ];
        let (multi, _, _) = catalog(primary.clone(), vec![]);
        assert_eq!(multi.multi_search("dune").await, primary);
    }

    #[test]
    fn tie_keeps_first_seen() {
        let a = book(BookSource::Google, "g1", "Dune", "Frank Herbert");
        let b = book(BookSource::OpenLibrary, "/works/OL1W", "DUNE", "frank herbert");
        assert_eq!(a.identity_key(), b.identity_key());

        let out = merge_candidates(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source(), BookSource::Google);
    }

    #[test]
    fn more_complete_duplicate_takes_original_slot() {
        let first = book(BookSource::Google, "g1", "Dune", "Frank Herbert");
        let other = book(BookSource::Google, "g2", "Emma", "Jane Austen");
        let mut richer = book(BookSource::OpenLibrary, "/works/OL1W", "Dune", "Frank Herbert");
        richer.cover_url = Some("https://covers.openlibrary.org/b/id/1-L.jpg".to_string());

        let out = merge_candidates(vec![first, other, richer]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id(), "openlibrary:/works/OL1W");
        assert_eq!(out[1].id(), "google:g2");
    }

    #[test]
    fn isbn_key_merges_across_titles() {
        let mut a = book(BookSource::Google, "g1", "Dune (40th Anniversary)", "Frank Herbert");
        a.isbn13 = Some("9780441013593".to_string());
        let mut b = book(BookSource::OpenLibrary, "/works/OL1W", "Dune", "Herbert, Frank");
        b.isbn13 = Some("9780441013593".to_string());
        b.description = Some("Arrakis".to_string());

        let out = merge_candidates(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), "openlibrary:/works/OL1W");
    }

    #[tokio::test]
    async fn merged_output_is_bounded_and_unique() {
        let primary: Vec<_> = (0..30)
            .map(|i| book(BookSource::Google, &format!("g{i}"), &format!("Title {i}"), "A"))
            .collect();
        let secondary: Vec<_> = (15..45)
            .map(|i| book(BookSource::OpenLibrary, &format!("/works/OL{i}W"), &format!("Title {i}"), "A"))
            .collect();
        let (multi, _, _) = catalog(primary, secondary);

        let out = multi.multi_search("title").await;
        assert_eq!(out.len(), MAX_MERGED_RESULTS);
        let keys: HashSet<String> = out.iter().map(UnifiedBook::identity_key).collect();
        assert_eq!(keys.len(), out.len());
        assert_eq!(out[0].id(), "google:g0");
        assert_eq!(out[39].id(), "openlibrary:/works/OL39W");
    }

    fn live_catalog(google: &Server, openlibrary: &Server) -> MultiCatalog {
        MultiCatalog::new(&CatalogConfig {
            google_books_url: format!("{}/books/v1/volumes", google.url()),
            openlibrary_url: openlibrary.url(),
            ..CatalogConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn described_google_record_beats_bare_openlibrary_record() {
        let mut google = Server::new_async().await;
        let mut openlibrary = Server::new_async().await;

        let _g = google
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::UrlEncoded("q".into(), "dune".into()))
            .with_status(200)
            .with_body(
                json!({
                    "totalItems": 1,
                    "items": [{
                        "id": "B1hSG45JCX4C",
                        "volumeInfo": {
                            "title": "Dune",
                            "authors": ["Frank Herbert"],
                            "description": "Set on the desert planet Arrakis."
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _o = openlibrary
            .mock("GET", "/search.json")
            .match_query(Matcher::UrlEncoded("q".into(), "dune".into()))
            .with_status(200)
            .with_body(
                json!({
                    "numFound": 2,
                    "docs": [
                        {"key": "/works/OL893415W", "title": "Dune", "author_name": ["Frank Herbert"]},
                        {"key": "/works/OL45804W", "title": "Dune Messiah", "author_name": ["Frank Herbert"]}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let out = live_catalog(&google, &openlibrary).multi_search("dune").await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id(), "google:B1hSG45JCX4C");
        assert_eq!(out[0].description.as_deref(), Some("Set on the desert planet Arrakis."));
        assert_eq!(out[1].id(), "openlibrary:/works/OL45804W");
    }

    #[tokio::test]
    async fn google_outage_keeps_openlibrary_results() {
        let mut google = Server::new_async().await;
        let mut openlibrary = Server::new_async().await;

        let g = google
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;
        let _o = openlibrary
            .mock("GET", "/search.json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "numFound": 2,
                    "docs": [
                        {"key": "/works/OL2W", "title": "Dune Messiah", "author_name": ["Frank Herbert"]},
                        {"key": "/works/OL1W", "title": "Dune", "author_name": ["Frank Herbert"]}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let out = live_catalog(&google, &openlibrary).multi_search("dune").await;
        g.assert_async().await;
        let ids: Vec<&str> = out.iter().map(UnifiedBook::id).collect();
        assert_eq!(ids, vec!["openlibrary:/works/OL2W", "openlibrary:/works/OL1W"]);
    }
}
