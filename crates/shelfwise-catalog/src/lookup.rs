use shelfwise_core::{BookSource, UnifiedBook, split_composite_id};
use tracing::debug;

use crate::reconcile::MultiCatalog;
use crate::sources::CatalogSource;

impl MultiCatalog {
    /// Resolve a composite id such as `google:zyTCAlFPjgYC` or
    /// `openlibrary:/works/OL893415W` through the catalog that issued it.
    ///
    /// Ids without a separator or with an unknown prefix resolve to `None`
    /// without any request.
    pub async fn lookup_by_id(&self, composite_id: &str) -> Option<UnifiedBook> {
        let (prefix, native_id) = split_composite_id(composite_id.trim())?;
        let Some(source) = BookSource::from_prefix(prefix) else {
            debug!(id = composite_id, "unrecognized source prefix");
            return None;
        };
        self.source_for(source)?.fetch_by_id(native_id).await
    }

    /// Resolve an ISBN, asking the primary catalog first and falling back to
    /// the secondary only when the primary has nothing.
    pub async fn lookup_by_isbn(&self, isbn: &str) -> Option<UnifiedBook> {
        let isbn = isbn.trim();
        if isbn.is_empty() {
            return None;
        }

        if let Some(book) = self.primary.fetch_by_isbn(isbn).await {
            return Some(book);
        }
        debug!(isbn, fallback = %self.secondary.source(), "primary catalog had no ISBN match");
        self.secondary.fetch_by_isbn(isbn).await
    }

    fn source_for(&self, source: BookSource) -> Option<&dyn CatalogSource> {
        [&self.primary, &self.secondary]
            .into_iter()
            .find(|catalog| catalog.source() == source)
            .map(|catalog| catalog.as_ref())
    }
}
