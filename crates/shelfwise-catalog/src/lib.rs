//! Shelfwise Catalog: Google Books and Open Library adapters plus multi-catalog reconciliation.

pub mod error;
pub mod http;
pub mod lookup;
pub mod reconcile;
pub mod sources;

pub use error::{CatalogError, Result};
pub use reconcile::{MAX_MERGED_RESULTS, MultiCatalog, PROVIDER_SEARCH_LIMIT, merge_candidates};
pub use sources::{CatalogSource, SourceStatus};
pub use sources::google_books::GoogleBooksSource;
pub use sources::openlibrary::OpenLibrarySource;
