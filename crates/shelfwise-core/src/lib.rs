pub mod book;
pub mod config;
pub mod error;
pub mod record;
pub mod storage;

pub use book::{BookSource, UNKNOWN_AUTHOR, UnifiedBook, split_composite_id};
pub use config::{AppConfig, CatalogConfig, StorageConfig};
pub use error::{CoreError, Result};
pub use record::BookRecord;
pub use storage::BookStore;
