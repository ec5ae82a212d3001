use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use shelfwise_core::{BookSource, UnifiedBook};

use crate::sources::{CatalogSource, SourceStatus};

/// In-process catalog returning canned records and counting every call.
pub(crate) struct FakeSource {
    source: BookSource,
    books: Vec<UnifiedBook>,
    by_isbn: Option<UnifiedBook>,
    pub calls: AtomicUsize,
    pub limits: Mutex<Vec<usize>>,
}

impl FakeSource {
    pub fn new(source: BookSource, books: Vec<UnifiedBook>) -> Self {
        Self {
            source,
            books,
            by_isbn: None,
            calls: AtomicUsize::new(0),
            limits: Mutex::new(Vec::new()),
        }
    }

    pub fn with_isbn_hit(mut self, book: UnifiedBook) -> Self {
        self.by_isbn = Some(book);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for FakeSource {
    fn source(&self) -> BookSource {
        self.source
    }

    /// Returns every canned record regardless of `limit`, so callers' own bounds are observable.
    async fn search(&self, _query: &str, limit: usize) -> Vec<UnifiedBook> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.limits.lock().unwrap().push(limit);
        self.books.clone()
    }

    async fn fetch_by_id(&self, native_id: &str) -> Option<UnifiedBook> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.books
            .iter()
            .find(|b| b.native_id() == native_id)
            .cloned()
    }

    async fn fetch_by_isbn(&self, _isbn: &str) -> Option<UnifiedBook> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.by_isbn.clone()
    }

    async fn health_check(&self) -> SourceStatus {
        SourceStatus {
            source: self.source,
            available: true,
            latency_ms: Some(0),
            last_checked: Utc::now(),
        }
    }
}

pub(crate) fn book(source: BookSource, native_id: &str, title: &str, author: &str) -> UnifiedBook {
    UnifiedBook::new(source, native_id, title).with_authors(vec![author.to_string()])
}
