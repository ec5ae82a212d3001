use serde::{Deserialize, Serialize};

use crate::book::UnifiedBook;

/// Flat, storage-facing view of a [`UnifiedBook`], keyed by `id`.
///
/// Field names follow the snake_case column convention of the `books` table.
/// Unreported values serialize as explicit `null` rather than being omitted,
/// so an upsert always overwrites every column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<u32>,
    pub categories: Option<Vec<String>>,
    pub isbn_10: Option<String>,
    pub isbn_13: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
}

impl From<&UnifiedBook> for BookRecord {
    fn from(book: &UnifiedBook) -> Self {
        Self {
            id: book.id().to_string(),
            title: book.title.clone(),
            authors: book.authors.clone(),
            description: book.description.clone(),
            cover_url: book.cover_url.clone(),
            published_date: book.published_date.clone(),
            page_count: book.page_count,
            categories: book.categories.clone(),
            isbn_10: book.isbn10.clone(),
            isbn_13: book.isbn13.clone(),
            publisher: book.publisher.clone(),
            language: book.language.clone(),
        }
    }
}
