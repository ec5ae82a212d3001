use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::Result;
use crate::record::BookRecord;

/// SQLite table of catalog records, written by idempotent upserts keyed by `id`.
/// Rows are never expired or evicted.
pub struct BookStore {
    conn: Connection,
}

impl BookStore {
    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS books (
                id             TEXT PRIMARY KEY,
                title          TEXT NOT NULL,
                authors        TEXT NOT NULL DEFAULT '[]',
                description    TEXT,
                cover_url      TEXT,
                published_date TEXT,
                page_count     INTEGER,
                categories     TEXT,
                isbn_10        TEXT,
                isbn_13        TEXT,
                publisher      TEXT,
                language       TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_books_isbn_13 ON books(isbn_13);
            ",
        )?;
        Ok(())
    }

    /// Insert the record, or overwrite every column of the existing row with the same id.
    pub fn upsert(&self, record: &BookRecord) -> Result<()> {
        upsert_on(&self.conn, record)
    }

    /// Upsert a batch inside one transaction. Returns the number of records written.
    pub fn upsert_all(&mut self, records: &[BookRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for record in records {
            upsert_on(&tx, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub fn get(&self, id: &str) -> Result<Option<BookRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, authors, description, cover_url, published_date,
                        page_count, categories, isbn_10, isbn_13, publisher, language
                 FROM books WHERE id = ?1",
                params![id],
                |row| {
                    Ok(RawRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        authors: row.get(2)?,
                        description: row.get(3)?,
                        cover_url: row.get(4)?,
                        published_date: row.get(5)?,
                        page_count: row.get(6)?,
                        categories: row.get(7)?,
                        isbn_10: row.get(8)?,
                        isbn_13: row.get(9)?,
                        publisher: row.get(10)?,
                        language: row.get(11)?,
                    })
                },
            )
            .optional()?;

        row.map(RawRow::into_record).transpose()
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn upsert_on(conn: &Connection, record: &BookRecord) -> Result<()> {
    let authors = serde_json::to_string(&record.authors)?;
    let categories = record
        .categories
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO books (
            id, title, authors, description, cover_url, published_date,
            page_count, categories, isbn_10, isbn_13, publisher, language
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
            title          = excluded.title,
            authors        = excluded.authors,
            description    = excluded.description,
            cover_url      = excluded.cover_url,
            published_date = excluded.published_date,
            page_count     = excluded.page_count,
            categories     = excluded.categories,
            isbn_10        = excluded.isbn_10,
            isbn_13        = excluded.isbn_13,
            publisher      = excluded.publisher,
            language       = excluded.language",
        params![
            record.id,
            record.title,
            authors,
            record.description,
            record.cover_url,
            record.published_date,
            record.page_count,
            categories,
            record.isbn_10,
            record.isbn_13,
            record.publisher,
            record.language,
        ],
    )?;
    debug!(id = %record.id, "upserted book record");
    Ok(())
}

struct RawRow {
    id: String,
    title: String,
    authors: String,
    description: Option<String>,
    cover_url: Option<String>,
    published_date: Option<String>,
    page_count: Option<u32>,
    categories: Option<String>,
    isbn_10: Option<String>,
    isbn_13: Option<String>,
    publisher: Option<String>,
    language: Option<String>,
}

impl RawRow {
    fn into_record(self) -> Result<BookRecord> {
        Ok(BookRecord {
            id: self.id,
            title: self.title,
            authors: serde_json::from_str(&self.authors)?,
            description: self.description,
            cover_url: self.cover_url,
            published_date: self.published_date,
            page_count: self.page_count,
            categories: self
                .categories
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            isbn_10: self.isbn_10,
            isbn_13: self.isbn_13,
            publisher: self.publisher,
            language: self.language,
        })
    }
}
