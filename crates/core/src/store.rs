//! SQLite-backed catalog of resolved books, unique on (title, author).

use std::path::Path;

use rusqlite::{params, Connection};

use crate::book::BookRecord;
use crate::error::StoreError;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    UNIQUE (title, author)
)";

pub struct BookStore {
    conn: Connection,
}

impl BookStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Location {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert unless an identical (title, author) pair exists. Returns whether
    /// a row was added; `false` means the record was already present.
    pub fn insert(&self, title: &str, author: &str) -> Result<bool, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::InvalidRecord { field: "title" });
        }
        if author.trim().is_empty() {
            return Err(StoreError::InvalidRecord { field: "author" });
        }
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO books (title, author) VALUES (?1, ?2)",
            params![title, author],
        )?;
        Ok(changed == 1)
    }

    /// All records in insertion order.
    pub fn get_all(&self) -> Result<Vec<BookRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, author FROM books ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(BookRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                author: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Drop every record and recreate the empty schema. Ids restart at 1.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch("DROP TABLE IF EXISTS books")?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;
        tracing::info!("Book store reset");
        Ok(())
    }

    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Database(e))
    }
}
