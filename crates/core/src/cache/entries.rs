//! Prerender entry operations.
//!
//! Rows are keyed by canonical URL but the schema does not enforce
//! uniqueness. Every read therefore picks the newest row (largest id)
//! and every replace removes all older rows for the URL.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// Store-side clock. `updated` is never supplied by the caller.
const NOW_SECONDS: &str = "CAST(strftime('%s', 'now') AS INTEGER)";

/// A rendered page stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerenderEntry {
    pub id: i64,
    pub url: String,
    pub html: String,
    /// Unix timestamp (seconds) of the render that produced `html`.
    pub updated_at: i64,
}

impl PrerenderEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { id: row.get(0)?, url: row.get(1)?, updated_at: row.get(2)?, html: row.get(3)? })
    }
}

impl CacheDb {
    /// Look up the entry for `url`.
    ///
    /// Returns None on a miss. With duplicate rows the most recently
    /// inserted one is returned.
    pub async fn lookup(&self, url: &str) -> Result<Option<PrerenderEntry>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<PrerenderEntry>, Error> {
                let entry = conn
                    .query_row(
                        "SELECT id, url, CAST(updated AS INTEGER), html
                         FROM prerender WHERE url = ?1
                         ORDER BY id DESC LIMIT 1",
                        params![url],
                        PrerenderEntry::from_row,
                    )
                    .optional()?;
                Ok(entry)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert a freshly rendered page and return its id.
    pub async fn insert(&self, url: &str, html: &str) -> Result<i64, Error> {
        let url = url.to_string();
        let html = html.to_string();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    &format!("INSERT INTO prerender (url, updated, html) VALUES (?1, {NOW_SECONDS}, ?2)"),
                    params![url, html],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete an entry by id.
    ///
    /// Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM prerender WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Swap a stale entry for a new render in one transaction.
    ///
    /// Inserts the new row first, then removes `stale_id` along with any
    /// other rows for `url`. If anything fails the transaction rolls back
    /// and the previous entry stays servable.
    pub async fn replace(&self, stale_id: i64, url: &str, html: &str) -> Result<i64, Error> {
        let url = url.to_string();
        let html = html.to_string();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    &format!("INSERT INTO prerender (url, updated, html) VALUES (?1, {NOW_SECONDS}, ?2)"),
                    params![url, html],
                )?;
                let id = tx.last_insert_rowid();
                let removed = tx.execute(
                    "DELETE FROM prerender WHERE id <> ?1 AND (id = ?2 OR url = ?3)",
                    params![id, stale_id, url],
                )?;
                tx.commit()?;

                if removed > 1 {
                    tracing::debug!(url = %url, removed, "healed duplicate prerender rows");
                }
                Ok(id)
            })
            .await
            .map_err(Error::from)
    }

    /// Every row stored for `url`, oldest first.
    pub async fn entries(&self, url: &str) -> Result<Vec<PrerenderEntry>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<PrerenderEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, url, CAST(updated AS INTEGER), html
                     FROM prerender WHERE url = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt.query_map(params![url], PrerenderEntry::from_row)?;
                let entries = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}
