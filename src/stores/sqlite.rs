//! sqlite-vec backed store.
//!
//! Layout: a `passages` table carries id, heading, metadata, and content;
//! a `passages_vec` virtual table (`vec0`) carries the embedding under the
//! same rowid. Similarity queries order by `vec_distance_cosine` ascending
//! and report `1.0 - distance` as cosine similarity.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_rusqlite::{Connection, ffi};

use super::{Candidate, PassageRecord, StoreError, VectorStore};
use crate::passage::Passage;
use crate::types::{ConfigError, PipelineError};

/// Persistent [`VectorStore`] on sqlite + sqlite-vec.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
    dimensions: usize,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a store at `path` for vectors of the given width.
    ///
    /// The sqlite-vec extension is registered process-wide on first use;
    /// the `vec0` table is created with a fixed dimension, so reopening an
    /// existing store with a different width fails at the first insert.
    pub async fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self, PipelineError> {
        if dimensions == 0 {
            return Err(ConfigError::ZeroDimensions.into());
        }
        register_sqlite_vec()?;

        let conn = Connection::open(path)
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))?;

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS passages (
                 id TEXT PRIMARY KEY,
                 heading TEXT,
                 metadata TEXT NOT NULL,
                 content TEXT NOT NULL
             );
             CREATE VIRTUAL TABLE IF NOT EXISTS passages_vec
                 USING vec0(embedding float[{dimensions}]);"
        );
        conn.call(move |conn| {
            // extension sanity probe before any DDL touches vec0
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(&ddl)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| StoreError::Storage(err.to_string()))?;

        Ok(Self { conn, dimensions })
    }

    /// Fixed embedding width of this store.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Register the sqlite-vec extension for every connection opened after this
/// call. sqlite's auto-extension list is process-global, so this runs once.
fn register_sqlite_vec() -> Result<(), StoreError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(StoreError::Storage)
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add(&self, records: Vec<PassageRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in &records {
            if record.embedding.len() != self.dimensions {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: record.embedding.len(),
                });
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let metadata_json = Value::Object(record.passage.metadata.clone()).to_string();
            let embedding_json = serde_json::to_string(&record.embedding)
                .map_err(|err| StoreError::Storage(err.to_string()))?;
            rows.push((
                record.id,
                record.passage.heading(),
                metadata_json,
                record.passage.text,
                embedding_json,
            ));
        }

        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                for (id, heading, metadata, content, embedding) in &rows {
                    tx.execute(
                        "INSERT INTO passages (id, heading, metadata, content)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(id) DO UPDATE SET
                             heading = excluded.heading,
                             metadata = excluded.metadata,
                             content = excluded.content",
                        (id, heading, metadata, content),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                    let rowid: i64 = tx
                        .query_row("SELECT rowid FROM passages WHERE id = ?1", [id], |row| {
                            row.get(0)
                        })
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;

                    // vec0 tables take delete-then-insert in place of upsert
                    tx.execute("DELETE FROM passages_vec WHERE rowid = ?1", [rowid])
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    tx.execute(
                        "INSERT INTO passages_vec (rowid, embedding) VALUES (?1, vec_f32(?2))",
                        (rowid, embedding),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))
    }

    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError> {
        if embedding.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        let embedding_json = serde_json::to_string(embedding)
            .map_err(|err| StoreError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT p.metadata, p.content, \
                         vec_distance_cosine(v.embedding, vec_f32(?1)) AS distance \
                         FROM passages p \
                         JOIN passages_vec v ON v.rowid = p.rowid \
                         ORDER BY distance ASC \
                         LIMIT {k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let metadata: Map<String, Value> = row
                            .get::<_, String>(0)
                            .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                            .unwrap_or_default();
                        let text: String = row.get(1)?;
                        let distance: f32 = row.get(2)?;
                        Ok(Candidate {
                            passage: Passage { text, metadata },
                            similarity: 1.0 - distance,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut candidates = Vec::new();
                for row in rows {
                    candidates.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(candidates)
            })
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))
    }
}
