//! SQLite-backed vector store using the `sqlite-vec` extension.
//!
//! Records live in a single `vectors` table with a namespace column and a
//! JSON metadata column; cosine distance is computed by `vec_distance_cosine`
//! at query time. Upsert uses `INSERT OR REPLACE`, so re-ingesting the same
//! chunk id overwrites rather than duplicates.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};

use crate::models::ChunkMetadata;
use crate::types::RagError;

use super::{MetadataFilter, ScoredRecord, VectorRecord, VectorStore};

#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
}

impl SqliteVectorStore {
    /// Opens (or creates) the store at `path` and prepares its schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::VectorStore(err.to_string()))?;
        Self::prepare_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// In-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| RagError::VectorStore(err.to_string()))?;
        Self::prepare_schema(&conn).await?;
        Ok(Self { conn })
    }

    async fn prepare_schema(conn: &Connection) -> Result<(), RagError> {
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS vectors (
                     id TEXT PRIMARY KEY,
                     namespace TEXT NOT NULL,
                     embedding TEXT NOT NULL,
                     metadata TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS vectors_namespace ON vectors(namespace);
                 CREATE TABLE IF NOT EXISTS index_config (
                     key TEXT PRIMARY KEY,
                     value TEXT NOT NULL
                 );",
            )
            .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::VectorStore(err.to_string()))
    }

    fn register_sqlite_vec() -> Result<(), RagError> {
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
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
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
            .map_err(RagError::VectorStore)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn ensure_ready(&self, dimensions: usize) -> Result<(), RagError> {
        let stored: Option<String> = self
            .conn
            .call(move |conn| {
                let existing = conn
                    .query_row(
                        "SELECT value FROM index_config WHERE key = 'dimensions'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                if existing.is_none() {
                    conn.execute(
                        "INSERT INTO index_config (key, value) VALUES ('dimensions', ?)",
                        [dimensions.to_string()],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                Ok(existing)
            })
            .await
            .map_err(|err| RagError::VectorStore(err.to_string()))?;

        match stored {
            Some(existing) if existing != dimensions.to_string() => Err(RagError::Config(format!(
                "index holds {existing}-dimensional vectors, requested {dimensions}"
            ))),
            _ => Ok(()),
        }
    }

    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), RagError> {
        if records.is_empty() {
            return Ok(());
        }
        let namespace = namespace.to_string();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let embedding = serde_json::to_string(&record.vector)
                .map_err(|err| RagError::VectorStore(err.to_string()))?;
            let metadata = serde_json::to_string(&record.metadata)
                .map_err(|err| RagError::VectorStore(err.to_string()))?;
            rows.push((record.id, embedding, metadata));
        }

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                {
                    let mut stmt = tx
                        .prepare(
                            "INSERT OR REPLACE INTO vectors (id, namespace, embedding, metadata) \
                             VALUES (?1, ?2, ?3, ?4)",
                        )
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    for (id, embedding, metadata) in &rows {
                        stmt.execute((id, &namespace, embedding, metadata))
                            .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::VectorStore(err.to_string()))
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, RagError> {
        let namespace = namespace.to_string();
        let query_json = serde_json::to_string(vector)
            .map_err(|err| RagError::VectorStore(err.to_string()))?;

        let mut sql = String::from(
            "SELECT id, metadata, \
             vec_distance_cosine(vec_f32(embedding), vec_f32(?1)) AS distance \
             FROM vectors WHERE namespace = ?2",
        );
        let mut params: Vec<String> = vec![query_json, namespace];
        if let Some(f) = filter {
            if let Some(class) = &f.class_level {
                params.push(class.clone());
                sql.push_str(&format!(
                    " AND json_extract(metadata, '$.class_level') = ?{}",
                    params.len()
                ));
            }
            if let Some(source) = &f.source_file {
                params.push(source.clone());
                sql.push_str(&format!(
                    " AND json_extract(metadata, '$.source_file') = ?{}",
                    params.len()
                ));
            }
        }
        sql.push_str(&format!(" ORDER BY distance ASC LIMIT {top_k}"));

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql).map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map(tokio_rusqlite::params_from_iter(params.iter()), |row| {
                        let id: String = row.get(0)?;
                        let metadata_json: String = row.get(1)?;
                        let distance: f32 = row.get(2)?;
                        Ok((id, metadata_json, distance))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    let (id, metadata_json, distance) =
                        row.map_err(tokio_rusqlite::Error::Rusqlite)?;
                    let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                        .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
                    results.push(ScoredRecord {
                        id,
                        score: 1.0 - distance,
                        metadata,
                    });
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::VectorStore(err.to_string()))
    }

    async fn count(&self, namespace: &str) -> Result<usize, RagError> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM vectors WHERE namespace = ?1",
                        [&namespace],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::VectorStore(err.to_string()))
    }
}
