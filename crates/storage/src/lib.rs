use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use shared::{
    error::{StoreError, StoreResult},
    protocol::{
        ChangeEvent, ChangeKind, CollectionPath, Document, DocumentPath, Fields, WriteMode,
        WriteOp,
    },
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::sync::{broadcast, Mutex};

pub mod transform;

use transform::{apply_fields, server_timestamp};

const CHANGE_FEED_CAPACITY: usize = 256;
const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// Realtime document store as seen by the client: keyed documents grouped in
/// collections, field transforms resolved store-side, and a change feed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>>;
    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>>;
    async fn set(&self, path: &DocumentPath, fields: Fields, mode: WriteMode) -> StoreResult<()>;
    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()>;
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<DocumentPath>;
    async fn delete(&self, path: &DocumentPath) -> StoreResult<()>;
    /// Applies every write or none of them.
    async fn commit(&self, writes: Vec<WriteOp>) -> StoreResult<()>;
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    write_lock: Arc<Mutex<()>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?
            .create_if_missing(true);
        // Every connection to an in-memory database is a separate database.
        let pool_options = if database_url.starts_with(MEMORY_DATABASE_URL) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run document store migrations")?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            changes,
        })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn apply_write(
        tx: &mut Transaction<'_, Sqlite>,
        op: &WriteOp,
        now: &str,
    ) -> StoreResult<ChangeEvent> {
        let path = op.path();
        validate_document_id(path)?;

        let body = match op {
            WriteOp::Delete { .. } => {
                sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
                    .bind(path.collection().as_str())
                    .bind(path.id())
                    .execute(&mut **tx)
                    .await
                    .map_err(store_error)?;
                return Ok(ChangeEvent {
                    path: path.clone(),
                    kind: ChangeKind::Deleted,
                });
            }
            WriteOp::Set { fields, mode, .. } => {
                let existing = match mode {
                    WriteMode::Overwrite => None,
                    WriteMode::Merge => read_body(tx, path).await?,
                };
                apply_fields(existing, fields, *mode, now)
            }
            WriteOp::Update { fields, .. } => {
                let existing = read_body(tx, path)
                    .await?
                    .ok_or_else(|| StoreError::not_found(format!("no document at {path}")))?;
                apply_fields(Some(existing), fields, WriteMode::Merge, now)
            }
        };

        let data = serde_json::to_string(&body)
            .map_err(|err| StoreError::internal(format!("failed to encode {path}: {err}")))?;
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, data) VALUES (?, ?, ?)
             ON CONFLICT(collection, doc_id) DO UPDATE SET data=excluded.data, updated_at=CURRENT_TIMESTAMP",
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(data)
        .execute(&mut **tx)
        .await
        .map_err(store_error)?;

        Ok(ChangeEvent {
            path: path.clone(),
            kind: ChangeKind::Written,
        })
    }
}

#[async_trait]
impl DocumentStore for Storage {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(path.collection().as_str())
            .bind(path.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(|r| {
            Ok(Document {
                id: path.id().to_string(),
                data: decode_body(path.id(), &r.get::<String, _>(0))?,
            })
        })
        .transpose()
    }

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query("SELECT doc_id, data FROM documents WHERE collection = ? ORDER BY doc_id")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        rows.into_iter()
            .map(|r| {
                let id = r.get::<String, _>(0);
                let data = decode_body(&id, &r.get::<String, _>(1))?;
                Ok(Document { id, data })
            })
            .collect()
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, mode: WriteMode) -> StoreResult<()> {
        self.commit(vec![WriteOp::Set {
            path: path.clone(),
            fields,
            mode,
        }])
        .await
    }

    async fn update(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        self.commit(vec![WriteOp::Update {
            path: path.clone(),
            fields,
        }])
        .await
    }

    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<DocumentPath> {
        let path = collection.doc(uuid::Uuid::new_v4().simple().to_string());
        self.set(&path, fields, WriteMode::Overwrite).await?;
        Ok(path)
    }

    async fn delete(&self, path: &DocumentPath) -> StoreResult<()> {
        self.commit(vec![WriteOp::Delete { path: path.clone() }])
            .await
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> StoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let now = server_timestamp(Utc::now());
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let mut events = Vec::with_capacity(writes.len());
        for op in &writes {
            events.push(Self::apply_write(&mut tx, op, &now).await?);
        }
        tx.commit().await.map_err(store_error)?;

        for event in events {
            let _ = self.changes.send(event);
        }
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

async fn read_body(
    tx: &mut Transaction<'_, Sqlite>,
    path: &DocumentPath,
) -> StoreResult<Option<Map<String, Value>>> {
    let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND doc_id = ?")
        .bind(path.collection().as_str())
        .bind(path.id())
        .fetch_optional(&mut **tx)
        .await
        .map_err(store_error)?;
    row.map(|r| decode_body(path.id(), &r.get::<String, _>(0)))
        .transpose()
}

fn decode_body(id: &str, raw: &str) -> StoreResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::internal(format!(
            "stored document {id} is not an object"
        ))),
        Err(err) => Err(StoreError::internal(format!(
            "stored document {id} is not valid json: {err}"
        ))),
    }
}

fn validate_document_id(path: &DocumentPath) -> StoreResult<()> {
    let id = path.id();
    if id.trim().is_empty() || id.contains('/') {
        return Err(StoreError::invalid_argument(format!(
            "invalid document id '{id}' in {}",
            path.collection()
        )));
    }
    Ok(())
}

fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::unavailable(err.to_string())
        }
        other => StoreError::internal(other.to_string()),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(MEMORY_DATABASE_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
