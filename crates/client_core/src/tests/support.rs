//! Store doubles shared by the unit tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::{
    error::{StoreError, StoreResult},
    protocol::{ChangeEvent, CollectionPath, Document, DocumentPath, Fields, WriteMode, WriteOp},
};
use storage::{DocumentStore, Storage};
use tokio::sync::broadcast;

pub async fn memory_store() -> Arc<Storage> {
    Arc::new(Storage::new("sqlite::memory:").await.expect("in-memory store"))
}

/// Wraps a real store, counting writes and optionally failing every call.
pub struct RecordingStore {
    inner: Arc<Storage>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingStore {
    pub async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: memory_store().await,
            writes: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_from_now(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("store offline"));
        }
        Ok(())
    }

    fn record(&self) -> StoreResult<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        self.check()?;
        self.inner.get(path).await
    }

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>> {
        self.check()?;
        self.inner.list(collection).await
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, mode: WriteMode) -> StoreResult<()> {
        self.record()?;
        self.inner.set(path, fields, mode).await
    }

    async fn update(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        self.record()?;
        self.inner.update(path, fields).await
    }

    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<DocumentPath> {
        self.record()?;
        self.inner.add(collection, fields).await
    }

    async fn delete(&self, path: &DocumentPath) -> StoreResult<()> {
        self.record()?;
        self.inner.delete(path).await
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> StoreResult<()> {
        self.record()?;
        self.inner.commit(writes).await
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes()
    }
}
