//! Long-lived listeners over the document store's change feed.

use std::{future::Future, sync::Arc};

use shared::{
    error::{StoreError, StoreResult},
    protocol::{ChangeEvent, CollectionPath, Document, DocumentPath},
};
use storage::DocumentStore;
use tokio::task::JoinHandle;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{debug, warn};

/// Handle to a running listener. Cancelling (or dropping) the handle stops
/// the listener before it can deliver another snapshot.
pub struct Subscription {
    name: &'static str,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn spawn<F>(name: &'static str, listener: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(subscription = name, "starting listener");
        Self {
            name,
            task: Some(tokio::spawn(listener)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(subscription = self.name, "listener cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Delivers the full collection now and again after every change to it.
/// Terminates after delivering the first error.
pub fn listen_collection<F>(
    store: Arc<dyn DocumentStore>,
    collection: CollectionPath,
    mut on_snapshot: F,
) -> Subscription
where
    F: FnMut(StoreResult<Vec<Document>>) + Send + 'static,
{
    // Subscribe before the first read so no write can slip in between.
    let mut changes = BroadcastStream::new(store.changes());
    Subscription::spawn("collection", async move {
        loop {
            match store.list(&collection).await {
                Ok(docs) => on_snapshot(Ok(docs)),
                Err(err) => {
                    warn!(%collection, %err, "collection read failed");
                    on_snapshot(Err(err));
                    return;
                }
            }
            if let Err(err) =
                next_change(&mut changes, |event| event.path.collection() == &collection).await
            {
                on_snapshot(Err(err));
                return;
            }
        }
    })
}

/// Delivers the document (or its absence) now and again after every change
/// to it. Terminates after delivering the first error.
pub fn listen_document<F>(
    store: Arc<dyn DocumentStore>,
    path: DocumentPath,
    mut on_snapshot: F,
) -> Subscription
where
    F: FnMut(StoreResult<Option<Document>>) + Send + 'static,
{
    let mut changes = BroadcastStream::new(store.changes());
    Subscription::spawn("document", async move {
        loop {
            match store.get(&path).await {
                Ok(doc) => on_snapshot(Ok(doc)),
                Err(err) => {
                    warn!(%path, %err, "document read failed");
                    on_snapshot(Err(err));
                    return;
                }
            }
            if let Err(err) = next_change(&mut changes, |event| event.path == path).await {
                on_snapshot(Err(err));
                return;
            }
        }
    })
}

async fn next_change<P>(
    changes: &mut BroadcastStream<ChangeEvent>,
    matches: P,
) -> StoreResult<()>
where
    P: Fn(&ChangeEvent) -> bool,
{
    while let Some(item) = changes.next().await {
        match item {
            Ok(event) if matches(&event) => return Ok(()),
            Ok(_) => {}
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(skipped, "change feed lagged; re-reading");
                return Ok(());
            }
        }
    }
    Err(StoreError::unavailable("change feed closed"))
}

#[cfg(test)]
#[path = "tests/subscription_tests.rs"]
mod tests;
