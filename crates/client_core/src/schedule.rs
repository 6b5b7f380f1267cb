//! Public schedule: a sorted live view over the session collection.

use std::sync::Arc;

use shared::{
    domain::{DeploymentScope, Session, SessionFields, SessionId},
    error::StoreResult,
    protocol::Document,
};
use storage::DocumentStore;
use tracing::warn;

use crate::{
    error::HubError,
    subscription::{listen_collection, Subscription},
};

#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn DocumentStore>,
    scope: DeploymentScope,
}

impl SessionStore {
    pub fn new(store: Arc<dyn DocumentStore>, scope: DeploymentScope) -> Self {
        Self { store, scope }
    }

    /// Emits the whole schedule, ordered by start time, on every change. A
    /// failed listener is reported as `ScheduleListener`, never as an empty
    /// schedule.
    pub fn subscribe<F>(&self, mut on_update: F) -> Subscription
    where
        F: FnMut(Result<Vec<Session>, HubError>) + Send + 'static,
    {
        listen_collection(
            Arc::clone(&self.store),
            self.scope.schedule_collection(),
            move |snapshot: StoreResult<Vec<Document>>| {
                on_update(
                    snapshot
                        .map(decode_sessions)
                        .map_err(HubError::ScheduleListener),
                )
            },
        )
    }
}

pub fn decode_sessions(docs: Vec<Document>) -> Vec<Session> {
    let mut sessions: Vec<Session> = docs
        .into_iter()
        .filter_map(|doc| match doc.decode::<SessionFields>() {
            Ok(fields) => Some(Session::from_fields(SessionId::new(doc.id), fields)),
            Err(err) => {
                warn!(%err, "skipping undecodable session document");
                None
            }
        })
        .collect();
    sort_sessions(&mut sessions);
    sessions
}

/// Orders by start time. Timestamps are fixed-width and zero-padded, so the
/// string order is the chronological order.
pub fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| a.start_iso.cmp(&b.start_iso));
}

#[cfg(test)]
#[path = "tests/schedule_tests.rs"]
mod tests;
