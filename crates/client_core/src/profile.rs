//! Per-attendee profile holding the RSVP set.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{AttendeeProfile, DeploymentScope, SessionId, UserId},
    error::StoreResult,
    protocol::{DocumentPath, FieldValue, Fields, WriteMode},
};
use storage::DocumentStore;
use tracing::{debug, info, warn};

use crate::{
    error::HubError,
    subscription::{listen_document, Subscription},
};

pub const ATTENDING_FIELD: &str = "attendingSessions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsvpChange {
    Added,
    Removed,
}

#[derive(Clone)]
pub struct ProfileStore {
    store: Arc<dyn DocumentStore>,
    path: DocumentPath,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn DocumentStore>, scope: &DeploymentScope, user_id: &UserId) -> Self {
        Self {
            store,
            path: scope.profile_document(user_id),
        }
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Creates an empty profile when none exists. Returns whether a write was
    /// issued. The write is a merging union with nothing, so two racing first
    /// accesses, or a toggle from another device, cannot clobber each other.
    pub async fn ensure_profile(&self) -> StoreResult<bool> {
        if self.store.get(&self.path).await?.is_some() {
            return Ok(false);
        }
        let mut fields = Fields::new();
        fields.insert(ATTENDING_FIELD.into(), FieldValue::ArrayUnion(Vec::new()));
        self.store.set(&self.path, fields, WriteMode::Merge).await?;
        info!(path = %self.path, "created attendee profile");
        Ok(true)
    }

    /// Initializes the profile, then emits the RSVP set on every change.
    /// Initialization failures are reported as `ProfileInit`, listener
    /// failures as `ProfileListener`.
    pub fn subscribe<F>(&self, mut on_update: F) -> Subscription
    where
        F: FnMut(Result<Vec<SessionId>, HubError>) + Send + 'static,
    {
        let this = self.clone();
        Subscription::spawn("profile", async move {
            if let Err(err) = this.ensure_profile().await {
                warn!(path = %this.path, %err, "profile initialization failed");
                on_update(Err(HubError::ProfileInit(err)));
            }
            // Dropped together with this task when the outer handle is cancelled.
            let _listener = listen_document(
                Arc::clone(&this.store),
                this.path.clone(),
                move |snapshot| {
                    on_update(
                        snapshot
                            .map(|doc| {
                                doc.map(|doc| match doc.decode::<AttendeeProfile>() {
                                    Ok(profile) => profile.attending_sessions,
                                    Err(err) => {
                                        warn!(%err, "profile document is malformed");
                                        Vec::new()
                                    }
                                })
                                .unwrap_or_default()
                            })
                            .map_err(HubError::ProfileListener),
                    )
                },
            );
            std::future::pending::<()>().await;
        })
    }

    /// Adds or removes `session_id` with a store-side set operation.
    pub async fn toggle(
        &self,
        session_id: &SessionId,
        attending: &[SessionId],
    ) -> Result<RsvpChange, HubError> {
        let (change, fields) = rsvp_update(attending, session_id);
        self.store
            .update(&self.path, fields)
            .await
            .map_err(HubError::Rsvp)?;
        debug!(session_id = %session_id, ?change, "rsvp updated");
        Ok(change)
    }
}

/// The set mutation that flips `session_id` relative to `attending`.
pub fn rsvp_update(attending: &[SessionId], session_id: &SessionId) -> (RsvpChange, Fields) {
    let value = vec![Value::String(session_id.to_string())];
    let (change, field) = if attending.contains(session_id) {
        (RsvpChange::Removed, FieldValue::ArrayRemove(value))
    } else {
        (RsvpChange::Added, FieldValue::ArrayUnion(value))
    };
    let mut fields = Fields::new();
    fields.insert(ATTENDING_FIELD.into(), field);
    (change, fields)
}

#[cfg(test)]
#[path = "tests/profile_tests.rs"]
mod tests;
