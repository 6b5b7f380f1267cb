//! Admin privilege lookup: privilege is the existence of the marker document.

use std::sync::Arc;

use shared::domain::{DeploymentScope, UserId};
use storage::DocumentStore;
use tracing::warn;

use crate::subscription::{listen_document, Subscription};

#[derive(Clone)]
pub struct AdminFlag {
    store: Arc<dyn DocumentStore>,
    scope: DeploymentScope,
    user_id: UserId,
}

impl AdminFlag {
    pub fn new(store: Arc<dyn DocumentStore>, scope: DeploymentScope, user_id: UserId) -> Self {
        Self {
            store,
            scope,
            user_id,
        }
    }

    /// Emits `true` while the marker exists. A failed listener revokes the
    /// privilege rather than leaving a stale grant in place.
    pub fn subscribe<F>(&self, mut on_change: F) -> Subscription
    where
        F: FnMut(bool) + Send + 'static,
    {
        let user_id = self.user_id.clone();
        listen_document(
            Arc::clone(&self.store),
            self.scope.admin_marker(&self.user_id),
            move |snapshot| match snapshot {
                Ok(doc) => on_change(doc.is_some()),
                Err(err) => {
                    warn!(user_id = %user_id, %err, "admin marker listener failed");
                    on_change(false);
                }
            },
        )
    }
}
