//! Append-only per-attendee feedback records.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{DeploymentScope, SessionId, UserId},
    protocol::{CollectionPath, DocumentPath, FieldValue, Fields},
};
use storage::DocumentStore;
use tracing::info;

use crate::error::{HubError, ValidationError};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFeedback {
    pub session_id: SessionId,
    pub rating: u8,
    pub comment: String,
}

/// Local checks run before any store call. `rating == 0` means "not chosen".
pub fn validate_feedback(
    session_id: Option<&SessionId>,
    rating: u8,
    comment: &str,
) -> Result<ValidFeedback, ValidationError> {
    let session_id = session_id
        .filter(|id| !id.as_str().trim().is_empty())
        .ok_or(ValidationError::NoSessionSelected)?;
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ValidationError::RatingOutOfRange);
    }
    Ok(ValidFeedback {
        session_id: session_id.clone(),
        rating,
        comment: comment.trim().to_string(),
    })
}

impl ValidFeedback {
    /// Creation time is always left to the store's clock.
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            "sessionId".into(),
            FieldValue::string(self.session_id.to_string()),
        );
        fields.insert(
            "rating".into(),
            FieldValue::Value(Value::from(self.rating)),
        );
        fields.insert("comment".into(), FieldValue::string(self.comment));
        fields.insert("createdAt".into(), FieldValue::ServerTimestamp);
        fields
    }
}

#[derive(Clone)]
pub struct FeedbackSink {
    store: Arc<dyn DocumentStore>,
    collection: CollectionPath,
}

impl FeedbackSink {
    pub fn new(store: Arc<dyn DocumentStore>, scope: &DeploymentScope, user_id: &UserId) -> Self {
        Self {
            store,
            collection: scope.feedback_collection(user_id),
        }
    }

    pub async fn submit(
        &self,
        session_id: Option<&SessionId>,
        rating: u8,
        comment: &str,
    ) -> Result<DocumentPath, HubError> {
        let feedback = validate_feedback(session_id, rating, comment)?;
        let session_id = feedback.session_id.clone();
        let path = self
            .store
            .add(&self.collection, feedback.into_fields())
            .await
            .map_err(HubError::Feedback)?;
        info!(session_id = %session_id, rating, record = %path, "feedback submitted");
        Ok(path)
    }
}

#[cfg(test)]
#[path = "tests/feedback_tests.rs"]
mod tests;
