//! Error taxonomy surfaced to the view layer.

use shared::error::StoreError;
use thiserror::Error;

/// How the view should present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Blocking banner; nothing else can work.
    Bootstrap,
    /// Non-fatal banner; last-known data stays on screen.
    Subscription,
    /// Inline next to the control that started the operation.
    Mutation,
    /// Shown before any store call is made.
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("All fields required: {0} is empty.")]
    MissingField(&'static str),
    #[error("{0} must be ISO `YYYY-MM-DDTHH:MM`")]
    InvalidTimestamp(&'static str),
    #[error("startISO must not be after endISO")]
    StartAfterEnd,
    #[error("Session ID must not contain '/'")]
    InvalidSessionId,
    #[error("Invalid session: {0}")]
    InvalidImportRecord(String),
    #[error("Invalid file: {0}")]
    InvalidImportFile(String),
    #[error("Rating must be between 1 and 5")]
    RatingOutOfRange,
    #[error("No session selected")]
    NoSessionSelected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Sign-in failed: {0}")]
    SignIn(String),
    #[error("Schedule listener error: {0}")]
    ScheduleListener(StoreError),
    #[error("Failed to init profile: {0}")]
    ProfileInit(StoreError),
    #[error("Profile listener error: {0}")]
    ProfileListener(StoreError),
    #[error("Failed to update RSVP: {0}")]
    Rsvp(StoreError),
    #[error("Failed to submit feedback: {0}")]
    Feedback(StoreError),
    #[error("Failed to save session: {0}")]
    SaveSession(StoreError),
    #[error("Failed to delete session: {0}")]
    DeleteSession(StoreError),
    #[error("Failed to import sessions: {0}")]
    Import(StoreError),
    #[error("Failed to export sessions: {0}")]
    Export(String),
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Admin privilege required")]
    AdminRequired,
    #[error("Feedback submission already in flight")]
    SubmissionInFlight,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl HubError {
    pub fn class(&self) -> ErrorClass {
        match self {
            HubError::MissingSetting(_) | HubError::Configuration(_) | HubError::SignIn(_) => {
                ErrorClass::Bootstrap
            }
            HubError::ScheduleListener(_)
            | HubError::ProfileInit(_)
            | HubError::ProfileListener(_) => ErrorClass::Subscription,
            HubError::Rsvp(_)
            | HubError::Feedback(_)
            | HubError::SaveSession(_)
            | HubError::DeleteSession(_)
            | HubError::Import(_)
            | HubError::Export(_)
            | HubError::NotSignedIn
            | HubError::AdminRequired
            | HubError::SubmissionInFlight => ErrorClass::Mutation,
            HubError::Validation(_) => ErrorClass::Validation,
        }
    }
}
