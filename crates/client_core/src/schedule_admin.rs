//! Schedule management for admins: form validation, CRUD, seed, import and
//! export.
//!
//! Every write here is a full-document overwrite keyed by the session id; the
//! form (or import file) is the single source of truth for a session.

use std::sync::{Arc, LazyLock};

use chrono::NaiveDateTime;
use futures::future::try_join_all;
use regex::Regex;
use serde_json::Value;
use shared::{
    domain::{DeploymentScope, Session, SessionId},
    error::StoreResult,
    protocol::{literal_fields, DocumentPath, Fields, WriteMode, WriteOp},
};
use storage::DocumentStore;
use tracing::info;

use crate::error::{HubError, ValidationError};

static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}(:[0-9]{2})?$")
        .expect("ISO_DATETIME: invalid regex pattern")
});

const MISSING_ID_LABEL: &str = "(missing id)";

pub fn parse_iso(value: &str) -> Option<NaiveDateTime> {
    if !ISO_DATETIME.is_match(value) {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// `YYYY-MM-DDTHH:MM` with optional `:SS`, naming a real date-time.
pub fn is_iso_ok(value: &str) -> bool {
    parse_iso(value).is_some()
}

/// Collects interactive answers the admin operations depend on.
pub trait Prompter: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
    fn prompt(&self, message: &str, default: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionForm {
    pub is_new: bool,
    pub id: String,
    pub title: String,
    pub room: String,
    pub speaker: String,
    pub start_iso: String,
    pub end_iso: String,
    pub summary: String,
}

impl SessionForm {
    pub fn blank() -> Self {
        Self {
            is_new: true,
            ..Self::default()
        }
    }

    pub fn edit(session: &Session) -> Self {
        Self {
            is_new: false,
            id: session.id.to_string(),
            title: session.title.clone(),
            room: session.room.clone(),
            speaker: session.speaker.clone(),
            start_iso: session.start_iso.clone(),
            end_iso: session.end_iso.clone(),
            summary: session.summary.clone(),
        }
    }

    /// The id is only editable while creating.
    pub fn set_id(&mut self, id: impl Into<String>) -> bool {
        if !self.is_new {
            return false;
        }
        self.id = id.into();
        true
    }

    pub fn validate(&self) -> Result<Session, ValidationError> {
        let required = [
            ("id", &self.id),
            ("title", &self.title),
            ("room", &self.room),
            ("speaker", &self.speaker),
            ("startISO", &self.start_iso),
            ("endISO", &self.end_iso),
            ("summary", &self.summary),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ValidationError::MissingField(*name));
        }

        let session = Session {
            id: SessionId::new(self.id.trim()),
            title: self.title.clone(),
            room: self.room.clone(),
            speaker: self.speaker.clone(),
            start_iso: self.start_iso.trim().to_string(),
            end_iso: self.end_iso.trim().to_string(),
            summary: self.summary.clone(),
        };
        validate_session(&session)?;
        Ok(session)
    }
}

/// Timestamp shape, chronological order and key shape of a complete session.
pub fn validate_session(session: &Session) -> Result<(), ValidationError> {
    let start = parse_iso(&session.start_iso).ok_or(ValidationError::InvalidTimestamp("startISO"))?;
    let end = parse_iso(&session.end_iso).ok_or(ValidationError::InvalidTimestamp("endISO"))?;
    if start > end {
        return Err(ValidationError::StartAfterEnd);
    }
    if session.id.as_str().contains('/') {
        return Err(ValidationError::InvalidSessionId);
    }
    Ok(())
}

/// Parses an import file. Any invalid element rejects the whole file and
/// names the element's id.
pub fn parse_import(text: &str) -> Result<Vec<Session>, ValidationError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| ValidationError::InvalidImportFile(err.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ValidationError::InvalidImportFile(
            "expected a JSON array of sessions".into(),
        ));
    };
    items.iter().map(import_record).collect()
}

fn import_record(item: &Value) -> Result<Session, ValidationError> {
    let field = |name: &str| {
        item.get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    };
    let id = field("id");
    let label = id.clone().unwrap_or_else(|| MISSING_ID_LABEL.to_string());
    let invalid = || ValidationError::InvalidImportRecord(label.clone());

    let session = Session {
        id: SessionId::new(id.ok_or_else(invalid)?),
        title: field("title").ok_or_else(invalid)?,
        room: field("room").ok_or_else(invalid)?,
        speaker: field("speaker").ok_or_else(invalid)?,
        start_iso: field("startISO").ok_or_else(invalid)?,
        end_iso: field("endISO").ok_or_else(invalid)?,
        summary: field("summary").ok_or_else(invalid)?,
    };
    validate_session(&session).map_err(|_| invalid())?;
    Ok(session)
}

pub fn export_filename(scope: &DeploymentScope) -> String {
    format!("schedule-{scope}.json")
}

pub fn export_json(sessions: &[Session]) -> Result<String, HubError> {
    serde_json::to_string_pretty(sessions).map_err(|err| HubError::Export(err.to_string()))
}

pub fn seed_sessions() -> Vec<Session> {
    const SEED: [[&str; 7]; 3] = [
        [
            "s-101",
            "Opening Keynote: The Future of Serverless",
            "Main Hall A",
            "Dr. Jamie Rhodes",
            "2025-11-15T09:00:00",
            "2025-11-15T10:00:00",
            "A pragmatic look at serverless adoption, pitfalls, and patterns for 2026.",
        ],
        [
            "s-102",
            "Realtime UX with Document Stores",
            "Room 204",
            "Amina Patel",
            "2025-11-15T10:15:00",
            "2025-11-15T11:00:00",
            "Designing low-latency experiences and scaling live data.",
        ],
        [
            "s-103",
            "Reactive State at Scale",
            "Room 210",
            "Leo K.",
            "2025-11-15T11:15:00",
            "2025-11-15T12:00:00",
            "Patterns, perf tips, and pitfalls when your listener count explodes.",
        ],
    ];

    SEED.iter()
        .map(|[id, title, room, speaker, start, end, summary]| Session {
            id: SessionId::new(*id),
            title: title.to_string(),
            room: room.to_string(),
            speaker: speaker.to_string(),
            start_iso: start.to_string(),
            end_iso: end.to_string(),
            summary: summary.to_string(),
        })
        .collect()
}

#[derive(Clone)]
pub struct ScheduleAdmin {
    store: Arc<dyn DocumentStore>,
    scope: DeploymentScope,
}

impl ScheduleAdmin {
    pub fn new(store: Arc<dyn DocumentStore>, scope: DeploymentScope) -> Self {
        Self { store, scope }
    }

    fn document(&self, session: &Session) -> StoreResult<(DocumentPath, Fields)> {
        Ok((
            self.scope.session_document(&session.id),
            literal_fields(&session.fields())?,
        ))
    }

    fn overwrite(&self, session: &Session) -> StoreResult<WriteOp> {
        let (path, fields) = self.document(session)?;
        Ok(WriteOp::Set {
            path,
            fields,
            mode: WriteMode::Overwrite,
        })
    }

    async fn write_session(&self, session: &Session) -> StoreResult<()> {
        let (path, fields) = self.document(session)?;
        self.store.set(&path, fields, WriteMode::Overwrite).await
    }

    /// Creates or replaces the session described by `form`.
    pub async fn save(&self, form: &SessionForm) -> Result<Session, HubError> {
        let session = form.validate()?;
        self.write_session(&session)
            .await
            .map_err(HubError::SaveSession)?;
        info!(session_id = %session.id, created = form.is_new, "session saved");
        Ok(session)
    }

    /// Returns `false` when the admin declines the confirmation.
    pub async fn delete(
        &self,
        session_id: &SessionId,
        prompter: &dyn Prompter,
    ) -> Result<bool, HubError> {
        if !prompter.confirm("Delete this session?") {
            return Ok(false);
        }
        self.store
            .delete(&self.scope.session_document(session_id))
            .await
            .map_err(HubError::DeleteSession)?;
        info!(session_id = %session_id, "session deleted");
        Ok(true)
    }

    /// Copies every field of `source` to a new id entered by the admin.
    /// Returns `None` when no id is entered.
    pub async fn duplicate(
        &self,
        source: &Session,
        prompter: &dyn Prompter,
    ) -> Result<Option<Session>, HubError> {
        let default_id = format!("{}-copy", source.id);
        let Some(new_id) = prompter
            .prompt("New session ID:", &default_id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };

        let copy = Session {
            id: SessionId::new(new_id),
            ..source.clone()
        };
        self.write_session(&copy)
            .await
            .map_err(HubError::SaveSession)?;
        info!(source = %source.id, session_id = %copy.id, "session duplicated");
        Ok(Some(copy))
    }

    /// Overwrites the fixed example sessions; re-seeding yields the same
    /// documents.
    pub async fn seed(&self) -> Result<usize, HubError> {
        let sessions = seed_sessions();
        try_join_all(sessions.iter().map(|session| self.write_session(session)))
            .await
            .map_err(HubError::SaveSession)?;
        info!(count = sessions.len(), "seeded example sessions");
        Ok(sessions.len())
    }

    /// Validates the whole file before writing anything, then writes every
    /// session in a single batch.
    pub async fn import(&self, text: &str) -> Result<usize, HubError> {
        let sessions = parse_import(text)?;
        let writes = sessions
            .iter()
            .map(|session| self.overwrite(session))
            .collect::<StoreResult<Vec<_>>>()
            .map_err(HubError::Import)?;
        self.store.commit(writes).await.map_err(HubError::Import)?;
        info!(count = sessions.len(), "imported sessions");
        Ok(sessions.len())
    }
}

#[cfg(test)]
#[path = "tests/schedule_admin_tests.rs"]
mod tests;
