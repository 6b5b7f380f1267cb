use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(SessionId);
id_newtype!(DeploymentScope);

/// Stored body of a schedule document. The id is the document key and is
/// not repeated inside the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub speaker: String,
    #[serde(rename = "startISO", default)]
    pub start_iso: String,
    #[serde(rename = "endISO", default)]
    pub end_iso: String,
    #[serde(default)]
    pub summary: String,
}

/// A schedule entry as shown to attendees and as written to export files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub room: String,
    pub speaker: String,
    #[serde(rename = "startISO")]
    pub start_iso: String,
    #[serde(rename = "endISO")]
    pub end_iso: String,
    pub summary: String,
}

impl Session {
    pub fn from_fields(id: SessionId, fields: SessionFields) -> Self {
        Self {
            id,
            title: fields.title,
            room: fields.room,
            speaker: fields.speaker,
            start_iso: fields.start_iso,
            end_iso: fields.end_iso,
            summary: fields.summary,
        }
    }

    pub fn fields(&self) -> SessionFields {
        SessionFields {
            title: self.title.clone(),
            room: self.room.clone(),
            speaker: self.speaker.clone(),
            start_iso: self.start_iso.clone(),
            end_iso: self.end_iso.clone(),
            summary: self.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeProfile {
    #[serde(rename = "attendingSessions", default)]
    pub attending_sessions: Vec<SessionId>,
}

impl AttendeeProfile {
    pub fn is_attending(&self, session_id: &SessionId) -> bool {
        self.attending_sessions.contains(session_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub session_id: SessionId,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Schedule,
    Reflection,
    Info,
    Admin,
}

impl View {
    pub const ATTENDEE_TABS: [View; 3] = [View::Schedule, View::Reflection, View::Info];

    pub fn label(self) -> &'static str {
        match self {
            View::Schedule => "Schedule",
            View::Reflection => "Reflection",
            View::Info => "Info",
            View::Admin => "Admin",
        }
    }

    pub fn requires_admin(self) -> bool {
        matches!(self, View::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Attendee,
}

impl Role {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            Role::Admin
        } else {
            Role::Attendee
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Attendee => "attendee",
        }
    }
}
