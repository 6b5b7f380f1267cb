use std::{collections::BTreeMap, fmt};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{DeploymentScope, SessionId, UserId},
    error::{StoreError, StoreResult},
};

const SCHEDULE_COLLECTION: &str = "conference_schedule";
const USER_DATA_COLLECTION: &str = "conference_data";
const PROFILE_DOCUMENT: &str = "user_profile";
const FEEDBACK_COLLECTION: &str = "session_feedback";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.into(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl DeploymentScope {
    fn root(&self) -> String {
        format!("artifacts/{}", self.0)
    }

    pub fn schedule_collection(&self) -> CollectionPath {
        CollectionPath::new(format!("{}/public/data/{SCHEDULE_COLLECTION}", self.root()))
    }

    pub fn session_document(&self, session_id: &SessionId) -> DocumentPath {
        self.schedule_collection().doc(session_id.as_str())
    }

    pub fn admins_collection(&self) -> CollectionPath {
        CollectionPath::new(format!("{}/admins", self.root()))
    }

    pub fn admin_marker(&self, user_id: &UserId) -> DocumentPath {
        self.admins_collection().doc(user_id.as_str())
    }

    fn user_data_collection(&self, user_id: &UserId) -> CollectionPath {
        CollectionPath::new(format!(
            "{}/users/{}/{USER_DATA_COLLECTION}",
            self.root(),
            user_id
        ))
    }

    pub fn profile_document(&self, user_id: &UserId) -> DocumentPath {
        self.user_data_collection(user_id).doc(PROFILE_DOCUMENT)
    }

    pub fn feedback_collection(&self, user_id: &UserId) -> CollectionPath {
        CollectionPath::new(format!(
            "{}/{FEEDBACK_COLLECTION}",
            self.user_data_collection(user_id)
        ))
    }
}

/// A single field write. Transforms are resolved by the store, never by the
/// client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Value(Value),
    ServerTimestamp,
    ArrayUnion(Vec<Value>),
    ArrayRemove(Vec<Value>),
}

impl FieldValue {
    pub fn string(value: impl Into<String>) -> Self {
        FieldValue::Value(Value::String(value.into()))
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Turns any serializable struct into literal field writes.
pub fn literal_fields<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, FieldValue::Value(v)))
            .collect()),
        Ok(other) => Err(StoreError::invalid_argument(format!(
            "document body must be an object, got {other}"
        ))),
        Err(err) => Err(StoreError::invalid_argument(err.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Overwrite,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WriteOp {
    Set {
        path: DocumentPath,
        fields: Fields,
        mode: WriteMode,
    },
    Update {
        path: DocumentPath,
        fields: Fields,
    },
    Delete {
        path: DocumentPath,
    },
}

impl WriteOp {
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Update { path, .. } | WriteOp::Delete { path } => {
                path
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.data.clone())).map_err(|err| {
            StoreError::internal(format!("malformed document {}: {err}", self.id))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Written,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: DocumentPath,
    pub kind: ChangeKind,
}
