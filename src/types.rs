use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the append-only conversation log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charts: Option<Vec<ChartPayload>>,
}

impl Message {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            charts: None,
        }
    }

    pub fn assistant(
        id: impl Into<String>,
        content: impl Into<String>,
        charts: Option<Vec<ChartPayload>>,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            charts,
        }
    }
}

/// The active conversation. Only one exists per profile today, but the id is
/// kept as a real key.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: OffsetDateTime,
    pub messages: Vec<Message>,
}

/// Renderer-defined chart description. Passed through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartPayload(pub Value);

impl ChartPayload {
    /// The `type` tag the renderer dispatches on, if present.
    pub fn chart_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.0.get("description").and_then(Value::as_str)
    }
}

/// A file picked by the user, as raw bytes plus its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl DatasetFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedDataset {
    pub filename: String,
    pub content: String,
    pub size_bytes: usize,
}

impl CachedDataset {
    pub fn into_file(self) -> DatasetFile {
        DatasetFile::new(self.filename, self.content.into_bytes())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: String,
    pub username: String,
}
