//! Core data types for keyed records, context slots, and errors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry in a record's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// A keyed entity owned by the state store.
///
/// `status` is always a state of the transition table registered for `kind`.
/// `history` is only ever appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Record {
    /// Create a record in the given initial status with an empty history.
    pub fn new(kind: &str, id: &str, status: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            status: status.to_string(),
            created_at: now,
            updated_at: now,
            fields: Map::new(),
            history: Vec::new(),
        }
    }

    /// Store key for a record of `kind` with the given id.
    pub fn key_for(kind: &str, id: &str) -> String {
        format!("{kind}:{id}")
    }

    /// Store key of this record.
    pub fn key(&self) -> String {
        Self::key_for(&self.kind, &self.id)
    }

    /// Append a history entry and bump `updated_at`.
    pub fn log(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        self.history.push(HistoryEntry {
            at: now,
            message: message.into(),
        });
        self.updated_at = now;
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
        self.updated_at = Utc::now();
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Role tag of a context slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotRole {
    System,
    User,
    Assistant,
    Tool,
}

impl SlotRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotRole::System => "system",
            SlotRole::User => "user",
            SlotRole::Assistant => "assistant",
            SlotRole::Tool => "tool",
        }
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotRole {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(SlotRole::System),
            "user" => Ok(SlotRole::User),
            "assistant" => Ok(SlotRole::Assistant),
            "tool" => Ok(SlotRole::Tool),
            other => Err(ContextError::InvalidInput(format!(
                "Unknown slot role '{other}'. Use system, user, assistant, or tool."
            ))),
        }
    }
}

/// A semantically tagged unit of context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub role: SlotRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn new(name: &str, role: SlotRole, content: &str) -> Self {
        Self {
            name: name.to_string(),
            role,
            content: content.to_string(),
            options: None,
            updated_at: Utc::now(),
        }
    }
}

/// Errors that can occur in the state library.
#[derive(thiserror::Error, Debug)]
pub enum ContextError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition for {kind}: cannot apply '{event}' in state '{from}'")]
    InvalidTransition {
        kind: String,
        from: String,
        event: String,
    },

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type ContextResult<T> = Result<T, ContextError>;
