//! Member message records as fetched and as indexed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A record as delivered by an ingestion source. Either field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub user_name: Option<String>,
    pub message: Option<String>,
}

impl RawRecord {
    pub fn new(user_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_name: Some(user_name.into()),
            message: Some(message.into()),
        }
    }

    /// Build a record from one JSON item.
    ///
    /// String fields are taken verbatim and numbers or booleans are
    /// stringified. `null`, objects, arrays and missing keys leave the field
    /// absent. Anything that is not a JSON object yields an empty record.
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        Self {
            user_name: object.get("user_name").and_then(scalar_to_string),
            message: object.get("message").and_then(scalar_to_string),
        }
    }

    /// Convert into an indexable message, or `None` if either field is missing.
    pub fn into_message(self) -> Option<Message> {
        match (self.user_name, self.message) {
            (Some(speaker), Some(text)) => Some(Message { speaker, text }),
            _ => None,
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// An indexed message. Rendered as `"{speaker}: {text}"` everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub speaker: String,
    pub text: String,
}

impl Message {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}
