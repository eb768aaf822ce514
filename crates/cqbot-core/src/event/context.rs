//! Raw inbound event context.
//!
//! [`EventContext`] is the flat JSON object the protocol endpoint posts for
//! every event. Only the fields the framework reads are modelled; anything
//! else is ignored on deserialization.

use std::fmt::Write as _;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::EventError;
use crate::message::{escape_text, escape_value};

/// Message sender information.
///
/// `sub_type` is not part of the wire sender object; the dispatcher copies it
/// from the event so handlers can tell a friend from a temporary session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub nickname: Option<String>,
    /// "male", "female" or "unknown".
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    /// Group card (group nickname).
    #[serde(default)]
    pub card: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    /// "owner", "admin" or "member".
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
}

impl Sender {
    /// The group card if set, otherwise the nickname.
    pub fn display_name(&self) -> Option<&str> {
        self.card
            .as_deref()
            .filter(|card| !card.is_empty())
            .or(self.nickname.as_deref())
    }
}

/// One inbound event as posted by the protocol endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// "message", "notice", "request" or "meta_event".
    #[serde(default)]
    pub post_type: String,
    /// Unix seconds.
    #[serde(default)]
    pub time: i64,
    /// The bot account that received the event.
    #[serde(default)]
    pub self_id: i64,

    pub message_type: Option<String>,
    pub sub_type: Option<String>,
    pub message_id: Option<i64>,
    pub user_id: Option<i64>,
    pub group_id: Option<i64>,
    pub discuss_id: Option<i64>,
    /// Message content in CQ string form. Segment arrays are rendered on
    /// deserialization.
    #[serde(default, deserialize_with = "deserialize_message")]
    pub message: Option<String>,
    pub raw_message: Option<String>,
    pub sender: Option<Sender>,

    pub notice_type: Option<String>,
    pub request_type: Option<String>,
    pub operator_id: Option<i64>,
    /// Opaque token needed to answer a request.
    pub flag: Option<String>,
    /// Verification message attached to a request.
    pub comment: Option<String>,
    /// Uploaded file description for `group_upload`.
    pub file: Option<Value>,
}

impl EventContext {
    /// Parses one JSON event.
    pub fn from_json(frame: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Converts an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        Ok(serde_json::from_value(value)?)
    }

    /// The message text, falling back to `raw_message`.
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.raw_message.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Text(String),
    Segments(Vec<WireSegment>),
}

#[derive(Deserialize)]
struct WireSegment {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Map<String, Value>,
}

fn deserialize_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let message = Option::<WireMessage>::deserialize(deserializer)?;
    Ok(message.map(|message| match message {
        WireMessage::Text(text) => text,
        WireMessage::Segments(segments) => render_segments(&segments),
    }))
}

/// Renders array-format segments into the equivalent CQ string.
fn render_segments(segments: &[WireSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        if segment.kind == "text" {
            let text = segment.data.get("text").and_then(Value::as_str);
            out.push_str(&escape_text(text.unwrap_or_default()));
            continue;
        }

        out.push_str("[CQ:");
        out.push_str(&segment.kind);
        for (key, value) in &segment.data {
            let value = match value {
                Value::String(s) => escape_value(s),
                Value::Null => continue,
                other => other.to_string(),
            };
            let _ = write!(out, ",{key}={value}");
        }
        out.push(']');
    }
    out
}
