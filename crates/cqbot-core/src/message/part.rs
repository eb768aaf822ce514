//! Structured message parts produced by the breakdown engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One typed piece of a parsed message.
///
/// A [`Command`](MessagePart::Command) only ever appears as the single element
/// of a top-level breakdown; argument parts never contain one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    /// Ordinary text between inline codes. Never blank.
    Text {
        /// The text, as it appeared between its neighbours.
        content: String,
    },
    /// A recognized CQ code.
    InlineCode {
        /// Code name, e.g. `at`.
        name: String,
        /// Raw parameter values.
        params: BTreeMap<String, String>,
    },
    /// A whole message interpreted as `/name arg...`.
    Command {
        /// Command name, lowercased.
        name: String,
        /// Positional arguments in order.
        arguments: Vec<Argument>,
    },
}

/// One command argument: its token text plus that token's own breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// The token exactly as written.
    pub raw: String,
    /// The token parsed without command detection.
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// Creates a text part.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Returns the text content if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { content } => Some(content),
            _ => None,
        }
    }

    /// Returns the parameters of an inline code with the given name.
    pub fn as_code(&self, code: &str) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::InlineCode { name, params } if name == code => Some(params),
            _ => None,
        }
    }
}

impl Argument {
    /// Returns the mentioned user if the argument is exactly one `at` code.
    pub fn mention(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [part] => part.as_code("at")?.get("qq").map(String::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for MessagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { content } => f.write_str(content),
            Self::InlineCode { name, params } => {
                write!(f, "[CQ:{name}")?;
                for (key, value) in params {
                    write!(f, ",{key}={value}")?;
                }
                f.write_str("]")
            }
            Self::Command { name, arguments } => {
                write!(f, "/{name}")?;
                for argument in arguments {
                    write!(f, " {}", argument.raw)?;
                }
                Ok(())
            }
        }
    }
}

/// Convenience queries over a parsed message.
pub trait MessageParts {
    /// Returns the command name and arguments if the message is a command.
    fn command(&self) -> Option<(&str, &[Argument])>;

    /// Concatenates all top-level text parts.
    fn plain_text(&self) -> String;

    /// Returns every `qq` value of `at` codes, including those inside command
    /// arguments.
    fn mentions(&self) -> Vec<&str>;

    /// Returns true if `user_id` is mentioned anywhere in the message.
    fn mentions_user(&self, user_id: i64) -> bool {
        let id = user_id.to_string();
        self.mentions().iter().any(|qq| *qq == id)
    }
}

impl MessageParts for [MessagePart] {
    fn command(&self) -> Option<(&str, &[Argument])> {
        match self {
            [MessagePart::Command { name, arguments }] => Some((name, arguments)),
            _ => None,
        }
    }

    fn plain_text(&self) -> String {
        self.iter().filter_map(MessagePart::as_text).collect()
    }

    fn mentions(&self) -> Vec<&str> {
        let mut found = Vec::new();
        for part in self {
            match part {
                MessagePart::InlineCode { name, params } if name == "at" => {
                    found.extend(params.get("qq").map(String::as_str));
                }
                MessagePart::Command { arguments, .. } => {
                    for argument in arguments {
                        found.extend(argument.parts.mentions());
                    }
                }
                _ => {}
            }
        }
        found
    }
}

impl MessageParts for Vec<MessagePart> {
    fn command(&self) -> Option<(&str, &[Argument])> {
        self.as_slice().command()
    }

    fn plain_text(&self) -> String {
        self.as_slice().plain_text()
    }

    fn mentions(&self) -> Vec<&str> {
        self.as_slice().mentions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(qq: &str) -> MessagePart {
        MessagePart::InlineCode {
            name: "at".into(),
            params: BTreeMap::from([("qq".to_string(), qq.to_string())]),
        }
    }

    #[test]
    fn test_display_round_trips_wire_text() {
        let parts = [MessagePart::text("hi "), at("123")];
        let rendered: String = parts.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, "hi [CQ:at,qq=123]");

        let command = MessagePart::Command {
            name: "ban".into(),
            arguments: vec![Argument {
                raw: "123".into(),
                parts: vec![MessagePart::text("123")],
            }],
        };
        assert_eq!(command.to_string(), "/ban 123");
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_string(&MessagePart::text("hello")).unwrap();
        assert_eq!(json, r#"{"type":"text","content":"hello"}"#);

        let json = serde_json::to_string(&at("1")).unwrap();
        assert_eq!(json, r#"{"type":"inline_code","name":"at","params":{"qq":"1"}}"#);
    }

    #[test]
    fn test_mentions_include_command_arguments() {
        let parts = vec![MessagePart::Command {
            name: "kick".into(),
            arguments: vec![
                Argument {
                    raw: "[CQ:at,qq=42]".into(),
                    parts: vec![at("42")],
                },
                Argument {
                    raw: "spam".into(),
                    parts: vec![MessagePart::text("spam")],
                },
            ],
        }];

        assert_eq!(parts.mentions(), vec!["42"]);
        assert!(parts.mentions_user(42));
        assert!(!parts.mentions_user(43));

        let (name, arguments) = parts.command().unwrap();
        assert_eq!(name, "kick");
        assert_eq!(arguments[0].mention(), Some("42"));
        assert_eq!(arguments[1].mention(), None);
    }

    #[test]
    fn test_plain_text_skips_codes() {
        let parts = vec![MessagePart::text("a "), at("1"), MessagePart::text(" b")];
        assert_eq!(parts.plain_text(), "a  b");
        assert!(parts.command().is_none());
    }
}
