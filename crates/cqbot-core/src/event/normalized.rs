//! Normalized records handed to handlers.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::EventError;
use crate::message::{Argument, MessagePart, MessageParts, breakdown};

use super::context::{EventContext, Sender};

/// The conversation kind a message was delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Private,
    Discuss,
    Group,
}

impl Channel {
    /// Maps the wire `message_type` value.
    pub fn from_message_type(message_type: &str) -> Option<Self> {
        match message_type {
            "private" => Some(Self::Private),
            "discuss" => Some(Self::Discuss),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Discuss => "discuss",
            Self::Group => "group",
        }
    }

    /// The context field carrying this channel's conversation id.
    fn origin_field(&self) -> &'static str {
        match self {
            Self::Private => "user_id",
            Self::Discuss => "discuss_id",
            Self::Group => "group_id",
        }
    }
}

/// A message event after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub id: i64,
    #[serde(with = "time::serde::timestamp")]
    pub timestamp: OffsetDateTime,
    /// User id for private messages, group or discuss id otherwise.
    pub origin_id: i64,
    pub channel: Channel,
    pub sender: Sender,
    /// Message text in CQ string form.
    pub text: String,
    pub raw_text: String,
    pub parts: Vec<MessagePart>,
}

impl NormalizedMessage {
    /// Builds the normalized record from a message context.
    pub fn from_context(ctx: &EventContext) -> Result<Self, EventError> {
        let message_type = ctx
            .message_type
            .as_deref()
            .ok_or(EventError::MissingField("message_type"))?;
        let channel = Channel::from_message_type(message_type)
            .ok_or_else(|| EventError::UnknownMessageType(message_type.to_string()))?;

        let origin_id = match channel {
            Channel::Private => ctx.user_id,
            Channel::Discuss => ctx.discuss_id,
            Channel::Group => ctx.group_id,
        }
        .ok_or(EventError::MissingField(channel.origin_field()))?;

        let id = ctx.message_id.ok_or(EventError::MissingField("message_id"))?;

        let mut sender = ctx.sender.clone().unwrap_or_default();
        sender.sub_type = ctx.sub_type.clone();
        if sender.user_id.is_none() {
            sender.user_id = ctx.user_id;
        }

        let text = ctx.text().to_string();
        let raw_text = ctx.raw_message.clone().unwrap_or_else(|| text.clone());
        let parts = breakdown(&text);

        Ok(Self {
            id,
            timestamp: timestamp(ctx.time)?,
            origin_id,
            channel,
            sender,
            text,
            raw_text,
            parts,
        })
    }

    /// The command name and arguments if the message is a command.
    pub fn command(&self) -> Option<(&str, &[Argument])> {
        self.parts.command()
    }

    /// Concatenated top-level text.
    pub fn plain_text(&self) -> String {
        self.parts.plain_text()
    }

    /// Whether the message mentions `user_id`.
    pub fn mentions(&self, user_id: i64) -> bool {
        self.parts.mentions_user(user_id)
    }
}

/// A notice or request event after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedNotice {
    #[serde(with = "time::serde::timestamp")]
    pub timestamp: OffsetDateTime,
    /// The user the event is about.
    pub user_id: i64,
    pub group_id: Option<i64>,
    pub operator_id: Option<i64>,
    pub sub_type: Option<String>,
    /// Approval token, request events only.
    pub flag: Option<String>,
    /// Verification message, request events only.
    pub comment: Option<String>,
}

impl NormalizedNotice {
    /// Builds the normalized record from a notice or request context.
    pub fn from_context(ctx: &EventContext) -> Result<Self, EventError> {
        let is_request = ctx.post_type == "request";
        Ok(Self {
            timestamp: timestamp(ctx.time)?,
            user_id: ctx.user_id.ok_or(EventError::MissingField("user_id"))?,
            group_id: ctx.group_id,
            operator_id: ctx.operator_id,
            sub_type: ctx.sub_type.clone(),
            flag: ctx.flag.clone().filter(|_| is_request),
            comment: ctx.comment.clone().filter(|_| is_request),
        })
    }
}

fn timestamp(unix: i64) -> Result<OffsetDateTime, EventError> {
    OffsetDateTime::from_unix_timestamp(unix).map_err(|_| EventError::InvalidTimestamp(unix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_message(body: &str) -> EventContext {
        EventContext {
            post_type: "message".into(),
            time: 1_700_000_000,
            self_id: 10,
            message_type: Some("group".into()),
            sub_type: Some("normal".into()),
            message_id: Some(5),
            user_id: Some(42),
            group_id: Some(100),
            message: Some(body.into()),
            raw_message: Some(body.into()),
            sender: Some(Sender {
                user_id: Some(42),
                nickname: Some("alice".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_group_message() {
        let message = NormalizedMessage::from_context(&group_message("/ban 1")).unwrap();
        assert_eq!(message.id, 5);
        assert_eq!(message.origin_id, 100);
        assert_eq!(message.channel, Channel::Group);
        assert_eq!(message.timestamp.unix_timestamp(), 1_700_000_000);
        assert_eq!(message.sender.sub_type.as_deref(), Some("normal"));
        assert_eq!(message.sender.nickname.as_deref(), Some("alice"));
        assert_eq!(message.command().map(|(name, _)| name), Some("ban"));
    }

    #[test]
    fn test_origin_per_channel() {
        let mut ctx = group_message("hi");
        ctx.message_type = Some("private".into());
        assert_eq!(NormalizedMessage::from_context(&ctx).unwrap().origin_id, 42);

        ctx.message_type = Some("discuss".into());
        ctx.discuss_id = Some(7);
        let message = NormalizedMessage::from_context(&ctx).unwrap();
        assert_eq!(message.origin_id, 7);
        assert_eq!(message.channel, Channel::Discuss);
    }

    #[test]
    fn test_invalid_message_contexts() {
        let mut ctx = group_message("hi");
        ctx.message_type = Some("channel".into());
        assert_eq!(
            NormalizedMessage::from_context(&ctx),
            Err(EventError::UnknownMessageType("channel".into()))
        );

        let mut ctx = group_message("hi");
        ctx.group_id = None;
        assert_eq!(
            NormalizedMessage::from_context(&ctx),
            Err(EventError::MissingField("group_id"))
        );

        let mut ctx = group_message("hi");
        ctx.message_type = None;
        assert_eq!(
            NormalizedMessage::from_context(&ctx),
            Err(EventError::MissingField("message_type"))
        );
    }

    #[test]
    fn test_sender_filled_when_absent() {
        let mut ctx = group_message("hi");
        ctx.sender = None;
        let message = NormalizedMessage::from_context(&ctx).unwrap();
        assert_eq!(message.sender.user_id, Some(42));
        assert_eq!(message.sender.sub_type.as_deref(), Some("normal"));
    }

    #[test]
    fn test_notice_and_request() {
        let notice = EventContext {
            post_type: "notice".into(),
            time: 1_700_000_000,
            notice_type: Some("group_decrease".into()),
            sub_type: Some("kick".into()),
            user_id: Some(42),
            group_id: Some(100),
            operator_id: Some(1),
            flag: Some("ignored".into()),
            ..Default::default()
        };
        let normalized = NormalizedNotice::from_context(&notice).unwrap();
        assert_eq!(normalized.user_id, 42);
        assert_eq!(normalized.operator_id, Some(1));
        assert_eq!(normalized.flag, None);

        let request = EventContext {
            post_type: "request".into(),
            request_type: Some("friend".into()),
            user_id: Some(42),
            flag: Some("f-1".into()),
            comment: Some("let me in".into()),
            ..Default::default()
        };
        let normalized = NormalizedNotice::from_context(&request).unwrap();
        assert_eq!(normalized.flag.as_deref(), Some("f-1"));
        assert_eq!(normalized.comment.as_deref(), Some("let me in"));
        assert_eq!(normalized.group_id, None);
    }

    #[test]
    fn test_notice_requires_user() {
        let ctx = EventContext {
            post_type: "notice".into(),
            ..Default::default()
        };
        assert_eq!(
            NormalizedNotice::from_context(&ctx),
            Err(EventError::MissingField("user_id"))
        );
    }
}
