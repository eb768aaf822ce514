//! The fixed event taxonomy.
//!
//! Event names are dot-namespaced. Message events are split by channel and by
//! mention sub-kind; each sub-kind is a distinct event.
//!
//! ```text
//! message ── private
//!         ├─ discuss ── @ ── me
//!         └─ group ──── @ ── me
//! notice ─── group_upload │ group_admin.{set,unset}
//!         │  group_decrease.{leave,kick,kick_me}
//!         └─ group_increase.{approve,invite} │ friend_add
//! request ── friend │ group.{add,invite}
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::EventError;
use crate::message::extract_tags;

use super::context::EventContext;

/// Top-level group of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Message,
    Notice,
    Request,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Notice => "notice",
            Self::Request => "request",
        }
    }
}

/// Message events, by channel and mention sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageEvent {
    Private,
    Discuss,
    /// A discuss message mentioning someone.
    DiscussAt,
    /// A discuss message mentioning the bot itself.
    DiscussAtMe,
    Group,
    /// A group message mentioning someone.
    GroupAt,
    /// A group message mentioning the bot itself.
    GroupAtMe,
}

/// Notice events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeEvent {
    GroupUpload,
    GroupAdminSet,
    GroupAdminUnset,
    GroupDecreaseLeave,
    GroupDecreaseKick,
    /// The bot itself was removed from a group.
    GroupDecreaseKickMe,
    GroupIncreaseApprove,
    GroupIncreaseInvite,
    FriendAdd,
}

/// Request events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestEvent {
    Friend,
    GroupAdd,
    GroupInvite,
}

/// Any event of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message(MessageEvent),
    Notice(NoticeEvent),
    Request(RequestEvent),
}

impl MessageEvent {
    pub const ALL: [MessageEvent; 7] = [
        Self::Private,
        Self::Discuss,
        Self::DiscussAt,
        Self::DiscussAtMe,
        Self::Group,
        Self::GroupAt,
        Self::GroupAtMe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "message.private",
            Self::Discuss => "message.discuss",
            Self::DiscussAt => "message.discuss.@",
            Self::DiscussAtMe => "message.discuss.@.me",
            Self::Group => "message.group",
            Self::GroupAt => "message.group.@",
            Self::GroupAtMe => "message.group.@.me",
        }
    }

    /// The next less specific message event, if any.
    pub fn parent(&self) -> Option<MessageEvent> {
        match self {
            Self::DiscussAtMe => Some(Self::DiscussAt),
            Self::DiscussAt => Some(Self::Discuss),
            Self::GroupAtMe => Some(Self::GroupAt),
            Self::GroupAt => Some(Self::Group),
            Self::Private | Self::Discuss | Self::Group => None,
        }
    }
}

impl NoticeEvent {
    pub const ALL: [NoticeEvent; 9] = [
        Self::GroupUpload,
        Self::GroupAdminSet,
        Self::GroupAdminUnset,
        Self::GroupDecreaseLeave,
        Self::GroupDecreaseKick,
        Self::GroupDecreaseKickMe,
        Self::GroupIncreaseApprove,
        Self::GroupIncreaseInvite,
        Self::FriendAdd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GroupUpload => "notice.group_upload",
            Self::GroupAdminSet => "notice.group_admin.set",
            Self::GroupAdminUnset => "notice.group_admin.unset",
            Self::GroupDecreaseLeave => "notice.group_decrease.leave",
            Self::GroupDecreaseKick => "notice.group_decrease.kick",
            Self::GroupDecreaseKickMe => "notice.group_decrease.kick_me",
            Self::GroupIncreaseApprove => "notice.group_increase.approve",
            Self::GroupIncreaseInvite => "notice.group_increase.invite",
            Self::FriendAdd => "notice.friend_add",
        }
    }
}

impl RequestEvent {
    pub const ALL: [RequestEvent; 3] = [Self::Friend, Self::GroupAdd, Self::GroupInvite];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friend => "request.friend",
            Self::GroupAdd => "request.group.add",
            Self::GroupInvite => "request.group.invite",
        }
    }
}

impl EventKind {
    /// Every event of the taxonomy, messages first.
    pub const ALL: [EventKind; 19] = [
        Self::Message(MessageEvent::Private),
        Self::Message(MessageEvent::Discuss),
        Self::Message(MessageEvent::DiscussAt),
        Self::Message(MessageEvent::DiscussAtMe),
        Self::Message(MessageEvent::Group),
        Self::Message(MessageEvent::GroupAt),
        Self::Message(MessageEvent::GroupAtMe),
        Self::Notice(NoticeEvent::GroupUpload),
        Self::Notice(NoticeEvent::GroupAdminSet),
        Self::Notice(NoticeEvent::GroupAdminUnset),
        Self::Notice(NoticeEvent::GroupDecreaseLeave),
        Self::Notice(NoticeEvent::GroupDecreaseKick),
        Self::Notice(NoticeEvent::GroupDecreaseKickMe),
        Self::Notice(NoticeEvent::GroupIncreaseApprove),
        Self::Notice(NoticeEvent::GroupIncreaseInvite),
        Self::Notice(NoticeEvent::FriendAdd),
        Self::Request(RequestEvent::Friend),
        Self::Request(RequestEvent::GroupAdd),
        Self::Request(RequestEvent::GroupInvite),
    ];

    /// The dot-namespaced wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message(e) => e.as_str(),
            Self::Notice(e) => e.as_str(),
            Self::Request(e) => e.as_str(),
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            Self::Message(_) => EventCategory::Message,
            Self::Notice(_) => EventCategory::Notice,
            Self::Request(_) => EventCategory::Request,
        }
    }

    /// Determines the most specific event for an inbound context.
    ///
    /// Returns `None` for events outside the taxonomy (heartbeats, lifecycle
    /// meta events, notice types the framework does not model).
    pub fn classify(ctx: &EventContext) -> Option<EventKind> {
        match ctx.post_type.as_str() {
            "message" => classify_message(ctx).map(Self::Message),
            "notice" => classify_notice(ctx).map(Self::Notice),
            "request" => classify_request(ctx).map(Self::Request),
            _ => None,
        }
    }

    /// The event followed by its less specific ancestors.
    ///
    /// A mention of the bot in a group is also delivered to the listeners of
    /// `message.group.@` and `message.group`.
    pub fn propagation(&self) -> Vec<EventKind> {
        let Self::Message(mut event) = *self else {
            return vec![*self];
        };

        let mut chain = vec![*self];
        while let Some(parent) = event.parent() {
            chain.push(Self::Message(parent));
            event = parent;
        }
        chain
    }
}

fn classify_message(ctx: &EventContext) -> Option<MessageEvent> {
    let (plain, at, at_me) = match ctx.message_type.as_deref()? {
        "private" => return Some(MessageEvent::Private),
        "group" => (MessageEvent::Group, MessageEvent::GroupAt, MessageEvent::GroupAtMe),
        "discuss" => (
            MessageEvent::Discuss,
            MessageEvent::DiscussAt,
            MessageEvent::DiscussAtMe,
        ),
        _ => return None,
    };

    let self_id = ctx.self_id.to_string();
    let mut mentioned = false;
    for tag in extract_tags(ctx.text()) {
        if tag.name != "at" {
            continue;
        }
        if tag.param("qq") == Some(self_id.as_str()) {
            return Some(at_me);
        }
        mentioned = true;
    }

    Some(if mentioned { at } else { plain })
}

fn classify_notice(ctx: &EventContext) -> Option<NoticeEvent> {
    let sub_type = ctx.sub_type.as_deref().unwrap_or_default();
    let event = match (ctx.notice_type.as_deref()?, sub_type) {
        ("group_upload", _) => NoticeEvent::GroupUpload,
        ("group_admin", "set") => NoticeEvent::GroupAdminSet,
        ("group_admin", "unset") => NoticeEvent::GroupAdminUnset,
        ("group_decrease", "leave") => NoticeEvent::GroupDecreaseLeave,
        ("group_decrease", "kick") => NoticeEvent::GroupDecreaseKick,
        ("group_decrease", "kick_me") => NoticeEvent::GroupDecreaseKickMe,
        ("group_increase", "approve") => NoticeEvent::GroupIncreaseApprove,
        ("group_increase", "invite") => NoticeEvent::GroupIncreaseInvite,
        ("friend_add", _) => NoticeEvent::FriendAdd,
        _ => return None,
    };
    Some(event)
}

fn classify_request(ctx: &EventContext) -> Option<RequestEvent> {
    let sub_type = ctx.sub_type.as_deref().unwrap_or_default();
    let event = match (ctx.request_type.as_deref()?, sub_type) {
        ("friend", _) => RequestEvent::Friend,
        ("group", "add") => RequestEvent::GroupAdd,
        ("group", "invite") => RequestEvent::GroupInvite,
        _ => return None,
    };
    Some(event)
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| EventError::UnknownEvent(s.to_string()))
    }
}

impl From<MessageEvent> for EventKind {
    fn from(event: MessageEvent) -> Self {
        Self::Message(event)
    }
}

impl From<NoticeEvent> for EventKind {
    fn from(event: NoticeEvent) -> Self {
        Self::Notice(event)
    }
}

impl From<RequestEvent> for EventKind {
    fn from(event: RequestEvent) -> Self {
        Self::Request(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(json: &str) -> EventContext {
        EventContext::from_json(json).unwrap()
    }

    #[test]
    fn test_name_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
            assert!(kind.as_str().starts_with(kind.category().as_str()));
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = "message.channel".parse::<EventKind>().unwrap_err();
        assert_eq!(err, EventError::UnknownEvent("message.channel".into()));
    }

    #[test]
    fn test_sub_enum_tables_cover_taxonomy() {
        let total = MessageEvent::ALL.len() + NoticeEvent::ALL.len() + RequestEvent::ALL.len();
        assert_eq!(total, EventKind::ALL.len());
    }

    #[test]
    fn test_classify_group_mentions() {
        let plain = context(
            r#"{"post_type":"message","message_type":"group","self_id":10,"message":"hello"}"#,
        );
        assert_eq!(
            EventKind::classify(&plain),
            Some(EventKind::Message(MessageEvent::Group))
        );

        let other = context(
            r#"{"post_type":"message","message_type":"group","self_id":10,"message":"[CQ:at,qq=11] hi"}"#,
        );
        assert_eq!(
            EventKind::classify(&other),
            Some(EventKind::Message(MessageEvent::GroupAt))
        );

        let me = context(
            r#"{"post_type":"message","message_type":"group","self_id":10,"message":"[CQ:at,qq=11][CQ:at,qq=10] hi"}"#,
        );
        assert_eq!(
            EventKind::classify(&me),
            Some(EventKind::Message(MessageEvent::GroupAtMe))
        );
    }

    #[test]
    fn test_classify_discuss_and_private() {
        let discuss = context(
            r#"{"post_type":"message","message_type":"discuss","self_id":10,"message":"[CQ:at,qq=10]"}"#,
        );
        assert_eq!(
            EventKind::classify(&discuss),
            Some(EventKind::Message(MessageEvent::DiscussAtMe))
        );

        let private = context(
            r#"{"post_type":"message","message_type":"private","self_id":10,"message":"[CQ:at,qq=10]"}"#,
        );
        assert_eq!(
            EventKind::classify(&private),
            Some(EventKind::Message(MessageEvent::Private))
        );
    }

    #[test]
    fn test_classify_notice_and_request() {
        let kick = context(r#"{"post_type":"notice","notice_type":"group_decrease","sub_type":"kick_me"}"#);
        assert_eq!(
            EventKind::classify(&kick),
            Some(EventKind::Notice(NoticeEvent::GroupDecreaseKickMe))
        );

        let upload = context(r#"{"post_type":"notice","notice_type":"group_upload"}"#);
        assert_eq!(
            EventKind::classify(&upload),
            Some(EventKind::Notice(NoticeEvent::GroupUpload))
        );

        let invite = context(r#"{"post_type":"request","request_type":"group","sub_type":"invite"}"#);
        assert_eq!(
            EventKind::classify(&invite),
            Some(EventKind::Request(RequestEvent::GroupInvite))
        );
    }

    #[test]
    fn test_classify_outside_taxonomy() {
        let heartbeat = context(r#"{"post_type":"meta_event","meta_event_type":"heartbeat"}"#);
        assert_eq!(EventKind::classify(&heartbeat), None);

        let poke = context(r#"{"post_type":"notice","notice_type":"notify","sub_type":"poke"}"#);
        assert_eq!(EventKind::classify(&poke), None);

        let admin = context(r#"{"post_type":"notice","notice_type":"group_admin"}"#);
        assert_eq!(EventKind::classify(&admin), None);
    }

    #[test]
    fn test_propagation() {
        let chain = EventKind::Message(MessageEvent::GroupAtMe).propagation();
        assert_eq!(
            chain,
            vec![
                EventKind::Message(MessageEvent::GroupAtMe),
                EventKind::Message(MessageEvent::GroupAt),
                EventKind::Message(MessageEvent::Group),
            ]
        );

        let private = EventKind::Message(MessageEvent::Private);
        assert_eq!(private.propagation(), vec![private]);

        let notice = EventKind::Notice(NoticeEvent::GroupAdminSet);
        assert_eq!(notice.propagation(), vec![notice]);
    }
}
