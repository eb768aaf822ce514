use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use parking_lot::Mutex;

use cqbot_core::prelude::*;
use cqbot_core::{FailureCause, MessageParts};

fn group_event(message: &str) -> EventContext {
    EventContext::from_value(serde_json::json!({
        "post_type": "message",
        "message_type": "group",
        "sub_type": "normal",
        "time": 1_700_000_000,
        "self_id": 10,
        "message_id": 99,
        "group_id": 123456,
        "user_id": 42,
        "message": message,
        "raw_message": message,
        "sender": { "user_id": 42, "nickname": "alice" }
    }))
    .unwrap()
}

type Log = Arc<Mutex<Vec<(String, i64)>>>;

fn recording(log: &Log, label: &'static str) -> Handlers {
    let log = Arc::clone(log);
    Handlers::new().message(
        MessageEvent::Group,
        move |origin: i64, _sender: Sender, _message: Arc<NormalizedMessage>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push((label.to_string(), origin));
                Ok(())
            }
        },
    )
}

#[tokio::test]
async fn test_two_handlers_in_registration_order() {
    let registry = Arc::new(EventRegistry::new());
    let log: Log = Arc::default();
    registry.register("first", recording(&log, "first"));
    registry.register("second", recording(&log, "second"));

    let ctx = group_event("hello");
    let report = Dispatcher::new(registry)
        .dispatch(EventKind::Message(MessageEvent::Group), &ctx)
        .await
        .unwrap();

    assert_eq!(report.invoked, 2);
    assert!(report.is_success());
    assert_eq!(
        *log.lock(),
        vec![("first".to_string(), 123456), ("second".to_string(), 123456)]
    );
}

#[tokio::test]
async fn test_no_handlers_for_event() {
    let registry = Arc::new(EventRegistry::new());
    let log: Log = Arc::default();
    registry.register("bot", recording(&log, "bot"));

    let report = Dispatcher::new(registry)
        .dispatch(EventKind::Message(MessageEvent::Private), &group_event("hi"))
        .await
        .unwrap();

    assert_eq!(report.invoked, 0);
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_failing_handlers_do_not_stop_siblings() {
    let registry = Arc::new(EventRegistry::new());
    let log: Log = Arc::default();

    registry.register(
        "grumpy",
        Handlers::new()
            .message(
                MessageEvent::Group,
                |_o: i64, _s: Sender, _m: Arc<NormalizedMessage>| async { bail!("refused") },
            )
            .message(
                MessageEvent::Group,
                |_o: i64, _s: Sender, _m: Arc<NormalizedMessage>| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    panic!("exploded");
                },
            ),
    );
    registry.register("calm", recording(&log, "calm"));

    let report = Dispatcher::new(registry)
        .dispatch(EventKind::Message(MessageEvent::Group), &group_event("hi"))
        .await
        .unwrap();

    assert_eq!(report.invoked, 3);
    assert_eq!(report.failures.len(), 2);
    assert!(matches!(report.failures[0].cause, FailureCause::Error(_)));
    assert!(matches!(&report.failures[1].cause, FailureCause::Panic(msg) if msg == "exploded"));
    assert_eq!(&*report.failures[0].bot, "grumpy");
    assert_eq!(*log.lock(), vec![("calm".to_string(), 123456)]);
}

#[tokio::test]
async fn test_dispatch_waits_for_async_work() {
    let registry = Arc::new(EventRegistry::new());
    let log: Log = Arc::default();
    let slow_log = Arc::clone(&log);

    registry.register(
        "slow",
        Handlers::new().message(
            MessageEvent::Group,
            move |origin: i64, _s: Sender, _m: Arc<NormalizedMessage>| {
                let log = Arc::clone(&slow_log);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    log.lock().push(("slow".to_string(), origin));
                    Ok(())
                }
            },
        ),
    );

    Dispatcher::new(registry)
        .dispatch(EventKind::Message(MessageEvent::Group), &group_event("hi"))
        .await
        .unwrap();

    assert_eq!(log.lock().len(), 1);
}

#[tokio::test]
async fn test_handler_sees_parsed_command() {
    let registry = Arc::new(EventRegistry::new());
    let seen: Arc<Mutex<Option<Arc<NormalizedMessage>>>> = Arc::default();
    let slot = Arc::clone(&seen);

    registry.register(
        "mod",
        Handlers::new().message(
            MessageEvent::Group,
            move |_o: i64, sender: Sender, message: Arc<NormalizedMessage>| {
                let slot = Arc::clone(&slot);
                async move {
                    assert_eq!(sender.sub_type.as_deref(), Some("normal"));
                    *slot.lock() = Some(message);
                    Ok(())
                }
            },
        ),
    );

    let ctx = group_event("/kick [CQ:at,qq=77] spamming");
    Dispatcher::new(registry)
        .dispatch(EventKind::Message(MessageEvent::Group), &ctx)
        .await
        .unwrap();

    let message = seen.lock().clone().unwrap();
    let (name, args) = message.command().unwrap();
    assert_eq!(name, "kick");
    assert_eq!(args[0].mention(), Some("77"));
    assert_eq!(args[1].raw, "spamming");
    assert!(message.parts.mentions_user(77));
    assert_eq!(message.id, 99);
    assert_eq!(message.channel, Channel::Group);
}

#[tokio::test]
async fn test_self_mention_bubbles_to_group_listeners() {
    let registry = Arc::new(EventRegistry::new());
    let log: Log = Arc::default();
    let at_me_log = Arc::clone(&log);

    registry.register("plain", recording(&log, "group"));
    registry.register(
        "mentioned",
        Handlers::new().message(
            MessageEvent::GroupAtMe,
            move |origin: i64, _s: Sender, _m: Arc<NormalizedMessage>| {
                let log = Arc::clone(&at_me_log);
                async move {
                    log.lock().push(("at_me".to_string(), origin));
                    Ok(())
                }
            },
        ),
    );

    let ctx = group_event("[CQ:at,qq=10] ping");
    let kind = EventKind::classify(&ctx).unwrap();
    assert_eq!(kind, EventKind::Message(MessageEvent::GroupAtMe));

    let report = Dispatcher::new(registry)
        .dispatch_propagated(kind, &ctx)
        .await
        .unwrap();

    assert_eq!(report.invoked, 2);
    assert_eq!(
        *log.lock(),
        vec![("at_me".to_string(), 123456), ("group".to_string(), 123456)]
    );
}
