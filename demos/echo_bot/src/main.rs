//! Echo Bot Example
//!
//! A small bot module showing the pieces of cqbot working together:
//!
//! - `/echo <text>` replies with the arguments, CQ codes included
//! - `/ping` replies `pong`
//! - `/count` bumps a counter kept in the bot's store
//! - new group members are greeted, friend requests are accepted
//!
//! # Usage
//!
//! ```bash
//! CQ_HOST=127.0.0.1 CQ_PORT=6700 cargo run --package echo-bot
//! ```

use std::sync::Arc;

use anyhow::Result;
use cqbot::prelude::*;
use serde_json::{Value, json};
use tracing::info;

const HELP: &str = "/echo <text>  echo text\n/ping         pong\n/count        count up\n/help         this help";

struct EchoBot;

impl EchoBot {
    async fn on_message(bot: Bot, message: Arc<NormalizedMessage>) -> HandlerResult {
        let nickname = message.sender.display_name().unwrap_or("unknown");
        info!(
            channel = message.channel.as_str(),
            origin = message.origin_id,
            "{nickname}: {}",
            message.raw_text
        );

        let Some((name, args)) = message.command() else {
            return Ok(());
        };
        match name {
            "echo" if !args.is_empty() => {
                let text = args
                    .iter()
                    .map(|arg| arg.raw.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                bot.reply(&message, text).await?;
            }
            "ping" => {
                bot.reply(&message, "pong").await?;
            }
            "count" => {
                let count = bot.store().update(|doc| {
                    let next = doc.get("count").and_then(Value::as_u64).unwrap_or(0) + 1;
                    doc.insert("count".into(), next.into());
                    next
                })
                .await?;
                bot.reply(&message, format!("count: {count}")).await?;
            }
            "help" => {
                bot.reply(&message, HELP).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl BotModule for EchoBot {
    fn name(&self) -> &str {
        "echo"
    }

    fn defaults(&self) -> Option<Value> {
        Some(json!({ "count": 0 }))
    }

    fn handlers(self: Arc<Self>, bot: Bot) -> Handlers {
        let greeter = bot.clone();
        let friends = bot.clone();

        Handlers::new()
            .messages(
                [MessageEvent::Private, MessageEvent::Group, MessageEvent::Discuss],
                move |_origin, _sender, message| Self::on_message(bot.clone(), message),
            )
            .notice(NoticeEvent::GroupIncreaseApprove, move |notice| {
                let bot = greeter.clone();
                async move {
                    if let Some(group_id) = notice.group_id {
                        let at = CqCode::new("at").param("qq", notice.user_id);
                        bot.send_group(group_id, format!("{at} welcome!")).await?;
                    }
                    Ok(())
                }
            })
            .request(RequestEvent::Friend, move |request| {
                let bot = friends.clone();
                async move {
                    info!(user_id = request.user_id, comment = ?request.comment, "Friend request");
                    if let Some(flag) = request.flag {
                        bot.call_api(
                            "set_friend_add_request",
                            json!({ "flag": flag, "approve": true }),
                        )
                        .await?;
                    }
                    Ok(())
                }
            })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut runtime = CqRuntime::from_env()?;
    runtime.register(EchoBot)?;
    runtime.run().await?;
    Ok(())
}
