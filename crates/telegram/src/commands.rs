//! Bot commands: `/start`, `/help`, `/ping`, `/status`.

use std::time::{Duration, Instant};

use {
    mediarelay_pipeline::{StatsSnapshot, escape_html},
    teloxide::{
        prelude::*,
        types::{BotCommand, ParseMode},
    },
    tracing::debug,
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, labels, telegram as tg_metrics};

use crate::{error::Result, state::RelayState, transport::with_retry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Ping,
    Status,
}

impl Command {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Ping => "ping",
            Self::Status => "status",
        }
    }
}

/// Parse `/cmd` or `/cmd@botname` from the start of a message.
///
/// Commands addressed to another bot are ignored.
#[must_use]
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let body = first.strip_prefix('/')?;
    let (name, target) = match body.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (body, None),
    };
    if let (Some(target), Some(me)) = (target, bot_username)
        && !target.eq_ignore_ascii_case(me)
    {
        return None;
    }
    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "ping" => Some(Command::Ping),
        "status" => Some(Command::Status),
        _ => None,
    }
}

/// Menu registered with `setMyCommands`.
#[must_use]
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "What this bot does"),
        BotCommand::new("help", "List commands"),
        BotCommand::new("ping", "Check the bot is alive"),
        BotCommand::new("status", "Uptime and relay counters"),
    ]
}

#[must_use]
pub fn help_text() -> String {
    [
        "<b>Commands</b>",
        "/start - what this bot does",
        "/help - this list",
        "/ping - round-trip latency",
        "/status - uptime and relay counters",
    ]
    .join("\n")
}

#[must_use]
pub fn start_text(state: &RelayState) -> String {
    format!(
        "👋 I relay every video and document posted in {} to {}, renamed to \
         <code>{}&lt;timestamp&gt;.ext</code>.\n\nSee /help for commands.",
        escape_html(&state.source.to_string()),
        escape_html(&state.pipeline.destination().to_string()),
        escape_html(state.pipeline.prefix()),
    )
}

/// `1d 2h 3m 4s`, dropping leading zero units.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, hours, minutes, seconds) = (
        secs / 86_400,
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    );
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[must_use]
pub fn status_text(
    snapshot: &StatsSnapshot,
    source: &str,
    destination: &str,
    prefix: &str,
) -> String {
    format!(
        "<b>Status</b>\n\
         Uptime: {}\n\
         Route: {} → {}\n\
         Prefix: <code>{}</code>\n\
         Jobs: {} active, {} relayed, {} failed",
        format_uptime(snapshot.uptime),
        escape_html(source),
        escape_html(destination),
        escape_html(prefix),
        snapshot.active,
        snapshot.succeeded,
        snapshot.failed,
    )
}

async fn reply(bot: &Bot, chat: ChatId, text: String) -> Result<Message> {
    let message = with_retry("send command reply", || {
        let req = bot.send_message(chat, text.clone()).parse_mode(ParseMode::Html);
        async move { req.await }
    })
    .await?;
    Ok(message)
}

/// Answer one command in the chat it came from.
pub async fn handle_command(state: &RelayState, msg: &Message, command: Command) -> Result<()> {
    let chat = msg.chat.id;
    debug!(chat_id = chat.0, command = command.name(), "handling command");

    #[cfg(feature = "metrics")]
    counter!(tg_metrics::COMMANDS_TOTAL, labels::COMMAND => command.name()).increment(1);

    match command {
        Command::Start => {
            reply(&state.bot, chat, start_text(state)).await?;
        },
        Command::Help => {
            reply(&state.bot, chat, help_text()).await?;
        },
        Command::Ping => {
            let started = Instant::now();
            let sent = reply(&state.bot, chat, "🏓 Pong!".to_string()).await?;
            let latency = started.elapsed().as_millis();
            let text = format!("🏓 Pong! <code>{latency} ms</code>");
            with_retry("edit ping reply", || {
                let req = state
                    .bot
                    .edit_message_text(chat, sent.id, text.clone())
                    .parse_mode(ParseMode::Html);
                async move { req.await }
            })
            .await?;
        },
        Command::Status => {
            let text = status_text(
                &state.pipeline.stats().snapshot(),
                &state.source.to_string(),
                &state.pipeline.destination().to_string(),
                state.pipeline.prefix(),
            );
            reply(&state.bot, chat, text).await?;
        },
    }
    Ok(())
}
