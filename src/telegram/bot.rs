//! Bot initialization and message routing utilities
//!
//! This module contains:
//! - Bot instance creation
//! - Command menu registration
//! - Message addressing logic (private chats, mentions, replies)

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::{ChatKind, Message, UserId};

use crate::core::config;
use crate::telegram::Bot;

/// Creates a Bot instance with custom or default API URL
///
/// The token comes from `BOT_TOKEN` (or `TELOXIDE_TOKEN`).
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - No token configured or invalid API URL
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN or TELOXIDE_TOKEN must be set");
    }
    let token = config::BOT_TOKEN.as_str();
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;

    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        Bot::with_client(token, client).set_api_url(url)
    } else {
        Bot::with_client(token, client)
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// Only worth calling when the command set changed, see [`crate::core::startup`].
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("download", "download a video: <url> [video|audio] [low|medium|hd|original]"),
        BotCommand::new("help", "show usage and supported sites"),
    ])
    .await?;

    Ok(())
}

pub fn is_private_chat(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

/// Checks if a message is addressed to the bot
///
/// # Returns
/// * `true` if message is addressed to bot (private chat, bot mention, reply to bot message)
/// * `false` if message is not addressed to bot
pub fn is_message_addressed_to_bot(msg: &Message, bot_username: Option<&str>, bot_id: UserId) -> bool {
    // In private chats, all messages are addressed to the bot
    if is_private_chat(msg) {
        return true;
    }

    if let Some(reply_to) = msg.reply_to_message() {
        if reply_to.from.as_ref().is_some_and(|from| from.id == bot_id) {
            return true;
        }
    }

    match (msg.text(), bot_username) {
        (Some(text), Some(username)) => text.contains(&format!("@{}", username)),
        _ => false,
    }
}
