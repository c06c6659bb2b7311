//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError};
use crate::core::error::AppError;
use crate::prompt::AnswerOutcome;
use crate::telegram::bot::is_message_addressed_to_bot;
use crate::telegram::commands::{extract_url, help_text, parse_command, DownloadArgs, ParsedCommand};
use crate::telegram::downloads::{parse_prompt_callback, report_error, run_download};
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and can be used in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Commands and links
        .branch(message_handler(deps_messages))
        // Prompt button presses
        .branch(callback_handler(deps_callback))
}

/// What a text message asks the bot to do.
#[derive(Debug)]
enum Intent {
    Command(ParsedCommand),
    Invalid(AppError),
    Ignore,
}

fn message_intent(text: &str, deps: &HandlerDeps, addressed_plainly: bool) -> Intent {
    match parse_command(text, &deps.prefix, deps.bot_username.as_deref()) {
        Some(Ok(command)) => Intent::Command(command),
        Some(Err(e)) => Intent::Invalid(e),
        // Bare links only count where the bot is clearly being talked to
        None if addressed_plainly => match extract_url(text) {
            Some(url) => Intent::Command(ParsedCommand::Download(DownloadArgs::url_only(url))),
            None => Intent::Ignore,
        },
        None => Intent::Ignore,
    }
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let deps = deps.clone();
        async move { handle_message(bot, msg, deps).await }
    })
}

async fn handle_message(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let addressed = is_message_addressed_to_bot(&msg, deps.bot_username.as_deref(), deps.bot_id);

    match message_intent(text, &deps, addressed) {
        Intent::Command(ParsedCommand::Start) | Intent::Command(ParsedCommand::Help) => {
            bot.send_message(msg.chat.id, help_text(&deps.prefix)).await?;
        }
        Intent::Command(ParsedCommand::Download(args)) => {
            log::info!("Download request in chat {}: {}", msg.chat.id, args.url);
            tokio::spawn(run_download(bot, deps, msg, args));
        }
        Intent::Invalid(e) => report_error(&bot, msg.chat.id, &e).await,
        Intent::Ignore => {}
    }
    Ok(())
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query()
        .filter(|q: CallbackQuery| q.data.as_deref().and_then(parse_prompt_callback).is_some())
        .endpoint(move |bot: Bot, q: CallbackQuery| {
            let deps = deps.clone();
            async move { handle_prompt_callback(bot, q, deps).await }
        })
}

async fn handle_prompt_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some((prompt_id, value)) = q.data.as_deref().and_then(parse_prompt_callback) else {
        return Ok(());
    };
    let notice = match deps.prompts.answer(prompt_id, q.from.id.0, value.to_string()) {
        AnswerOutcome::Accepted => None,
        AnswerOutcome::NotOwner => Some("Only the person who asked can choose."),
        AnswerOutcome::Closed => Some("This prompt has expired."),
    };

    let mut reply = bot.answer_callback_query(q.id.clone());
    if let Some(text) = notice {
        reply = reply.text(text);
    }
    reply.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::UploadSink;
    use crate::download::Downloader;
    use teloxide::types::UserId;

    fn deps(prefix: &str) -> HandlerDeps {
        let mut deps = HandlerDeps::new(
            Downloader::ytdlp(),
            UploadSink::new(reqwest::Client::new(), "http://localhost/upload"),
            Some("relay_bot".to_string()),
            UserId(1),
        );
        deps.prefix = prefix.to_string();
        deps
    }

    #[test]
    fn test_command_intent() {
        let deps = deps("!");
        assert!(matches!(
            message_intent("!help", &deps, false),
            Intent::Command(ParsedCommand::Help)
        ));
        assert!(matches!(
            message_intent("!download", &deps, false),
            Intent::Invalid(AppError::Usage(_))
        ));
    }

    #[test]
    fn test_bare_link_only_when_addressed() {
        let deps = deps("/");
        let text = "https://youtu.be/AbCdEfGhIjK";
        match message_intent(text, &deps, true) {
            Intent::Command(ParsedCommand::Download(args)) => assert_eq!(args, DownloadArgs::url_only(text)),
            other => panic!("unexpected intent: {:?}", other),
        }
        assert!(matches!(message_intent(text, &deps, false), Intent::Ignore));
        assert!(matches!(message_intent("just chatting", &deps, true), Intent::Ignore));
    }
}
