//! Maps inbound chat text to bot commands

pub const GET_SIGNAL_BUTTON: &str = "🎯 Get Signal";
pub const WELCOME_TEXT: &str = "🚀 AVIATOR BOT 🚀\n\nPress the button below to receive your signal:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    GetSignal,
}

pub fn parse_command(text: &str) -> Option<BotCommand> {
    if text == GET_SIGNAL_BUTTON {
        return Some(BotCommand::GetSignal);
    }

    // "/start", "/start@SomeBot", "/start payload"
    let first = text.split_whitespace().next()?;
    let command = first.split('@').next()?;
    match command {
        "/start" => Some(BotCommand::Start),
        _ => None,
    }
}
