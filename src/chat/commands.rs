//! Slash command parsing for the chat application.
//!
//! Lines starting with `/` control the application and are never sent to the
//! remote service.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Ingest a document and start a new session grounded in it.
    Load(String),

    /// Start a new session on the same document and clear the conversation.
    Reset,

    /// Reprint the conversation.
    History,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a message.
///
/// # Examples
///
/// ```
/// # use concierge::chat::{parse_command, ChatCommand};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/load menu.md"), Some(ChatCommand::Load("menu.md".into())));
/// assert!(parse_command("Is the pudding gluten free?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "config" => ChatCommand::ShowConfig,
        "reset" | "clear" => ChatCommand::Reset,
        "history" => ChatCommand::History,
        "load" | "upload" => match argument {
            Some(arg) => ChatCommand::Load(arg.to_string()),
            None => ChatCommand::Invalid("/load requires a file path".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /load <file>           Ground the conversation in a text file (.txt or .md)
  /reset                 Start over with the same document
  /history               Show the conversation so far
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl-C while a reply is streaming to stop it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_load() {
        assert_eq!(
            parse_command("/load  menus/christmas.md "),
            Some(ChatCommand::Load("menus/christmas.md".to_string()))
        );
        assert_eq!(
            parse_command("/upload notes.txt"),
            Some(ChatCommand::Load("notes.txt".to_string()))
        );
        assert!(matches!(parse_command("/load"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/reset"), Some(ChatCommand::Reset));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::Reset));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/model gemini-2.5-pro"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert!(parse_command("What time do you close?").is_none());
        assert!(parse_command("").is_none());
        assert!(parse_command("price / person?").is_none());
    }

    #[test]
    fn help_text_lists_commands() {
        let help = help_text();
        for command in ["/load", "/reset", "/history", "/config", "/help", "/quit"] {
            assert!(help.contains(command), "missing {command}");
        }
    }
}
