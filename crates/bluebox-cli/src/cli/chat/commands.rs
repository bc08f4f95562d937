//! Slash commands available inside the chat loop.

use std::io::{self, Write};

use console::style;

#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    Help,
    Clear,
    Exit,
    /// Leave the current conversation and start an empty one.
    New,
    /// List the signed-in user's sessions.
    Sessions,
    /// Open a stored session by ID or by its number in the last `/sessions`
    /// listing.
    Load(String),
    /// Reprint the conversation so far.
    History,
    Unknown(String),
}

/// Parse a line as a slash command. `None` when the line is a chat message.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/clear" | "/cls" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/new" => ChatCommand::New,
        "/sessions" | "/ls" => ChatCommand::Sessions,
        "/history" => ChatCommand::History,
        "/load" | "/open" if arg.is_empty() => {
            ChatCommand::Unknown("/load requires a session ID or number".to_string())
        }
        "/load" | "/open" => ChatCommand::Load(arg.to_string()),
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(command)
}

pub fn write_help(out: &mut impl Write) -> io::Result<()> {
    let rows = [
        ("/help", "Show this help message"),
        ("/clear", "Clear the screen"),
        ("/exit", "End the chat"),
        ("/new", "Start a new conversation"),
        ("/sessions", "List your saved conversations"),
        ("/load <id|n>", "Open a saved conversation"),
        ("/history", "Show this conversation again"),
    ];

    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    for (name, about) in rows {
        writeln!(out, "  {:<14}{about}", style(name).cyan())?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "  {}",
        style("Ctrl+C stops a streaming reply, Ctrl+D exits").dim()
    )?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert_eq!(parse("/help"), Some(ChatCommand::Help));
        assert_eq!(parse("/h"), Some(ChatCommand::Help));
        assert_eq!(parse("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn test_parse_exit() {
        assert_eq!(parse("/exit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/QUIT"), Some(ChatCommand::Exit));
        assert_eq!(parse("/q"), Some(ChatCommand::Exit));
    }

    #[test]
    fn test_parse_load() {
        assert_eq!(
            parse("/load  0190-abc "),
            Some(ChatCommand::Load("0190-abc".to_string()))
        );
        assert_eq!(parse("/open 2"), Some(ChatCommand::Load("2".to_string())));
        assert!(matches!(parse("/load"), Some(ChatCommand::Unknown(_))));
    }

    #[test]
    fn test_parse_session_commands() {
        assert_eq!(parse("/new"), Some(ChatCommand::New));
        assert_eq!(parse("/sessions"), Some(ChatCommand::Sessions));
        assert_eq!(parse("/history"), Some(ChatCommand::History));
    }

    #[test]
    fn test_parse_not_command() {
        assert_eq!(parse("my head hurts /help"), None);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse("/foo bar"), Some(ChatCommand::Unknown("/foo".to_string())));
    }

    #[test]
    fn help_lists_every_command() {
        let mut out = Vec::new();
        write_help(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for name in ["/help", "/clear", "/exit", "/new", "/sessions", "/load", "/history"] {
            assert!(text.contains(name), "missing {name}");
        }
    }
}
