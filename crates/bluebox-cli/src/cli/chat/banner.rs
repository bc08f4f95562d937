//! Welcome banner shown when a chat opens.

use std::io::{self, Write};

use bluebox_types::chat::{OwnerId, SessionId};
use console::style;

/// Print who is chatting, which session is open, and where replies come from.
pub fn write_welcome_banner(
    out: &mut impl Write,
    owner: Option<&OwnerId>,
    session_id: Option<&SessionId>,
    endpoint: &str,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {}", style("Bluebox").cyan().bold())?;
    writeln!(out, "  {}", style("Describe what's bothering you.").dim())?;
    writeln!(out)?;
    match owner {
        Some(owner) => writeln!(out, "  {}     {}", style("User:").bold(), style(owner).dim())?,
        None => writeln!(
            out,
            "  {}     {}",
            style("User:").bold(),
            style("anonymous (this chat will not be saved)").yellow()
        )?,
    }
    let session = session_id.map_or_else(|| "new".to_string(), |id| short_id(id.as_str()));
    writeln!(out, "  {}  {}", style("Session:").bold(), style(session).dim())?;
    writeln!(out, "  {} {}", style("Endpoint:").bold(), style(endpoint).dim())?;
    writeln!(out)?;
    writeln!(
        out,
        "  {}",
        style("Type /help for commands, Ctrl+C stops a reply, Ctrl+D exits").dim()
    )?;
    writeln!(out, "  {}", style("---").dim())?;
    writeln!(out)
}

/// First eight characters of an ID, char-safe.
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_banner_warns_about_persistence() {
        let mut out = Vec::new();
        write_welcome_banner(&mut out, None, None, "http://localhost:8000/chat").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("will not be saved"));
        assert!(text.contains("new"));
    }

    #[test]
    fn banner_shortens_session_id() {
        let mut out = Vec::new();
        let owner = OwnerId::new("patient-1");
        let id = SessionId::new("0190a1b2-c3d4-7e5f");
        write_welcome_banner(&mut out, Some(&owner), Some(&id), "http://x").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("patient-1"));
        assert!(text.contains("0190a1b2"));
        assert!(!text.contains("c3d4"));
    }

    #[test]
    fn short_id_handles_short_input() {
        assert_eq!(short_id("abc"), "abc");
    }
}
