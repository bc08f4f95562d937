//! Session browsing commands: list and show.

use anyhow::{Context, Result};
use bluebox_core::session::PersistenceGateway;
use bluebox_types::chat::{ChatSession, OwnerId, SessionId};
use chrono::{DateTime, Local, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use super::chat::renderer::write_transcript;
use crate::state::AppState;

/// List an owner's sessions, most recently updated first.
///
/// ```bash
/// bluebox sessions --user patient-1
/// bluebox sessions --user patient-1 --json
/// ```
pub async fn list_sessions(state: &AppState, user: &str, json: bool) -> Result<()> {
    let owner = OwnerId::new(user);
    let sessions = state.sessions.list_sessions(&owner).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions found for '{}'. Start one with: {}",
            style("i").blue().bold(),
            style(user).cyan(),
            style(format!("bluebox chat --user {user}")).yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", session_table(&sessions));
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// Print a stored transcript.
///
/// ```bash
/// bluebox show <session-id>
/// bluebox show <session-id> --json
/// ```
pub async fn show_session(state: &AppState, session_id: &str, json: bool) -> Result<()> {
    let session = state
        .sessions
        .get_session(&SessionId::new(session_id))
        .await
        .with_context(|| format!("Session '{session_id}' not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&session.title).cyan().bold(),
        style(format!("({})", session.id)).dim()
    );
    println!(
        "  {}",
        style(format!(
            "created {}, updated {}",
            local_time(&session.created_at),
            local_time(&session.updated_at)
        ))
        .dim()
    );
    println!();
    let mut stdout = std::io::stdout();
    write_transcript(&mut stdout, &session.messages)?;
    println!();
    Ok(())
}

/// Table of sessions: title, last update, message count, ID.
pub fn session_table(sessions: &[ChatSession]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Title").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("ID").fg(Color::White),
    ]);

    for session in sessions {
        table.add_row(vec![
            Cell::new(&session.title).fg(Color::Cyan),
            Cell::new(local_time(&session.updated_at)).fg(Color::White),
            Cell::new(session.message_count().to_string()).fg(Color::White),
            Cell::new(session.id.as_str()).fg(Color::DarkGrey),
        ]);
    }
    table
}

fn local_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
