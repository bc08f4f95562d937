//! Main chat loop orchestration.
//!
//! Opens (or resumes) a session, then alternates between reading a line and
//! streaming the engine's reply. While a reply streams the loop keeps reading
//! keys so Ctrl+C can cancel it.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline_async::SharedWriter;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use bluebox_core::session::{SessionListController, TurnOutcome};
use bluebox_infra::sqlite::session::SqliteSessionRepository;
use bluebox_types::chat::{OwnerId, SessionId};
use bluebox_types::error::EngineError;
use bluebox_types::event::SessionEvent;

use crate::cli::session::session_table;
use crate::state::{AppState, ChatEngine};

use super::banner::{short_id, write_welcome_banner};
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::{StreamPrinter, write_transcript};

/// How `bluebox chat` was invoked.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub owner: Option<String>,
    pub session_id: Option<String>,
    /// Skip resuming the most recent session.
    pub fresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

type SessionList = SessionListController<SqliteSessionRepository>;

/// Everything one chat surface needs between turns.
struct ChatView {
    engine: Arc<ChatEngine>,
    list: Option<(Arc<SessionList>, OwnerId)>,
    out: SharedWriter,
}

/// Run the interactive chat loop.
pub async fn run_chat_loop(state: &AppState, options: ChatOptions) -> anyhow::Result<()> {
    let owner = options.owner.map(OwnerId::new);
    let engine = state.engine(owner.clone())?;

    if let Some(id) = options.session_id.as_deref() {
        if !engine.load_session(&SessionId::new(id)).await {
            anyhow::bail!("Session '{id}' not found for this user");
        }
    } else if !options.fresh && owner.is_some() {
        if let Some(id) = engine.resume_latest().await {
            info!(session_id = %id, "resumed latest session");
        }
    }

    let mut listener: Option<JoinHandle<()>> = None;
    let list = owner.map(|owner| {
        let controller = Arc::new(SessionListController::new(state.sessions.clone()));
        listener = Some(
            Arc::clone(&controller).spawn_listener(engine.subscribe(), owner.clone()),
        );
        (controller, owner)
    });

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut input, out) = ChatInput::new(prompt)
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;
    let mut view = ChatView { engine, list, out };

    let snapshot = view.engine.snapshot().await;
    write_welcome_banner(
        &mut view.out,
        snapshot.owner.as_ref(),
        snapshot.session_id.as_ref(),
        &state.config.generation.endpoint,
    )?;
    if !snapshot.messages.is_empty() {
        write_transcript(&mut view.out, &snapshot.messages)?;
        writeln!(view.out)?;
    }

    loop {
        let flow = match input.read_line().await {
            InputEvent::Eof => Flow::Exit,
            InputEvent::Interrupted => {
                writeln!(
                    view.out,
                    "  {}",
                    style("Press Ctrl+D to exit, or keep chatting.").dim()
                )?;
                Flow::Continue
            }
            InputEvent::Message(text) if text.is_empty() => Flow::Continue,
            InputEvent::Message(text) => match commands::parse(&text) {
                Some(command) => run_command(&mut view, &mut input, command).await?,
                None => stream_turn(&mut view, &mut input, text).await?,
            },
        };
        if flow == Flow::Exit {
            break;
        }
    }

    writeln!(view.out, "\n  {}", style("Session ended.").dim())?;
    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some((controller, _)) = &view.list {
        controller.clear();
    }
    input.flush();
    Ok(())
}

async fn run_command(
    view: &mut ChatView,
    input: &mut ChatInput,
    command: ChatCommand,
) -> anyhow::Result<Flow> {
    match command {
        ChatCommand::Help => commands::write_help(&mut view.out)?,
        ChatCommand::Clear => input.clear(),
        ChatCommand::Exit => return Ok(Flow::Exit),
        ChatCommand::New => {
            view.engine.new_session().await;
            writeln!(
                view.out,
                "\n  {} Started a new conversation.\n",
                style("*").cyan().bold()
            )?;
        }
        ChatCommand::History => {
            let snapshot = view.engine.snapshot().await;
            writeln!(view.out)?;
            write_transcript(&mut view.out, &snapshot.messages)?;
            writeln!(view.out)?;
        }
        ChatCommand::Sessions => match &view.list {
            Some((controller, owner)) => {
                controller.refresh(owner).await;
                let sessions = controller.sessions();
                if sessions.is_empty() {
                    writeln!(view.out, "\n  {}\n", style("No saved conversations yet.").dim())?;
                } else {
                    writeln!(view.out, "\n{}\n", session_table(&sessions))?;
                }
            }
            None => write_signed_out_hint(&mut view.out)?,
        },
        ChatCommand::Load(target) => match &view.list {
            Some((controller, _)) => {
                let session_id = resolve_session_ref(controller, &target);
                if view.engine.load_session(&session_id).await {
                    let snapshot = view.engine.snapshot().await;
                    writeln!(
                        view.out,
                        "\n  {} Opened {}\n",
                        style("*").cyan().bold(),
                        style(short_id(session_id.as_str())).dim()
                    )?;
                    write_transcript(&mut view.out, &snapshot.messages)?;
                    writeln!(view.out)?;
                } else {
                    writeln!(
                        view.out,
                        "\n  {} No saved conversation '{}'.\n",
                        style("?").yellow().bold(),
                        style(target).dim()
                    )?;
                }
            }
            None => write_signed_out_hint(&mut view.out)?,
        },
        ChatCommand::Unknown(name) => {
            writeln!(
                view.out,
                "\n  {} Unknown command: {}. Type /help for available commands.\n",
                style("?").yellow().bold(),
                style(name).dim()
            )?;
        }
    }
    Ok(Flow::Continue)
}

/// A 1-based number picks from the last listing; anything else is an ID.
fn resolve_session_ref(controller: &SessionList, target: &str) -> SessionId {
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| controller.sessions().get(index).map(|s| s.id.clone()))
        .unwrap_or_else(|| SessionId::new(target))
}

fn write_signed_out_hint(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        out,
        "\n  {} Saved conversations need a user. Restart with {}.\n",
        style("i").blue().bold(),
        style("bluebox chat --user <id>").yellow()
    )
}

/// Send one message and render the reply as it streams.
async fn stream_turn(
    view: &mut ChatView,
    input: &mut ChatInput,
    text: String,
) -> anyhow::Result<Flow> {
    let mut events = view.engine.subscribe();
    let spinner = thinking_spinner();
    let mut printer = StreamPrinter::default();
    let mut flow = Flow::Continue;
    let mut events_open = true;
    let mut input_open = true;

    let engine = Arc::clone(&view.engine);
    let mut turn = tokio::spawn(async move { engine.send(&text).await });

    let joined = loop {
        tokio::select! {
            joined = &mut turn => break joined,
            event = events.recv(), if events_open => match event {
                Ok(event) => render_event(&mut view.out, &spinner, &mut printer, event)?,
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "chat view lagged behind engine events"),
                Err(RecvError::Closed) => events_open = false,
            },
            line = input.read_line(), if input_open => match line {
                InputEvent::Interrupted => {
                    view.engine.cancel().await;
                }
                InputEvent::Eof => {
                    view.engine.cancel().await;
                    input_open = false;
                    flow = Flow::Exit;
                }
                InputEvent::Message(m) if m.is_empty() => {}
                InputEvent::Message(_) => {
                    spinner.suspend(|| {
                        writeln!(
                            view.out,
                            "\n  {}",
                            style("A reply is still streaming; press Ctrl+C to stop it.").dim()
                        )
                    })?;
                }
            },
        }
    };

    while let Ok(event) = events.try_recv() {
        render_event(&mut view.out, &spinner, &mut printer, event)?;
    }
    spinner.finish_and_clear();
    printer.finish(&mut view.out)?;

    match joined.context("chat turn task failed")? {
        Ok(TurnOutcome::Completed { .. }) => writeln!(view.out)?,
        Ok(TurnOutcome::Faulted { .. }) => writeln!(
            view.out,
            "  {}\n",
            style("Type a message to retry, /exit to quit.").dim()
        )?,
        Ok(TurnOutcome::Abandoned) => writeln!(
            view.out,
            "\n  {}\n",
            style("Stopped. The partial reply was discarded.").dim()
        )?,
        Err(EngineError::Busy { state }) => writeln!(
            view.out,
            "\n  {} Still busy ({state}); try again in a moment.\n",
            style("!").yellow().bold()
        )?,
        Err(e) => writeln!(view.out, "\n  {} {e}\n", style("!").red().bold())?,
    }
    Ok(flow)
}

fn render_event(
    out: &mut impl Write,
    spinner: &ProgressBar,
    printer: &mut StreamPrinter,
    event: SessionEvent,
) -> std::io::Result<()> {
    match event {
        SessionEvent::ProgressiveText { text } => {
            spinner.finish_and_clear();
            printer.render(out, &text)
        }
        SessionEvent::SendFailed { error } => {
            spinner.finish_and_clear();
            printer.finish(out)?;
            writeln!(out, "\n  {} {error}", style("!").red().bold())
        }
        SessionEvent::PersistenceFailed { operation, error } => {
            if printer.is_started() {
                writeln!(out)?;
            }
            writeln!(
                out,
                "  {} Not saved ({operation}): {}",
                style("!").yellow().bold(),
                style(error).dim()
            )
        }
        _ => Ok(()),
    }
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
