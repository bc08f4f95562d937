//! Bluebox CLI entry point.
//!
//! Binary name: `bluebox`
//!
//! Parses CLI arguments, initializes tracing, the database and config, then
//! dispatches to the command handler.

mod cli;
mod state;

use bluebox_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "bluebox", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Chat { user, session, new } => {
            let options = cli::chat::loop_runner::ChatOptions {
                owner: user,
                session_id: session,
                fresh: new,
            };
            cli::chat::loop_runner::run_chat_loop(&state, options).await
        }
        Commands::Sessions { user } => cli::session::list_sessions(&state, &user, cli.json).await,
        Commands::Show { session_id } => {
            cli::session::show_session(&state, &session_id, cli.json).await
        }
        // Handled before state initialization.
        Commands::Completions { .. } => Ok(()),
    }
}
