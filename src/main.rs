// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shoplens - analytics assistant for your Shopify store
//!
//! Entry point for the Shoplens CLI application.

use clap::Parser;

use shoplens::cli::{ChatArgs, Cli, Commands};
use shoplens::error::Result;

#[path = "main/cli_commands.rs"]
mod cli_commands;

use cli_commands::{load_settings, run_ask, run_chat, run_fetch, run_settings_command};

/// Crate targets raised to `debug` by `-v`
const VERBOSE_TARGETS: &[&str] = &[
    "shoplens.agent.loop",
    "shoplens.store.client",
    "shoplens.tools",
    "shoplens.resilience",
    "shoplens.config",
    "shoplens.history",
];

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` enables loop and client diagnostics; `RUST_LOG` still applies.
    if cli.verbose > 0 {
        let level = if cli.verbose > 1 { "trace" } else { "debug" };
        for target in VERBOSE_TARGETS {
            if let Ok(parsed) = format!("{}={}", target, level).parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        None => run_chat(ChatArgs::default(), settings).await,
        Some(Commands::Chat(args)) => run_chat(args, settings).await,
        Some(Commands::Ask(args)) => run_ask(args, settings, cli.format).await,
        Some(Commands::Fetch(args)) => run_fetch(args, settings, cli.format).await,
        Some(Commands::Settings(args)) => {
            run_settings_command(args, settings, cli.config.as_deref())
        }
    }
}
