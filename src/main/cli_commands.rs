// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};
use serde_json::Map;

use shoplens::chat::display::{
    format_fetch_summary, format_history_entry, format_session_item, format_welcome,
};
use shoplens::chat::{AppContext, ChatReply, ChatService};
use shoplens::cli::{AskArgs, ChatArgs, FetchArgs, OutputFormat, SettingsArgs, SettingsCommands};
use shoplens::config::Settings;
use shoplens::error::{Result, ShoplensError};
use shoplens::resilience::TokenBucket;
use shoplens::store::{FetchParams, Resource, StoreClient, StoreClientConfig};
use shoplens::utils::{self, is_exit_command};

const REDACTED: &str = "********";

/// Load settings from `--config` or the default location.
pub(super) fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

fn with_model(mut settings: Settings, model: Option<String>) -> Settings {
    if let Some(model) = model {
        settings.model.model = model;
    }
    settings
}

pub(super) async fn run_ask(args: AskArgs, settings: Settings, format: OutputFormat) -> Result<()> {
    let context = AppContext::from_settings(with_model(settings, args.model))?;
    let chat = ChatService::new(Arc::new(context));
    let session_id = chat.start_session().await?;

    let reply = chat.send(session_id, &args.prompt).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reply)?),
        OutputFormat::Text => print_reply(&reply, args.show_thoughts)?,
    }
    Ok(())
}

pub(super) async fn run_chat(args: ChatArgs, settings: Settings) -> Result<()> {
    let context = AppContext::from_settings(with_model(settings, args.model))?;
    let chat = ChatService::new(Arc::new(context));
    let mut session_id = chat.start_session().await?;

    print!(
        "{}",
        format_welcome(
            chat.context().provider.name(),
            &chat.context().settings.model.model,
            &chat.context().store_url(),
            &session_id.to_string(),
        )
    );

    let mut pending = args.prompt;
    loop {
        let input = match pending.take() {
            Some(prompt) => prompt,
            None => read_user_input()?,
        };
        if input.is_empty() {
            continue;
        }
        if is_exit_command(&input) {
            break;
        }
        if input.starts_with('/') {
            let (command, argument) = input.split_once(' ').unwrap_or((input.as_str(), ""));
            let argument = argument.trim();
            match command {
                "/history" => {
                    for message in chat.history(session_id).await? {
                        println!("{}", format_history_entry(&message));
                    }
                    continue;
                }
                "/sessions" => {
                    let conversations = if argument.is_empty() {
                        chat.sessions(20).await
                    } else {
                        chat.search_sessions(argument).await
                    };
                    for conversation in conversations {
                        println!("{}", format_session_item(&conversation, conversation.id == session_id));
                    }
                    continue;
                }
                "/switch" => {
                    match chat.resolve_session(argument).await {
                        Ok(id) => {
                            session_id = id;
                            println!("Switched to session {}", session_id);
                        }
                        Err(err) => print_error(&err)?,
                    }
                    continue;
                }
                "/delete" => {
                    match chat.resolve_session(argument).await {
                        Ok(id) => {
                            chat.delete_session(id).await;
                            println!("Deleted session {}", id);
                            if id == session_id {
                                session_id = chat.start_session().await?;
                                println!("Started session {}", session_id);
                            }
                        }
                        Err(err) => print_error(&err)?,
                    }
                    continue;
                }
                _ => {}
            }
        }

        match chat.send(session_id, &input).await {
            Ok(reply) => print_reply(&reply, args.show_thoughts)?,
            Err(err) => print_error(&err)?,
        }
    }
    Ok(())
}

pub(super) async fn run_fetch(args: FetchArgs, settings: Settings, format: OutputFormat) -> Result<()> {
    settings.validate()?;
    let resource: Resource = args.resource.parse()?;

    let mut filters = Map::new();
    for (key, value) in args.parsed_filters().map_err(ShoplensError::Validation)? {
        filters.insert(key, value.into());
    }
    let mut params = FetchParams::from_filters(&filters);
    if let Some(limit) = args.limit {
        params.set("limit", limit.to_string());
    }

    let limiter = TokenBucket::from_config(&settings.rate_limits).map(Arc::new);
    let client = StoreClient::new(StoreClientConfig::from_settings(&settings)?, limiter)?;
    let max_pages = args.max_pages.unwrap_or(settings.store.max_pages);
    let records = client.fetch(resource, params, max_pages).await;
    client.close();
    let records = records?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => print!("{}", format_fetch_summary(resource.as_str(), &records)),
    }
    Ok(())
}

pub(super) fn run_settings_command(
    args: SettingsArgs,
    settings: Settings,
    path: Option<&Path>,
) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_path);
    match args.command.unwrap_or(SettingsCommands::Show) {
        SettingsCommands::Show => {
            let mut shown = settings;
            if shown.store.access_token.is_some() {
                shown.store.access_token = Some(REDACTED.to_string());
            }
            if shown.model.api_key.is_some() {
                shown.model.api_key = Some(REDACTED.to_string());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        SettingsCommands::Path => println!("{}", path.display()),
        SettingsCommands::Init => {
            if path.exists() {
                println!("Settings already exist at {}", path.display());
            } else {
                Settings::default().save_to(&path)?;
                println!("Wrote default settings to {}", path.display());
            }
        }
    }
    Ok(())
}

fn read_user_input() -> Result<String> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok("/exit".to_string());
    }
    Ok(input.trim().to_string())
}

fn print_reply(reply: &ChatReply, show_thoughts: bool) -> Result<()> {
    let mut stdout = io::stdout();
    if show_thoughts {
        if let Some(thoughts) = &reply.thought_process {
            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
            println!("{}", thoughts.trim());
            stdout.execute(ResetColor)?;
        }
    }
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\nshoplens: ");
    stdout.execute(ResetColor)?;
    println!("{}\n", reply.message);
    Ok(())
}

fn print_error(err: &ShoplensError) -> Result<()> {
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(Color::Red))?;
    eprintln!("{}", utils::format_error(err));
    stderr.execute(ResetColor)?;
    Ok(())
}
