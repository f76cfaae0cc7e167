// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for Shoplens.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shoplens - analytics assistant for your Shopify store
#[derive(Parser, Debug)]
#[command(name = "shoplens")]
#[command(version, about = "Analytics assistant for your Shopify store")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Fetch store records directly, without the assistant
    Fetch(FetchArgs),

    /// Show or write configuration
    #[command(alias = "config")]
    Settings(SettingsArgs),
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Initial question (optional)
    pub prompt: Option<String>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the assistant's reasoning after each answer
    #[arg(long)]
    pub show_thoughts: bool,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: String,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the assistant's reasoning after the answer
    #[arg(long)]
    pub show_thoughts: bool,
}

/// Arguments for the fetch subcommand
#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Resource to fetch (orders, products, customers)
    pub resource: String,

    /// Page size (1-250)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=250))]
    pub limit: Option<u32>,

    /// Query filter as key=value (repeatable)
    #[arg(short, long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Maximum pages to follow
    #[arg(long)]
    pub max_pages: Option<u32>,
}

impl FetchArgs {
    /// Split `key=value` filters, rejecting entries without `=`.
    pub fn parsed_filters(&self) -> Result<Vec<(String, String)>, String> {
        self.filters
            .iter()
            .map(|f| match f.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    Ok((key.trim().to_string(), value.trim().to_string()))
                }
                _ => Err(format!("invalid filter '{}', expected KEY=VALUE", f)),
            })
            .collect()
    }
}

/// Arguments for settings management
#[derive(clap::Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: Option<SettingsCommands>,
}

/// Settings subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show the effective settings (secrets redacted)
    Show,

    /// Print the settings file path
    Path,

    /// Write the default settings file if none exists
    Init,
}

/// Output format options
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}
