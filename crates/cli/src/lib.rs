// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! lxcli - command-line front end for the lx messaging client.

mod cli;
mod commands;
pub mod error;
pub mod logging;

pub use cli::{Cli, Command};
pub use error::{Error, Result};

/// Execute a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Run { sender, log_file } => {
            logging::setup_logging(log_file.as_deref(), "info");
            let config = commands::load_config(config_path.as_deref())?;
            runtime()?.block_on(commands::run::run(config, &sender))
        }
        Command::Send {
            receiver,
            text,
            sender,
            conversation,
            wait,
        } => {
            logging::setup_logging(None, "warn");
            let config = commands::load_config(config_path.as_deref())?;
            let conversation = conversation.unwrap_or_else(|| receiver.clone());
            let draft = lx_core::MessageDraft::text(conversation, sender, receiver, text);
            runtime()?.block_on(commands::send::run(
                config,
                draft,
                std::time::Duration::from_secs(wait),
            ))
        }
        Command::CheckConfig => commands::check_config::run(config_path.as_deref()),
        Command::History {
            conversation,
            limit,
            offset,
        } => {
            let config = commands::load_config(config_path.as_deref())?;
            commands::history::run(&config, &conversation, limit, offset)
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
