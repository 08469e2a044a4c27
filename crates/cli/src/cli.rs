// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

#[derive(Parser)]
#[command(name = "lx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Realtime messaging client")]
#[command(
    long_about = "Realtime messaging client.\n\n\
    Keeps a live connection to the messaging backend, queues messages while offline \
    and delivers them once the connection is back."
)]
pub struct Cli {
    /// Config file (default: <config dir>/lx/config.toml)
    #[arg(short = 'c', long = "config", global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect and stream events as JSON lines
    #[command(after_help = "\
Lines read from stdin are sent as text messages:
  <receiver_id> <text>

The receiver id doubles as the conversation id.")]
    Run {
        /// Sender id stamped on outgoing messages
        #[arg(long, value_parser = non_empty_string)]
        sender: String,

        /// Append logs to this file instead of stderr
        #[arg(long, value_name = "path")]
        log_file: Option<PathBuf>,
    },

    /// Send one text message
    #[command(after_help = "\
Examples:
  lx send --sender 7 12 \"hello\"            Send to user 12
  lx send --sender 7 12 \"hi\" --wait 0      Queue without waiting for delivery")]
    Send {
        /// Receiver id
        #[arg(value_parser = non_empty_string)]
        receiver: String,

        /// Message text
        #[arg(value_parser = non_empty_string)]
        text: String,

        /// Sender id
        #[arg(long, value_parser = non_empty_string)]
        sender: String,

        /// Conversation id (defaults to the receiver id)
        #[arg(long)]
        conversation: Option<String>,

        /// Seconds to wait for the server to acknowledge
        #[arg(long, default_value_t = 30)]
        wait: u64,
    },

    /// Validate the config file
    CheckConfig,

    /// Print stored messages of a conversation, newest first
    History {
        /// Conversation id
        #[arg(value_parser = non_empty_string)]
        conversation: String,

        /// Maximum messages to print
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,

        /// Skip this many of the newest messages
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
