// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Outpost CLI
//!
//! Command-line interface for the Outpost cross-process invocation
//! subsystem.

use clap::{Parser, Subcommand};

mod commands;

/// Outpost - transparent method invocation across process boundaries
#[derive(Parser)]
#[command(name = "outpost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Spawn a worker domain and run a scripted demonstration
    Demo {
        /// Domain name used for the rendezvous [default: calc]
        #[arg(short, long)]
        name: Option<String>,

        /// Worker binary (defaults to outpost-worker next to this binary)
        #[arg(short, long)]
        worker: Option<String>,
    },

    /// Spawn a worker domain and invoke a single method
    Call {
        /// Fully qualified method path, e.g. calc::add
        method: String,

        /// Arguments as a JSON array, e.g. '[2, 3]'
        #[arg(default_value = "[]")]
        args: String,

        /// Domain name used for the rendezvous [default: calc]
        #[arg(short, long)]
        name: Option<String>,

        /// Worker binary (defaults to outpost-worker next to this binary)
        #[arg(short, long)]
        worker: Option<String>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Demo { name, worker } => {
            commands::demo::execute(cli.config.as_deref(), name.as_deref(), worker.as_deref())
                .await
        }
        Commands::Call {
            method,
            args,
            name,
            worker,
        } => {
            commands::call::execute(
                cli.config.as_deref(),
                name.as_deref(),
                worker.as_deref(),
                &method,
                &args,
            )
            .await
        }
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
