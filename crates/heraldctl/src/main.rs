/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! heraldctl - command-line front end for the Herald dispatch queue.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use config::ConfigLoader;

/// Herald - announces changed page URLs to a URL notification API
#[derive(Parser)]
#[command(name = "heraldctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (can also be set via HERALD_CONFIG environment variable)
    #[arg(short, long, env = "HERALD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the batch scheduler until interrupted
    Run,

    /// Queue a URL, or a path relative to site_base_url
    Enqueue {
        url: String,

        /// Identifier of the content behind the URL
        #[arg(long)]
        subject: Option<String>,

        /// Re-announce a URL that already succeeded or was dead-lettered
        #[arg(long)]
        force: bool,
    },

    /// Run a single batch now
    Dispatch,

    /// Print queue metrics and health
    Status,

    /// Remove succeeded and dead-lettered entries
    Prune {
        /// Remove entries older than this duration (e.g., "30d", "7d", "24h")
        #[arg(long)]
        older_than: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = ConfigLoader::new()
        .load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let engine = commands::build_engine(&config).await?;

    match cli.command {
        Commands::Run => commands::run::run(engine).await?,
        Commands::Enqueue {
            url,
            subject,
            force,
        } => {
            commands::enqueue::run(
                engine,
                config.dispatch.site_base_url.as_deref(),
                &url,
                subject.as_deref(),
                force,
            )
            .await?
        }
        Commands::Dispatch => commands::dispatch::run(engine).await?,
        Commands::Status => commands::status::run(engine).await?,
        Commands::Prune { older_than } => {
            commands::prune::run(engine, older_than.as_deref()).await?
        }
    }

    Ok(())
}
