//! fintrack-offline entry point.
//!
//! Command results are printed as JSON on stdout. Logging goes to stderr so
//! the output stays machine-readable.

use anyhow::Result;
use clap::Parser;
use fintrack_core::AppConfig;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    tracing::debug!(generation = %config.generation, scope = %config.scope, "configuration loaded");

    let store = commands::open_store(&config, cli.in_memory).await?;
    let fetcher = commands::http_fetcher(&config)?;
    let controller = commands::controller(&config, fetcher, store.clone())?;

    match cli.command {
        Command::Install => print_json(&commands::install(&controller).await?),
        Command::Fetch { url, navigate, method, body } => {
            let request = commands::build_request(&url, &method, navigate)?;
            let disposition = commands::fetch(&controller, &request).await?;
            match disposition.response() {
                Some(response) if body => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&response.body).await?;
                    stdout.flush().await?;
                    Ok(())
                }
                _ => print_json(&commands::FetchSummary::from(&disposition)),
            }
        }
        Command::Keys => print_json(&commands::keys(&controller).await?),
        Command::Generations => print_json(&commands::generations(&config, store.as_ref()).await?),
        Command::Purge { generation } => {
            print_json(&commands::purge(&controller, store.as_ref(), generation.as_deref()).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
