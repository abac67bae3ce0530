use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use client_core::{JokeState, JokeStore, JokesApi};
use shared::domain::JokeId;
use storage::{LocalJokeStore, SqliteSlotStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url, Settings};

/// Browse categories and keep a local list of saved jokes.
#[derive(Parser, Debug)]
#[command(name = "jokes")]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long, default_value = "jokes.toml")]
    config: PathBuf,
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List categories offered by the remote API
    Categories,
    /// Fetch a random joke in a category and save it
    Save { category: String },
    /// Show saved jokes
    List,
    /// Delete a saved joke by id
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = load_settings(&cli.config)?;
    if let Some(v) = cli.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = cli.database_url {
        settings.database_url = v;
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let slots = SqliteSlotStore::new(&database_url)
        .await
        .with_context(|| format!("failed to open joke storage at '{database_url}'"))?;
    let store = JokeStore::new(
        build_remote(&settings)?,
        LocalJokeStore::with_key(slots, settings.slot_key.clone()),
    );
    info!(api = %settings.api_base_url, %database_url, "jokes: store ready");

    match cli.command {
        Command::Categories => {
            store.load_categories().await;
            let state = finish(&store, "categories").await?;
            for category in state.categories {
                println!("{category}");
            }
        }
        Command::Save { category } => {
            store.save_joke(&category).await;
            let state = finish(&store, "save").await?;
            if let Some(joke) = state.jokes.last() {
                println!("saved {}: {}", joke.id, joke.text);
            }
        }
        Command::List => {
            store.load_jokes().await;
            let state = finish(&store, "list").await?;
            if state.jokes.is_empty() {
                println!("no saved jokes");
            }
            for joke in state.jokes {
                println!("{}\t[{}]\t{}", joke.id, joke.category, joke.text);
            }
        }
        Command::Delete { id } => {
            store.delete_joke(&JokeId::from(id)).await;
            let state = finish(&store, "delete").await?;
            println!("{} saved jokes remain", state.jokes.len());
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_remote(settings: &Settings) -> Result<JokesApi> {
    match settings.request_timeout_secs {
        Some(secs) => JokesApi::with_timeout(&settings.api_base_url, Duration::from_secs(secs))
            .context("failed to build http client"),
        None => Ok(JokesApi::new(&settings.api_base_url)),
    }
}

async fn finish<R, S>(store: &JokeStore<R, S>, command: &str) -> Result<JokeState>
where
    R: client_core::JokeSource,
    S: storage::SlotStore,
{
    let state = store.snapshot().await;
    if let Some(kind) = state.last_error {
        bail!("{command} failed ({kind:?}); run with -v for details");
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_log_levels() {
        assert_eq!(default_log_level(0), "warn");
        assert_eq!(default_log_level(2), "debug");
        assert_eq!(default_log_level(9), "trace");
    }

    #[test]
    fn parses_subcommands_and_global_flags() {
        let cli = Cli::try_parse_from(["jokes", "save", "animal", "-vv"]).expect("parse");
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Save { ref category } if category == "animal"));
    }

    #[test]
    fn timeout_setting_builds_client() {
        let settings = Settings {
            request_timeout_secs: Some(2),
            ..Settings::default()
        };
        let api = build_remote(&settings).expect("client");
        assert_eq!(api.base_url(), settings.api_base_url);
    }
}
