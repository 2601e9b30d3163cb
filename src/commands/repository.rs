use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::state;
use crate::utils::{redact_url, validate_repository_url};

#[derive(Args)]
pub struct RepositoryArgs {
    #[command(subcommand)]
    command: RepositoryCommands,
}

#[derive(Subcommand)]
enum RepositoryCommands {
    /// Save the repository REST API URL
    Set {
        /// REST API root, e.g. https://cms.example.com/api/ezp/v2
        url: String,
    },
    /// Forget the saved repository URL
    Unset,
    /// Show the saved repository URL
    Get,
}

pub async fn command(args: RepositoryArgs) -> Result<()> {
    match args.command {
        RepositoryCommands::Set { url } => {
            validate_repository_url(&url)?;
            let mut state = state::load().context("Failed to load state")?;
            state.repository_url = Some(url.clone());
            state.updated_at = Some(chrono::Utc::now());
            state::save(&state).context("Failed to save state")?;
            println!("Repository URL set to: {}", redact_url(&url));
        }
        RepositoryCommands::Unset => {
            let mut state = state::load().context("Failed to load state")?;
            state.repository_url = None;
            state.updated_at = Some(chrono::Utc::now());
            state::save(&state).context("Failed to save state")?;
            println!("Repository URL unset.");
        }
        RepositoryCommands::Get => {
            let state = state::load().context("Failed to load state")?;
            match state.repository_url {
                Some(url) => {
                    println!("Current repository URL: {}", redact_url(&url));
                    if let Some(updated_at) = state.updated_at {
                        println!(
                            "Last updated: {}",
                            updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                        );
                    }
                }
                None => println!("Repository URL is not set."),
            }
        }
    }
    Ok(())
}
