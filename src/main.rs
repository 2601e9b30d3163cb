// ABOUTME: CLI entry point for image-asset-migrator
// ABOUTME: Parses commands and routes to appropriate handlers

use clap::{Parser, Subcommand};
use image_asset_migrator::commands;
use image_asset_migrator::config::{
    MigrationConfig, RepositoryConfig, DEFAULT_IMAGE_CONTENT_TYPE, DEFAULT_IMPORT_USER_ID,
    DEFAULT_LANGUAGE, DEFAULT_LIMIT, DEFAULT_MAX_RETRIES, DEFAULT_PUBLIC_DIR,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "image-asset-migrator")]
#[command(about = "Copies image field contents into linked image objects referenced by an image asset field", long_about = None)]
#[command(version)]
struct Cli {
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy image field contents to an image asset field
    Migrate {
        /// Identifier of the content type whose objects are modified
        type_identifier: String,
        /// Source (image) field identifier
        source_field: String,
        /// Target (image asset) field identifier
        target_field: String,
        /// Location id under which image objects are created
        target_location: u64,
        /// Repository REST API root (falls back to the saved repository URL)
        #[arg(long, env = "IMAGE_ASSET_REPOSITORY_URL")]
        repository_url: Option<String>,
        /// Login used to authenticate against the repository
        #[arg(long, env = "IMAGE_ASSET_REPOSITORY_LOGIN")]
        login: Option<String>,
        /// Password used to authenticate against the repository
        #[arg(long, env = "IMAGE_ASSET_REPOSITORY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Id of the user the migration runs as
        #[arg(long, default_value_t = DEFAULT_IMPORT_USER_ID)]
        user_id: u64,
        /// Language code for created images and updated versions
        #[arg(long, default_value = DEFAULT_LANGUAGE)]
        language: String,
        /// Content type identifier of the image objects
        #[arg(long, default_value = DEFAULT_IMAGE_CONTENT_TYPE)]
        image_content_type: String,
        /// Maximum number of objects processed in one run
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        /// Directory image uris are resolved against
        #[arg(long, default_value = DEFAULT_PUBLIC_DIR)]
        public_dir: PathBuf,
        /// HTTP request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        /// Retries for failed read requests
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
        /// Show what would change without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Manage the saved repository URL
    Repository {
        #[command(flatten)]
        args: commands::repository::RepositoryArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // 1. RUST_LOG environment variable has highest precedence
    // 2. --log flag is used if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Migrate {
            type_identifier,
            source_field,
            target_field,
            target_location,
            repository_url,
            login,
            password,
            user_id,
            language,
            image_content_type,
            limit,
            public_dir,
            timeout,
            max_retries,
            dry_run,
            yes,
        } => {
            let mut migration = MigrationConfig::new(
                type_identifier,
                source_field,
                target_field,
                target_location,
            );
            migration.import_user_id = user_id;
            migration.language = language;
            migration.image_content_type = image_content_type;
            migration.limit = limit;
            migration.public_dir = public_dir;
            migration.dry_run = dry_run;
            // Fail on bad arguments before touching the state file or network
            migration.validate()?;

            let base_url = image_asset_migrator::state::resolve_repository_url(repository_url)?;
            let mut repository = RepositoryConfig::new(base_url).with_credentials(login, password);
            repository.timeout = Duration::from_secs(timeout);
            repository.max_retries = max_retries;

            commands::migrate(commands::MigrateOptions {
                migration,
                repository,
                yes,
            })
            .await
        }
        Commands::Repository { args } => commands::repository(args).await,
    }
}
