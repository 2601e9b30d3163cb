// ABOUTME: Library entry point for image-asset-migrator
// ABOUTME: Exposes the repository client, migration loop, and CLI command handlers

pub mod commands;
pub mod config;
pub mod migration;
pub mod repository;
pub mod state;
pub mod utils;

pub use config::{MigrationConfig, RepositoryConfig};
pub use migration::{migrate, MigrationReport};
pub use repository::{ContentRepository, RepositoryError, RestRepository};
