// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Exports the migrate command and the saved repository URL commands

pub mod migrate;
pub mod repository;

pub use migrate::{migrate, MigrateOptions};
pub use repository::command as repository;
