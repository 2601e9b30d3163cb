// ABOUTME: migrate command - connects to the repository and runs the image migration
// ABOUTME: Confirms with the user before writing unless --yes or --dry-run is given

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};

use crate::config::{MigrationConfig, RepositoryConfig};
use crate::migration::{self, MigrationReport};
use crate::repository::{ContentRepository, RestRepository};
use crate::utils::redact_url;

pub struct MigrateOptions {
    pub migration: MigrationConfig,
    pub repository: RepositoryConfig,
    /// Skip the confirmation prompt
    pub yes: bool,
}

pub async fn migrate(opts: MigrateOptions) -> Result<()> {
    opts.repository.validate()?;

    tracing::info!(
        "Connecting to repository at {}",
        redact_url(&opts.repository.base_url)
    );
    let repo = RestRepository::new(&opts.repository)?;

    run(&repo, &opts.migration, opts.yes).await?;
    Ok(())
}

/// Prepare, confirm, execute, and summarize a migration against `repo`
pub async fn run<R>(repo: &R, config: &MigrationConfig, yes: bool) -> Result<MigrationReport>
where
    R: ContentRepository + ?Sized,
{
    let plan = migration::prepare(repo, config).await?;

    if plan.items.is_empty() {
        println!(
            "No content of type '{}' found. Nothing to migrate.",
            config.type_identifier
        );
        return Ok(MigrationReport::default());
    }

    if !config.dry_run && !yes {
        println!();
        println!(
            "About to migrate {} '{}' object(s): field '{}' -> '{}', images created under location {}.",
            plan.items.len(),
            config.type_identifier,
            config.source_field,
            config.target_field,
            config.target_location_id
        );
        println!("A new version of every object will be published.");
        println!();

        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Proceed with the migration?")
            .default(false)
            .interact()
            .context("Confirmation prompt failed. Use --yes to run non-interactively")?;

        if !confirmed {
            bail!("Migration cancelled by user");
        }
    }

    let report = migration::execute(repo, config, &plan).await?;
    print_summary(&report, config.dry_run);
    Ok(report)
}

fn print_summary(report: &MigrationReport, dry_run: bool) {
    println!();
    if dry_run {
        let creates = report
            .planned
            .iter()
            .filter(|p| p.action == migration::ImageAction::Created)
            .count();
        println!(
            "Dry run: {} object(s) found, {} image(s) would be created, {} updated, {} skipped.",
            report.found,
            creates,
            report.planned.len() - creates,
            report.skipped.len()
        );
        return;
    }

    println!(
        "Migrated {} of {} object(s): {} image(s) created, {} updated, {} skipped.",
        report.migrated.len(),
        report.found,
        report.created_images(),
        report.updated_images(),
        report.skipped.len()
    );
    tracing::info!("Migration completed");
}
