// ABOUTME: Moves embedded image field values into linked image objects
// ABOUTME: search -> read field -> upsert image object by remote id -> update and publish parent

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{MigrationConfig, IMAGE_FILE_FIELD, IMAGE_NAME_FIELD};
use crate::repository::{
    Content, ContentCreateStruct, ContentRepository, ContentType, ContentUpdateStruct, FieldInput,
    FieldValue, ImageValue, LocationCreateStruct, RepositoryError,
};

/// Remote id of the image object created for one field of one content object.
///
/// Deterministic, so re-running the migration updates the same image object
/// instead of creating a duplicate.
///
/// ```
/// # use image_asset_migrator::migration::image_remote_id;
/// assert_eq!(image_remote_id(57, "image"), "image-asset-57-image");
/// ```
pub fn image_remote_id(content_id: u64, field_def_identifier: &str) -> String {
    format!("image-asset-{}-{}", content_id, field_def_identifier)
}

/// What happened to the linked image object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedItem {
    pub content_id: u64,
    pub name: String,
    pub image_content_id: u64,
    pub image_remote_id: String,
    pub action: ImageAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub content_id: u64,
    pub name: String,
    pub reason: String,
}

/// Dry-run outcome for one content object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub content_id: u64,
    pub name: String,
    pub image_remote_id: String,
    pub action: ImageAction,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Number of content objects returned by the search
    pub found: usize,
    pub migrated: Vec<MigratedItem>,
    pub skipped: Vec<SkippedItem>,
    pub planned: Vec<PlannedItem>,
}

impl MigrationReport {
    pub fn created_images(&self) -> usize {
        self.migrated
            .iter()
            .filter(|m| m.action == ImageAction::Created)
            .count()
    }

    pub fn updated_images(&self) -> usize {
        self.migrated
            .iter()
            .filter(|m| m.action == ImageAction::Updated)
            .count()
    }
}

/// Objects to migrate plus the image content type they will link to
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub items: Vec<Content>,
    pub image_type: ContentType,
}

/// Image binary and metadata read from the source field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub file_name: String,
    pub data: Vec<u8>,
    pub alternative_text: Option<String>,
}

enum ItemOutcome {
    Migrated(MigratedItem),
    Skipped(SkippedItem),
}

/// Run the whole migration: [`prepare`] followed by [`execute`]
pub async fn migrate<R>(repo: &R, config: &MigrationConfig) -> Result<MigrationReport>
where
    R: ContentRepository + ?Sized,
{
    let plan = prepare(repo, config).await?;
    execute(repo, config, &plan).await
}

/// Switch to the import user, search the objects to migrate and load the image content type
pub async fn prepare<R>(repo: &R, config: &MigrationConfig) -> Result<MigrationPlan>
where
    R: ContentRepository + ?Sized,
{
    config.validate()?;

    let user = repo
        .load_user(config.import_user_id)
        .await
        .with_context(|| format!("Failed to load import user {}", config.import_user_id))?;
    repo.set_current_user(&user)
        .await
        .with_context(|| format!("Failed to act as import user '{}'", user.login))?;
    tracing::info!("Acting as user '{}' ({})", user.login, user.id);

    let items = repo
        .find_content(&config.type_identifier, config.limit)
        .await
        .with_context(|| {
            format!(
                "Failed to search content of type '{}'",
                config.type_identifier
            )
        })?;
    tracing::info!(
        "Found {} content object(s) of type '{}'",
        items.len(),
        config.type_identifier
    );
    if items.len() >= config.limit {
        tracing::warn!(
            "Search hit the limit of {} objects; objects beyond it are not migrated in this run",
            config.limit
        );
    }

    let image_type = repo
        .load_content_type_by_identifier(&config.image_content_type)
        .await
        .with_context(|| {
            format!(
                "Failed to load image content type '{}'",
                config.image_content_type
            )
        })?;

    Ok(MigrationPlan { items, image_type })
}

/// Migrate every object in the plan, stopping at the first unrecoverable error
pub async fn execute<R>(
    repo: &R,
    config: &MigrationConfig,
    plan: &MigrationPlan,
) -> Result<MigrationReport>
where
    R: ContentRepository + ?Sized,
{
    let mut report = MigrationReport {
        found: plan.items.len(),
        ..Default::default()
    };

    if config.dry_run {
        for content in &plan.items {
            let outcome = plan_item(repo, config, content).await.with_context(|| {
                format!("Failed to inspect {} ({})", content.name(), content.id())
            })?;
            match outcome {
                Some(planned) => report.planned.push(planned),
                None => report.skipped.push(SkippedItem {
                    content_id: content.id(),
                    name: content.name().to_string(),
                    reason: format!("field '{}' holds no image", config.source_field),
                }),
            }
        }
        return Ok(report);
    }

    for content in &plan.items {
        let outcome = migrate_item(repo, config, &plan.image_type, content).await;
        match outcome {
            Ok(ItemOutcome::Migrated(item)) => {
                println!("Updated {} ({})", item.name, item.content_id);
                report.migrated.push(item);
            }
            Ok(ItemOutcome::Skipped(item)) => {
                tracing::warn!(
                    "Skipped {} ({}): {}",
                    item.name,
                    item.content_id,
                    item.reason
                );
                report.skipped.push(item);
            }
            Err(e) => {
                tracing::error!(
                    "Stopping after {} of {} object(s) were migrated",
                    report.migrated.len(),
                    report.found
                );
                return Err(e.context(format!(
                    "Failed to migrate {} ({})",
                    content.name(),
                    content.id()
                )));
            }
        }
    }

    Ok(report)
}

async fn migrate_item<R>(
    repo: &R,
    config: &MigrationConfig,
    image_type: &ContentType,
    content: &Content,
) -> Result<ItemOutcome>
where
    R: ContentRepository + ?Sized,
{
    let (field_def_identifier, image) = match source_image(content, &config.source_field)? {
        Some(found) => found,
        None => {
            return Ok(ItemOutcome::Skipped(SkippedItem {
                content_id: content.id(),
                name: content.name().to_string(),
                reason: format!("field '{}' holds no image", config.source_field),
            }))
        }
    };

    let remote_id = image_remote_id(content.id(), field_def_identifier);
    let source = load_image_source(&config.public_dir, image).await?;

    let (image_object, action) = create_or_update_image(
        repo,
        &remote_id,
        config.target_location_id,
        &source,
        image_type,
        &config.language,
    )
    .await
    .with_context(|| format!("Failed to store image object '{}'", remote_id))?;
    tracing::debug!(
        "{:?} image object {} for {} ({})",
        action,
        image_object.id(),
        content.name(),
        content.id()
    );

    let draft = repo
        .create_content_draft(&content.content_info)
        .await
        .context("Failed to create draft")?;

    let mut update = ContentUpdateStruct::new(config.language.as_str());
    update.set_field(
        config.target_field.as_str(),
        FieldInput::ImageAsset {
            destination_content_id: image_object.id(),
            alternative_text: source.alternative_text.clone(),
        },
    );
    let draft = repo
        .update_content(&draft.version_info, update)
        .await
        .with_context(|| format!("Failed to set field '{}'", config.target_field))?;
    repo.publish_version(&draft.version_info)
        .await
        .context("Failed to publish draft")?;

    Ok(ItemOutcome::Migrated(MigratedItem {
        content_id: content.id(),
        name: content.name().to_string(),
        image_content_id: image_object.id(),
        image_remote_id: remote_id,
        action,
    }))
}

async fn plan_item<R>(
    repo: &R,
    config: &MigrationConfig,
    content: &Content,
) -> Result<Option<PlannedItem>>
where
    R: ContentRepository + ?Sized,
{
    let field_def_identifier = match source_image(content, &config.source_field)? {
        Some((identifier, _)) => identifier,
        None => return Ok(None),
    };
    let remote_id = image_remote_id(content.id(), field_def_identifier);

    let action = match repo
        .load_content_by_remote_id(&remote_id, &[config.language.clone()])
        .await
    {
        Ok(_) => ImageAction::Updated,
        Err(e) if e.is_not_found() => ImageAction::Created,
        Err(e) => return Err(e.into()),
    };

    let verb = match action {
        ImageAction::Created => "create",
        ImageAction::Updated => "update",
    };
    println!(
        "Would {} image '{}' and link {} ({})",
        verb,
        remote_id,
        content.name(),
        content.id()
    );

    Ok(Some(PlannedItem {
        content_id: content.id(),
        name: content.name().to_string(),
        image_remote_id: remote_id,
        action,
    }))
}

/// Find the image stored in `field` on `content`.
///
/// Returns `None` when the field is present but holds no image, and an error
/// when the field is missing or is not an image field.
fn source_image<'a>(content: &'a Content, field: &str) -> Result<Option<(&'a str, &'a ImageValue)>> {
    let source = content.get_field(field).ok_or_else(|| {
        anyhow::anyhow!(
            "{} ({}) has no field '{}'",
            content.name(),
            content.id(),
            field
        )
    })?;

    match &source.value {
        FieldValue::Image(image) if !image.is_empty() => {
            Ok(Some((source.field_def_identifier.as_str(), image)))
        }
        FieldValue::Image(_) | FieldValue::Empty => Ok(None),
        other => bail!(
            "Field '{}' on {} ({}) is not an image field: {:?}",
            field,
            content.name(),
            content.id(),
            other
        ),
    }
}

/// Read the stored image file from the public directory
pub async fn load_image_source(public_dir: &Path, image: &ImageValue) -> Result<ImageSource> {
    let uri = image
        .uri
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Image value has no uri"))?;
    let path = image_path(public_dir, uri);

    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read image file {}", path.display()))?;

    let file_name = match image.file_name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => uri.rsplit('/').next().unwrap_or(uri).to_string(),
    };

    Ok(ImageSource {
        file_name,
        data,
        alternative_text: image.alternative_text.clone(),
    })
}

fn image_path(public_dir: &Path, uri: &str) -> PathBuf {
    public_dir.join(uri.trim_start_matches('/'))
}

/// Update the image object with `remote_id`, or create it under `parent_location_id`
/// when it does not exist yet. A new version is published either way.
pub async fn create_or_update_image<R>(
    repo: &R,
    remote_id: &str,
    parent_location_id: u64,
    source: &ImageSource,
    image_type: &ContentType,
    language: &str,
) -> Result<(Content, ImageAction), RepositoryError>
where
    R: ContentRepository + ?Sized,
{
    let image_input = FieldInput::ImageFile {
        file_name: source.file_name.clone(),
        data: source.data.clone(),
        alternative_text: source.alternative_text.clone(),
    };

    match repo
        .load_content_by_remote_id(remote_id, &[language.to_string()])
        .await
    {
        Ok(existing) => {
            let draft = repo.create_content_draft(&existing.content_info).await?;

            let mut update = ContentUpdateStruct::new(language);
            update
                .set_field(IMAGE_NAME_FIELD, FieldInput::Text(source.file_name.clone()))
                .set_field(IMAGE_FILE_FIELD, image_input);

            let draft = repo.update_content(&draft.version_info, update).await?;
            let content = repo.publish_version(&draft.version_info).await?;
            Ok((content, ImageAction::Updated))
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!("No image object '{}' yet, creating it", remote_id);

            let mut create = ContentCreateStruct::new(image_type.clone(), language);
            create.remote_id = Some(remote_id.to_string());
            create
                .set_field(IMAGE_NAME_FIELD, FieldInput::Text(source.file_name.clone()))
                .set_field(IMAGE_FILE_FIELD, image_input);

            let draft = repo
                .create_content(create, vec![LocationCreateStruct::new(parent_location_id)])
                .await?;
            let content = repo.publish_version(&draft.version_info).await?;
            Ok((content, ImageAction::Created))
        }
        Err(e) => Err(e),
    }
}
