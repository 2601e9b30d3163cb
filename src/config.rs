// ABOUTME: Run configuration for the migration and the repository connection
// ABOUTME: Holds the defaults the migrate command falls back to and validates input up front

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::{validate_identifier, validate_language_code, validate_repository_url};

/// User the migration acts as unless overridden
pub const DEFAULT_IMPORT_USER_ID: u64 = 123;
/// Language used for created images and for every update
pub const DEFAULT_LANGUAGE: &str = "eng-GB";
/// Content type of the linked image objects
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image";
/// Maximum number of content objects processed per run
pub const DEFAULT_LIMIT: usize = 1000;
/// Directory the image uris are resolved against
pub const DEFAULT_PUBLIC_DIR: &str = "public";

/// Field on the image content type that receives the file name
pub const IMAGE_NAME_FIELD: &str = "name";
/// Field on the image content type that receives the binary
pub const IMAGE_FILE_FIELD: &str = "image";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What to migrate and where to put the image objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Content type whose objects are migrated
    pub type_identifier: String,
    /// Image field read on each object
    pub source_field: String,
    /// Image asset field written on each object
    pub target_field: String,
    /// Location new image objects are created under
    pub target_location_id: u64,
    pub import_user_id: u64,
    pub language: String,
    pub image_content_type: String,
    pub limit: usize,
    pub public_dir: PathBuf,
    /// Report what would change without writing anything
    pub dry_run: bool,
}

impl MigrationConfig {
    pub fn new(
        type_identifier: impl Into<String>,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        target_location_id: u64,
    ) -> Self {
        Self {
            type_identifier: type_identifier.into(),
            source_field: source_field.into(),
            target_field: target_field.into(),
            target_location_id,
            import_user_id: DEFAULT_IMPORT_USER_ID,
            language: DEFAULT_LANGUAGE.to_string(),
            image_content_type: DEFAULT_IMAGE_CONTENT_TYPE.to_string(),
            limit: DEFAULT_LIMIT,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            dry_run: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.type_identifier).context("Invalid content type identifier")?;
        validate_identifier(&self.source_field).context("Invalid source field identifier")?;
        validate_identifier(&self.target_field).context("Invalid target field identifier")?;
        validate_identifier(&self.image_content_type)
            .context("Invalid image content type identifier")?;
        validate_language_code(&self.language)?;

        if self.source_field == self.target_field {
            bail!(
                "Source and target field must differ (both are '{}')",
                self.source_field
            );
        }
        if self.target_location_id == 0 {
            bail!("Target location id must be a positive integer");
        }
        if self.limit == 0 {
            bail!("Limit must be at least 1");
        }
        Ok(())
    }
}

/// How to reach the repository REST API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// REST API root, e.g. `https://cms.example.com/api/ezp/v2`
    pub base_url: String,
    pub login: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RepositoryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_credentials(mut self, login: Option<String>, password: Option<String>) -> Self {
        self.login = login;
        self.password = password;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_repository_url(&self.base_url)?;
        if self.password.is_some() && self.login.is_none() {
            bail!("A repository password was given without a login. Use --login as well.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_config_defaults() {
        let config = MigrationConfig::new("article", "image", "asset", 51);
        assert_eq!(config.import_user_id, 123);
        assert_eq!(config.language, "eng-GB");
        assert_eq!(config.image_content_type, "image");
        assert_eq!(config.limit, 1000);
        assert_eq!(config.public_dir, PathBuf::from("public"));
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_migration_config_rejects_bad_input() {
        let same_field = MigrationConfig::new("article", "image", "image", 51);
        assert!(same_field.validate().is_err());

        let no_location = MigrationConfig::new("article", "image", "asset", 0);
        assert!(no_location.validate().is_err());

        let bad_type = MigrationConfig::new("blog-post", "image", "asset", 51);
        assert!(bad_type.validate().is_err());

        let mut bad_language = MigrationConfig::new("article", "image", "asset", 51);
        bad_language.language = "english".to_string();
        assert!(bad_language.validate().is_err());

        let mut zero_limit = MigrationConfig::new("article", "image", "asset", 51);
        zero_limit.limit = 0;
        assert!(zero_limit.validate().is_err());
    }

    #[test]
    fn test_repository_config_validation() {
        let config = RepositoryConfig::new("https://cms.example.com/api/ezp/v2")
            .with_credentials(Some("admin".to_string()), Some("publish".to_string()));
        assert!(config.validate().is_ok());

        let password_only = RepositoryConfig::new("https://cms.example.com/api/ezp/v2")
            .with_credentials(None, Some("publish".to_string()));
        assert!(password_only.validate().is_err());

        assert!(RepositoryConfig::new("not a url").validate().is_err());
    }
}
