// ABOUTME: Content repository abstraction used by the migration
// ABOUTME: One async method per repository call; RestRepository is the production backend

mod client;
mod error;
pub mod models;

pub use client::RestRepository;
pub use error::RepositoryError;
pub use models::{
    Content, ContentCreateStruct, ContentInfo, ContentType, ContentUpdateStruct, Field,
    FieldAssignment, FieldInput, FieldValue, ImageAssetValue, ImageValue, LocationCreateStruct,
    User, VersionInfo, VersionStatus,
};

use async_trait::async_trait;

/// The subset of the content repository API the migration talks to.
///
/// Implementations map "object does not exist" to [`RepositoryError::NotFound`];
/// every other failure is treated as fatal by callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn load_user(&self, user_id: u64) -> Result<User, RepositoryError>;

    /// Make `user` the identity subsequent calls are performed as
    async fn set_current_user(&self, user: &User) -> Result<(), RepositoryError>;

    /// Find content objects of a content type, at most `limit` of them
    async fn find_content(
        &self,
        type_identifier: &str,
        limit: usize,
    ) -> Result<Vec<Content>, RepositoryError>;

    async fn load_content_type_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<ContentType, RepositoryError>;

    async fn load_content_by_remote_id(
        &self,
        remote_id: &str,
        languages: &[String],
    ) -> Result<Content, RepositoryError>;

    /// Create a new draft from the current version of a content object
    async fn create_content_draft(
        &self,
        content_info: &ContentInfo,
    ) -> Result<Content, RepositoryError>;

    async fn update_content(
        &self,
        version_info: &VersionInfo,
        update: ContentUpdateStruct,
    ) -> Result<Content, RepositoryError>;

    async fn publish_version(&self, version_info: &VersionInfo)
        -> Result<Content, RepositoryError>;

    /// Create a new content object as a draft placed under the given locations
    async fn create_content(
        &self,
        create: ContentCreateStruct,
        locations: Vec<LocationCreateStruct>,
    ) -> Result<Content, RepositoryError>;
}
