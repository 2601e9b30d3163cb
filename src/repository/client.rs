// ABOUTME: HTTP client for the content repository REST API (/api/ezp/v2)
// ABOUTME: Maps repository media types to the models and status codes to RepositoryError

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

use super::error::RepositoryError;
use super::models::{
    Content, ContentCreateStruct, ContentInfo, ContentType, ContentUpdateStruct, Field,
    FieldAssignment, FieldInput, FieldValue, ImageAssetValue, ImageValue, LocationCreateStruct,
    User, VersionInfo, VersionStatus,
};
use super::ContentRepository;
use crate::config::RepositoryConfig;
use crate::utils::{redact_url, retry_with_backoff};

const MEDIA_CONTENT: &str = "application/vnd.ez.api.Content+json";
const MEDIA_CONTENT_CREATE: &str = "application/vnd.ez.api.ContentCreate+json";
const MEDIA_VERSION: &str = "application/vnd.ez.api.Version+json";
const MEDIA_VERSION_UPDATE: &str = "application/vnd.ez.api.VersionUpdate+json";
const MEDIA_VIEW: &str = "application/vnd.ez.api.View+json; version=1.1";
const MEDIA_VIEW_INPUT: &str = "application/vnd.ez.api.ViewInput+json; version=1.1";
const MEDIA_CONTENT_TYPE_LIST: &str = "application/vnd.ez.api.ContentTypeInfoList+json";
const MEDIA_USER: &str = "application/vnd.ez.api.User+json";

const SEARCH_VIEW_IDENTIFIER: &str = "image-asset-migration";

/// [`ContentRepository`] backed by the repository's REST API
pub struct RestRepository {
    client: Client,
    api_base_url: String,
    /// Path part of the base URL, used to build `_href` references
    api_prefix: String,
    login: Option<String>,
    password: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
    current_user: RwLock<Option<User>>,
}

impl RestRepository {
    pub fn new(config: &RepositoryConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        let parsed = Url::parse(base)
            .with_context(|| format!("Invalid repository URL: {}", redact_url(base)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base_url: base.to_string(),
            api_prefix: parsed.path().trim_end_matches('/').to_string(),
            login: config.login.clone(),
            password: config.password.clone(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            current_user: RwLock::new(None),
        })
    }

    /// The user most recently passed to `set_current_user`
    #[cfg(test)]
    fn current_user(&self) -> Option<User> {
        self.current_user.read().ok().and_then(|u| u.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    fn href(&self, path: &str) -> String {
        format!("{}{}", self.api_prefix, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.login {
            Some(login) => request.basic_auth(login, self.password.as_deref()),
            None => request,
        }
    }

    /// Send an idempotent request, retrying transient failures and 5xx responses
    async fn send_with_retry<F, R>(&self, build: F, resource: R) -> Result<Response, RepositoryError>
    where
        F: Fn() -> RequestBuilder,
        R: Fn() -> String,
    {
        let this = self;
        let build = &build;
        let resource = &resource;
        retry_with_backoff(
            move || async move {
                match this.authorize(build()).send().await {
                    Ok(response) => check_status(response, resource).await,
                    Err(e) => Err(RepositoryError::from(e)),
                }
            },
            self.max_retries,
            self.retry_delay,
            RepositoryError::is_transient,
        )
        .await
    }

    /// Send a request once; used for writes, which are not safe to repeat
    async fn send<R>(&self, request: RequestBuilder, resource: R) -> Result<Response, RepositoryError>
    where
        R: FnOnce() -> String,
    {
        let response = self.authorize(request).send().await?;
        check_status(response, resource).await
    }

    async fn load_content(&self, content_id: u64) -> Result<Content, RepositoryError> {
        let url = self.url(&format!("/content/objects/{}", content_id));
        let response = self
            .send_with_retry(
                || self.client.get(&url).header("Accept", MEDIA_CONTENT),
                || format!("content {}", content_id),
            )
            .await?;
        let envelope: ContentEnvelope = decode(response).await?;
        envelope.content.into_content()
    }
}

#[async_trait]
impl ContentRepository for RestRepository {
    async fn load_user(&self, user_id: u64) -> Result<User, RepositoryError> {
        let url = self.url(&format!("/user/users/{}", user_id));
        let response = self
            .send_with_retry(
                || self.client.get(&url).header("Accept", MEDIA_USER),
                || format!("user {}", user_id),
            )
            .await?;
        let envelope: UserEnvelope = decode(response).await?;
        Ok(User {
            id: envelope.user.id,
            login: envelope.user.login,
        })
    }

    async fn set_current_user(&self, user: &User) -> Result<(), RepositoryError> {
        // REST sessions act as the authenticated login; there is no impersonation
        match &self.login {
            Some(login) if login != &user.login => {
                tracing::warn!(
                    "Authenticated as '{}' but import user {} is '{}'; changes will be attributed to '{}'",
                    login,
                    user.id,
                    user.login,
                    login
                );
            }
            None => {
                tracing::warn!(
                    "No repository login configured; requests are anonymous and may be rejected"
                );
            }
            _ => {}
        }

        let mut current = self
            .current_user
            .write()
            .map_err(|_| RepositoryError::InvalidInput("current user lock poisoned".into()))?;
        *current = Some(user.clone());
        Ok(())
    }

    async fn find_content(
        &self,
        type_identifier: &str,
        limit: usize,
    ) -> Result<Vec<Content>, RepositoryError> {
        let url = self.url("/views");
        let body = json!({
            "ViewInput": {
                "identifier": SEARCH_VIEW_IDENTIFIER,
                "public": false,
                "ContentQuery": {
                    "Filter": { "ContentTypeIdentifierCriterion": type_identifier },
                    "limit": limit,
                    "offset": 0
                }
            }
        })
        .to_string();

        // Search is a POST but does not modify anything, so it is safe to retry
        let response = self
            .send_with_retry(
                || {
                    self.client
                        .post(&url)
                        .header("Accept", MEDIA_VIEW)
                        .header("Content-Type", MEDIA_VIEW_INPUT)
                        .body(body.clone())
                },
                || format!("search view for content type '{}'", type_identifier),
            )
            .await?;
        let envelope: ViewEnvelope = decode(response).await?;

        envelope
            .view
            .result
            .search_hits
            .search_hit
            .into_iter()
            .map(|hit| hit.value.content.into_content())
            .collect()
    }

    async fn load_content_type_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<ContentType, RepositoryError> {
        let url = self.url("/content/types");
        let response = self
            .send_with_retry(
                || {
                    self.client
                        .get(&url)
                        .query(&[("identifier", identifier)])
                        .header("Accept", MEDIA_CONTENT_TYPE_LIST)
                },
                || format!("content type '{}'", identifier),
            )
            .await?;
        let envelope: ContentTypeListEnvelope = decode(response).await?;

        envelope
            .list
            .content_type
            .into_iter()
            .find(|t| t.identifier == identifier)
            .map(|t| ContentType {
                id: t.id,
                identifier: t.identifier,
                main_language_code: t.main_language_code,
            })
            .ok_or_else(|| RepositoryError::not_found(format!("content type '{}'", identifier)))
    }

    async fn load_content_by_remote_id(
        &self,
        remote_id: &str,
        languages: &[String],
    ) -> Result<Content, RepositoryError> {
        let url = self.url("/content/objects");
        let languages = languages.join(",");
        // The API answers with a redirect to the object, which reqwest follows
        let response = self
            .send_with_retry(
                || {
                    let mut request = self
                        .client
                        .get(&url)
                        .query(&[("remoteId", remote_id)])
                        .header("Accept", MEDIA_CONTENT);
                    if !languages.is_empty() {
                        request = request.query(&[("languages", languages.as_str())]);
                    }
                    request
                },
                || format!("content with remote id '{}'", remote_id),
            )
            .await?;
        let envelope: ContentEnvelope = decode(response).await?;
        envelope.content.into_content()
    }

    async fn create_content_draft(
        &self,
        content_info: &ContentInfo,
    ) -> Result<Content, RepositoryError> {
        let url = self.url(&format!(
            "/content/objects/{}/currentversion",
            content_info.id
        ));
        let response = self
            .send(
                self.client
                    .post(&url)
                    .header("X-HTTP-Method-Override", "COPY")
                    .header("Accept", MEDIA_VERSION),
                || format!("current version of content {}", content_info.id),
            )
            .await?;
        let envelope: VersionEnvelope = decode(response).await?;
        Ok(envelope.version.into_content(content_info.clone()))
    }

    async fn update_content(
        &self,
        version_info: &VersionInfo,
        update: ContentUpdateStruct,
    ) -> Result<Content, RepositoryError> {
        let url = self.url(&format!(
            "/content/objects/{}/versions/{}",
            version_info.content_id, version_info.version_no
        ));
        let body = json!({
            "VersionUpdate": {
                "initialLanguageCode": update.initial_language_code,
                "fields": { "field": fields_to_rest(&update.fields, &update.initial_language_code) }
            }
        });

        let response = self
            .send(
                self.client
                    .patch(&url)
                    .header("Accept", MEDIA_VERSION)
                    .header("Content-Type", MEDIA_VERSION_UPDATE)
                    .body(body.to_string()),
                || version_label(version_info),
            )
            .await?;
        let envelope: VersionEnvelope = decode(response).await?;

        // The version payload carries no content metadata; reload it
        let mut content = self.load_content(version_info.content_id).await?;
        let draft = envelope.version.into_content(content.content_info.clone());
        content.version_info = draft.version_info;
        content.fields = draft.fields;
        Ok(content)
    }

    async fn publish_version(
        &self,
        version_info: &VersionInfo,
    ) -> Result<Content, RepositoryError> {
        let url = self.url(&format!(
            "/content/objects/{}/versions/{}",
            version_info.content_id, version_info.version_no
        ));
        self.send(
            self.client
                .post(&url)
                .header("X-HTTP-Method-Override", "PUBLISH"),
            || version_label(version_info),
        )
        .await?;

        tracing::debug!(
            "Published version {} of content {}",
            version_info.version_no,
            version_info.content_id
        );
        self.load_content(version_info.content_id).await
    }

    async fn create_content(
        &self,
        create: ContentCreateStruct,
        locations: Vec<LocationCreateStruct>,
    ) -> Result<Content, RepositoryError> {
        let location = match locations.as_slice() {
            [location] => *location,
            _ => {
                return Err(RepositoryError::InvalidInput(format!(
                    "content must be created with exactly one location, got {}",
                    locations.len()
                )))
            }
        };

        let mut content_create = json!({
            "ContentType": {
                "_href": self.href(&format!("/content/types/{}", create.content_type.id))
            },
            "mainLanguageCode": create.main_language_code,
            "LocationCreate": {
                "ParentLocation": {
                    "_href": self.href(&format!("/content/locations/{}", location.parent_location_id))
                },
                "priority": 0,
                "hidden": false,
                "sortField": "PATH",
                "sortOrder": "ASC"
            },
            "alwaysAvailable": true,
            "fields": { "field": fields_to_rest(&create.fields, &create.main_language_code) }
        });
        if let Some(remote_id) = &create.remote_id {
            content_create["remoteId"] = Value::String(remote_id.clone());
        }
        let body = json!({ "ContentCreate": content_create });

        let url = self.url("/content/objects");
        let response = self
            .send(
                self.client
                    .post(&url)
                    .header("Accept", MEDIA_CONTENT)
                    .header("Content-Type", MEDIA_CONTENT_CREATE)
                    .body(body.to_string()),
                || format!("parent location {}", location.parent_location_id),
            )
            .await?;
        let envelope: ContentEnvelope = decode(response).await?;
        envelope.content.into_content()
    }
}

fn version_label(version_info: &VersionInfo) -> String {
    format!(
        "version {} of content {}",
        version_info.version_no, version_info.content_id
    )
}

/// Map non-success statuses to typed errors
async fn check_status<F>(response: Response, resource: F) -> Result<Response, RepositoryError>
where
    F: FnOnce() -> String,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(RepositoryError::not_found(resource()));
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RepositoryError::Unauthorized {
            status: status.as_u16(),
            body,
        });
    }

    Err(RepositoryError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RepositoryError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn fields_to_rest(fields: &[FieldAssignment], language_code: &str) -> Vec<Value> {
    fields
        .iter()
        .map(|f| {
            json!({
                "fieldDefinitionIdentifier": f.identifier,
                "languageCode": language_code,
                "fieldValue": field_input_to_rest(&f.value),
            })
        })
        .collect()
}

fn field_input_to_rest(input: &FieldInput) -> Value {
    match input {
        FieldInput::Text(text) => Value::String(text.clone()),
        FieldInput::ImageFile {
            file_name,
            data,
            alternative_text,
        } => json!({
            "fileName": file_name,
            "data": base64::engine::general_purpose::STANDARD.encode(data),
            "alternativeText": alternative_text,
        }),
        FieldInput::ImageAsset {
            destination_content_id,
            alternative_text,
        } => json!({
            "destinationContentId": destination_content_id,
            "alternativeText": alternative_text,
        }),
    }
}

fn field_value_from_rest(field_type: Option<&str>, value: Value) -> FieldValue {
    if value.is_null() {
        return FieldValue::Empty;
    }

    match field_type {
        Some("ezimage") => match serde_json::from_value::<RestImageValue>(value.clone()) {
            Ok(image) => FieldValue::Image(ImageValue {
                file_name: image.file_name,
                uri: image.uri,
                alternative_text: image.alternative_text,
                file_size: image.file_size,
                width: image.width.and_then(|w| w.as_u32()),
                height: image.height.and_then(|h| h.as_u32()),
            }),
            Err(_) => FieldValue::Other(value),
        },
        Some("ezimageasset") => match serde_json::from_value::<RestImageAssetValue>(value.clone())
        {
            Ok(asset) => FieldValue::ImageAsset(ImageAssetValue {
                destination_content_id: asset.destination_content_id.and_then(|id| id.as_u64()),
                alternative_text: asset.alternative_text,
            }),
            Err(_) => FieldValue::Other(value),
        },
        _ => match value {
            Value::String(text) => FieldValue::Text(text),
            other => FieldValue::Other(other),
        },
    }
}

/// Trailing numeric segment of an `_href`, e.g. `/content/locations/1/2/59` -> 59
fn id_from_href(href: &str) -> Option<u64> {
    href.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

#[derive(Debug, Deserialize)]
struct Ref {
    #[serde(rename = "_href")]
    href: String,
}

#[derive(Debug, Deserialize)]
struct ContentEnvelope {
    #[serde(rename = "Content")]
    content: RestContent,
}

#[derive(Debug, Deserialize)]
struct RestContent {
    #[serde(rename = "_id")]
    id: u64,
    #[serde(rename = "_remoteId", default)]
    remote_id: String,
    #[serde(rename = "ContentType")]
    content_type: Ref,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "MainLocation", default)]
    main_location: Option<Ref>,
    #[serde(rename = "mainLanguageCode", default)]
    main_language_code: String,
    #[serde(rename = "currentVersionNo", default)]
    current_version_no: u32,
    #[serde(rename = "CurrentVersion", default)]
    current_version: Option<VersionEnvelope>,
}

impl RestContent {
    fn into_content(self) -> Result<Content, RepositoryError> {
        let content_type_id = id_from_href(&self.content_type.href).ok_or_else(|| {
            RepositoryError::Decode(format!(
                "content {} has an unreadable ContentType reference '{}'",
                self.id, self.content_type.href
            ))
        })?;

        let info = ContentInfo {
            id: self.id,
            name: self.name,
            remote_id: self.remote_id,
            content_type_id,
            main_language_code: self.main_language_code,
            current_version_no: self.current_version_no,
            main_location_id: self.main_location.and_then(|l| id_from_href(&l.href)),
        };

        match self.current_version {
            Some(envelope) => Ok(envelope.version.into_content(info)),
            None => Ok(Content {
                version_info: VersionInfo {
                    content_id: info.id,
                    version_no: info.current_version_no,
                    status: VersionStatus::Published,
                },
                content_info: info,
                fields: Vec::new(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionEnvelope {
    #[serde(rename = "Version")]
    version: RestVersion,
}

#[derive(Debug, Deserialize)]
struct RestVersion {
    #[serde(rename = "VersionInfo")]
    version_info: RestVersionInfo,
    #[serde(rename = "Fields", default)]
    fields: RestFields,
}

impl RestVersion {
    fn into_content(self, content_info: ContentInfo) -> Content {
        let status =
            VersionStatus::parse(&self.version_info.status).unwrap_or(VersionStatus::Draft);
        let fields = self
            .fields
            .field
            .into_iter()
            .map(|f| Field {
                id: f.id,
                value: field_value_from_rest(f.field_type_identifier.as_deref(), f.field_value),
                field_def_identifier: f.field_definition_identifier,
                language_code: f.language_code,
                field_type_identifier: f.field_type_identifier,
            })
            .collect();

        Content {
            version_info: VersionInfo {
                content_id: content_info.id,
                version_no: self.version_info.version_no,
                status,
            },
            content_info,
            fields,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RestVersionInfo {
    #[serde(rename = "versionNo")]
    version_no: u32,
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct RestFields {
    #[serde(default)]
    field: Vec<RestField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestField {
    #[serde(default)]
    id: Option<u64>,
    field_definition_identifier: String,
    #[serde(default)]
    language_code: String,
    #[serde(default)]
    field_type_identifier: Option<String>,
    #[serde(default)]
    field_value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestImageValue {
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    alternative_text: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    width: Option<NumberOrString>,
    #[serde(default)]
    height: Option<NumberOrString>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestImageAssetValue {
    #[serde(default)]
    destination_content_id: Option<NumberOrString>,
    #[serde(default)]
    alternative_text: Option<String>,
}

/// Numbers the API sometimes serializes as strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

impl NumberOrString {
    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
        }
    }

    fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|n| u32::try_from(n).ok())
    }
}

#[derive(Debug, Deserialize)]
struct ViewEnvelope {
    #[serde(rename = "View")]
    view: RestView,
}

#[derive(Debug, Deserialize)]
struct RestView {
    #[serde(rename = "Result")]
    result: RestViewResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestViewResult {
    #[serde(default)]
    search_hits: RestSearchHits,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestSearchHits {
    #[serde(default)]
    search_hit: Vec<RestSearchHit>,
}

#[derive(Debug, Deserialize)]
struct RestSearchHit {
    value: ContentEnvelope,
}

#[derive(Debug, Deserialize)]
struct ContentTypeListEnvelope {
    #[serde(rename = "ContentTypeInfoList")]
    list: RestContentTypeList,
}

#[derive(Debug, Deserialize)]
struct RestContentTypeList {
    #[serde(rename = "ContentType", default)]
    content_type: Vec<RestContentType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestContentType {
    id: u64,
    identifier: String,
    #[serde(default)]
    main_language_code: String,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(rename = "User")]
    user: RestUser,
}

#[derive(Debug, Deserialize)]
struct RestUser {
    #[serde(rename = "_id")]
    id: u64,
    login: String,
}
