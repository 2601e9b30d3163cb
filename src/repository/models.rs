// ABOUTME: Value types mirrored from the content repository (content, versions, fields)
// ABOUTME: Also holds the create/update structs the migration sends back to the repository

use serde::{Deserialize, Serialize};

/// Publication state of a content version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionStatus {
    Draft,
    Published,
    Archived,
}

impl VersionStatus {
    /// Parse the status string used by the REST API ("DRAFT", "PUBLISHED", "ARCHIVED")
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "PUBLISHED" => Some(Self::Published),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Identifies one version of a content object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub content_id: u64,
    pub version_no: u32,
    pub status: VersionStatus,
}

/// Metadata shared by every version of a content object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub id: u64,
    pub name: String,
    pub remote_id: String,
    pub content_type_id: u64,
    pub main_language_code: String,
    pub current_version_no: u32,
    pub main_location_id: Option<u64>,
}

/// A content type, only the parts needed to create objects of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    pub id: u64,
    pub identifier: String,
    pub main_language_code: String,
}

/// A repository user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub login: String,
}

/// Value stored in an image field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageValue {
    pub file_name: Option<String>,
    /// Public path of the stored file, e.g. `/var/site/storage/images/1/2/3/foo.jpg`
    pub uri: Option<String>,
    pub alternative_text: Option<String>,
    pub file_size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageValue {
    /// An image value without a stored file
    pub fn is_empty(&self) -> bool {
        self.uri.as_deref().map_or(true, str::is_empty)
    }
}

/// Value stored in an image asset field: a relation to an image content object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAssetValue {
    pub destination_content_id: Option<u64>,
    pub alternative_text: Option<String>,
}

/// Decoded field value. Only the field types the migration reads are modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Image(ImageValue),
    ImageAsset(ImageAssetValue),
    Text(String),
    Empty,
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: Option<u64>,
    pub field_def_identifier: String,
    pub language_code: String,
    pub field_type_identifier: Option<String>,
    pub value: FieldValue,
}

/// One loaded version of a content object together with its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub content_info: ContentInfo,
    pub version_info: VersionInfo,
    pub fields: Vec<Field>,
}

impl Content {
    pub fn id(&self) -> u64 {
        self.content_info.id
    }

    pub fn name(&self) -> &str {
        &self.content_info.name
    }

    /// Look up a field by its field definition identifier
    pub fn get_field(&self, identifier: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.field_def_identifier == identifier)
    }

    pub fn get_field_value(&self, identifier: &str) -> Option<&FieldValue> {
        self.get_field(identifier).map(|f| &f.value)
    }
}

/// A value to be written into a field on create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    Text(String),
    /// Image binary carried inline; the repository stores it and assigns a uri
    ImageFile {
        file_name: String,
        data: Vec<u8>,
        alternative_text: Option<String>,
    },
    ImageAsset {
        destination_content_id: u64,
        alternative_text: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    pub identifier: String,
    pub value: FieldInput,
}

/// Changes applied to a draft before it is published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUpdateStruct {
    pub initial_language_code: String,
    pub fields: Vec<FieldAssignment>,
}

impl ContentUpdateStruct {
    pub fn new(initial_language_code: impl Into<String>) -> Self {
        Self {
            initial_language_code: initial_language_code.into(),
            fields: Vec::new(),
        }
    }

    /// Set a field, replacing any earlier assignment for the same identifier
    pub fn set_field(&mut self, identifier: impl Into<String>, value: FieldInput) -> &mut Self {
        set_field(&mut self.fields, identifier.into(), value);
        self
    }

    pub fn field(&self, identifier: &str) -> Option<&FieldInput> {
        find_field(&self.fields, identifier)
    }
}

/// Everything needed to create a new content object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentCreateStruct {
    pub content_type: ContentType,
    pub main_language_code: String,
    pub remote_id: Option<String>,
    pub fields: Vec<FieldAssignment>,
}

impl ContentCreateStruct {
    pub fn new(content_type: ContentType, main_language_code: impl Into<String>) -> Self {
        Self {
            content_type,
            main_language_code: main_language_code.into(),
            remote_id: None,
            fields: Vec::new(),
        }
    }

    pub fn set_field(&mut self, identifier: impl Into<String>, value: FieldInput) -> &mut Self {
        set_field(&mut self.fields, identifier.into(), value);
        self
    }

    pub fn field(&self, identifier: &str) -> Option<&FieldInput> {
        find_field(&self.fields, identifier)
    }
}

/// Placement of a newly created object in the content tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationCreateStruct {
    pub parent_location_id: u64,
}

impl LocationCreateStruct {
    pub fn new(parent_location_id: u64) -> Self {
        Self { parent_location_id }
    }
}

fn set_field(fields: &mut Vec<FieldAssignment>, identifier: String, value: FieldInput) {
    if let Some(existing) = fields.iter_mut().find(|f| f.identifier == identifier) {
        existing.value = value;
    } else {
        fields.push(FieldAssignment { identifier, value });
    }
}

fn find_field<'a>(fields: &'a [FieldAssignment], identifier: &str) -> Option<&'a FieldInput> {
    fields
        .iter()
        .find(|f| f.identifier == identifier)
        .map(|f| &f.value)
}
