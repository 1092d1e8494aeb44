//! Google Drive API request and response types

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive API file resource (only the fields requested)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Browser link, present when requested through `fields`
    #[serde(default)]
    pub web_view_link: Option<String>,
}

/// files.list response
#[derive(Debug, Deserialize)]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

/// Metadata part of a create request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<&'a str>,
}

/// Permission resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

/// permissions.list response
#[derive(Debug, Deserialize)]
pub struct PermissionsListResponse {
    #[serde(default)]
    pub permissions: Vec<Permission>,
}
