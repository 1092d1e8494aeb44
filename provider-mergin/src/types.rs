//! Mergin API request and response types

use bridge_traits::vcs::{FileChangeRecord, ProjectInfo};
use serde::{Deserialize, Serialize};

/// Login request body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

/// Login response (user profile with session)
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub session: SessionInfo,
}

#[derive(Debug, Deserialize)]
pub struct SessionInfo {
    pub token: String,
    pub expire: String,
}

/// One file of a project version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    pub checksum: String,
    pub size: u64,
    #[serde(default)]
    pub mtime: Option<String>,
}

impl From<&ProjectFile> for FileChangeRecord {
    fn from(file: &ProjectFile) -> Self {
        FileChangeRecord {
            path: file.path.clone(),
            checksum: Some(file.checksum.clone()),
            size: Some(file.size),
        }
    }
}

/// Project detail response
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectResponse {
    pub name: String,
    pub namespace: String,
    pub version: String,
    #[serde(default)]
    pub files: Vec<ProjectFile>,
}

impl ProjectResponse {
    pub fn to_info(&self) -> ProjectInfo {
        ProjectInfo {
            version: self.version.clone(),
            files: self.files.iter().map(FileChangeRecord::from).collect(),
        }
    }
}

/// Working copy metadata stored in `.mergin/mergin.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub namespace: String,
    pub version: String,
    pub files: Vec<ProjectFile>,
}

impl ProjectMetadata {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// File entry of a push request
#[derive(Debug, Clone, Serialize)]
pub struct PushFile {
    pub path: String,
    pub checksum: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<String>,
    /// Chunk ids, present for uploaded (added and updated) files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PushChanges {
    pub added: Vec<PushFile>,
    pub updated: Vec<PushFile>,
    pub removed: Vec<PushFile>,
}

/// Push request body
#[derive(Debug, Serialize)]
pub struct PushRequest<'a> {
    pub version: &'a str,
    pub changes: &'a PushChanges,
}

/// Push response; carries a transaction id when file content must be uploaded.
#[derive(Debug, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub transaction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_response_to_info() {
        let json = r#"{
            "name": "mediasync",
            "namespace": "test",
            "version": "v3",
            "files": [
                {"path": "img1.png", "checksum": "aa", "size": 4, "mtime": "2024-01-01T00:00:00Z"},
                {"path": "images/img2.jpg", "checksum": "bb", "size": 7}
            ]
        }"#;

        let project: ProjectResponse = serde_json::from_str(json).unwrap();
        let info = project.to_info();

        assert_eq!(info.version, "v3");
        assert_eq!(info.files.len(), 2);
        assert_eq!(info.files[1].path, "images/img2.jpg");
        assert_eq!(info.files[1].checksum.as_deref(), Some("bb"));
        assert_eq!(info.files[1].size, Some(7));
    }

    #[test]
    fn test_push_request_serialization_skips_empty_fields() {
        let changes = PushChanges {
            removed: vec![PushFile {
                path: "img1.png".into(),
                checksum: "aa".into(),
                size: 4,
                mtime: None,
                chunks: None,
            }],
            ..PushChanges::default()
        };
        let body = serde_json::to_value(PushRequest {
            version: "v3",
            changes: &changes,
        })
        .unwrap();

        assert_eq!(body["version"], "v3");
        assert_eq!(body["changes"]["added"], serde_json::json!([]));
        assert!(body["changes"]["removed"][0].get("chunks").is_none());
    }
}
