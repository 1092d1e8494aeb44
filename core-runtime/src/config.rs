//! # Media Sync Configuration
//!
//! Loads the YAML configuration file, applies environment overrides and
//! validates everything once into a typed [`MediaSyncConfig`].
//!
//! ## Overview
//!
//! Components never look at raw settings. Optional and structured values
//! (driver sections, reference specs, share lists) are checked here and
//! turned into enums and complete structs, so a value of
//! [`MediaSyncConfig`] is always consistent.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::MediaSyncConfig;
//!
//! let config = MediaSyncConfig::load("config.yaml")?;
//! println!("syncing {}", config.mergin.project_name);
//! ```
//!
//! ## Environment overrides
//!
//! Nested keys can be overridden with `SECTION__KEY` variables (for example
//! `MERGIN__PASSWORD` or `MINIO__SECRET_KEY`) and top-level scalars with
//! their upper-case name (`OPERATION_MODE`, `PROJECT_WORKING_DIR`). Values
//! are parsed as YAML scalars, so `MINIO__SECURE=true` yields a boolean.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default daemon poll interval in seconds.
pub const DEFAULT_SLEEP_TIME_SECS: u64 = 10;

/// Spatial extension loaded into reference databases unless configured otherwise.
pub const DEFAULT_SPATIAL_EXTENSION: &str = "mod_spatialite";

pub const DEFAULT_MERGIN_URL: &str = "https://app.merginmaps.com";

const NESTED_SECTIONS: &[&str] = &["mergin", "local", "minio", "google_drive", "daemon"];

const TOP_LEVEL_SCALARS: &[&str] = &[
    "project_working_dir",
    "operation_mode",
    "driver",
    "base_path",
    "allowed_extensions",
    "spatial_extension",
];

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$";

// ============================================================================
// Typed configuration
// ============================================================================

/// What happens to a media file in the working copy after it was externalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Keep the file in the working copy.
    Copy,
    /// Delete the file once it is uploaded and its references are rewritten.
    Move,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationMode::Copy => f.write_str("copy"),
            OperationMode::Move => f.write_str("move"),
        }
    }
}

impl FromStr for OperationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "copy" => Ok(OperationMode::Copy),
            "move" => Ok(OperationMode::Move),
            _ => Err(config_error("Unsupported operation mode")),
        }
    }
}

/// Credentials and identity of the Mergin project.
#[derive(Clone, PartialEq, Eq)]
pub struct MerginSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Full project name, `<namespace>/<name>`.
    pub project_name: String,
}

impl fmt::Debug for MerginSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerginSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("project_name", &self.project_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    pub dest: PathBuf,
}

#[derive(Clone, PartialEq, Eq)]
pub struct MinioSettings {
    /// Host (and optional port), with or without a URL scheme.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Prefix prepended to every object key.
    pub bucket_subpath: Option<String>,
    pub secure: bool,
    pub region: Option<String>,
}

impl fmt::Debug for MinioSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinioSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("bucket_subpath", &self.bucket_subpath)
            .field("secure", &self.secure)
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleDriveSettings {
    pub service_account_file: PathBuf,
    pub folder: String,
    /// Validated email addresses the folder is shared with.
    pub share_with: Vec<String>,
}

/// Storage backend selection with its settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSettings {
    Local(LocalSettings),
    Minio(MinioSettings),
    GoogleDrive(GoogleDriveSettings),
}

impl DriverSettings {
    pub fn name(&self) -> &'static str {
        match self {
            DriverSettings::Local(_) => "local",
            DriverSettings::Minio(_) => "minio",
            DriverSettings::GoogleDrive(_) => "google_drive",
        }
    }
}

/// Where references to synced files are stored.
///
/// `file` is relative to the project working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub file: String,
    pub table: String,
    pub local_path_column: String,
    pub driver_path_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    pub sleep_time: Duration,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            sleep_time: Duration::from_secs(DEFAULT_SLEEP_TIME_SECS),
        }
    }
}

/// Validated media sync configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSyncConfig {
    pub mergin: MerginSettings,
    pub project_working_dir: PathBuf,
    pub operation_mode: OperationMode,
    pub driver: DriverSettings,
    /// Extensions without leading dot, never empty.
    pub allowed_extensions: Vec<String>,
    /// Plain string prefix that selected paths must start with.
    pub base_path: Option<String>,
    pub references: Vec<ReferenceSpec>,
    /// `None` when no spatial extension should be loaded.
    pub spatial_extension: Option<String>,
    pub daemon: DaemonSettings,
}

impl MediaSyncConfig {
    /// Read, override from the process environment and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(format!("Cannot read config file {}: {}", path.display(), e))
        })?;

        let mut value = parse_document(&content)?;
        apply_env_overrides(&mut value, std::env::vars());
        let config = Self::from_value(value)?;

        info!(
            path = %path.display(),
            driver = config.driver.name(),
            mode = %config.operation_mode,
            references = config.references.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate a YAML document without consulting the environment.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::from_value(parse_document(content)?)
    }

    fn from_value(value: Value) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_value(value)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        raw.validate()
    }
}

fn config_error(message: &str) -> Error {
    Error::Config(format!("Config error: {}", message))
}

fn parse_document(content: &str) -> Result<Value> {
    let value: Value = serde_yaml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid YAML: {}", e)))?;
    match value {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        Value::Mapping(_) => Ok(value),
        _ => Err(Error::Config(
            "Invalid configuration: top level must be a mapping".to_string(),
        )),
    }
}

/// Apply `SECTION__KEY` / `KEY` overrides onto a parsed document.
pub fn apply_env_overrides<I>(document: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let Value::Mapping(root) = document else {
        return;
    };

    for (name, raw_value) in vars {
        let name = name.to_ascii_lowercase();
        let value = parse_scalar(&raw_value);

        if let Some((section, key)) = name.split_once("__") {
            if !NESTED_SECTIONS.contains(&section) || key.is_empty() {
                continue;
            }
            let entry = root
                .entry(Value::String(section.to_string()))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            if let Value::Mapping(section_map) = entry {
                section_map.insert(Value::String(key.to_string()), value);
            }
        } else if TOP_LEVEL_SCALARS.contains(&name.as_str()) {
            root.insert(Value::String(name), value);
        }
    }
}

fn parse_scalar(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::String(String::new());
    }
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null | Value::Sequence(_))) => {
            value
        }
        _ => Value::String(raw.to_string()),
    }
}

// ============================================================================
// Raw document
// ============================================================================

/// Scalar or list of scalars (comma-separated strings are split).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn into_items(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => s.split(',').map(str::to_string).collect(),
            StringOrList::Many(items) => items,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    mergin: Option<RawMergin>,
    project_working_dir: Option<String>,
    operation_mode: Option<String>,
    driver: Option<String>,
    local: Option<RawLocal>,
    minio: Option<RawMinio>,
    google_drive: Option<RawGoogleDrive>,
    references: Option<Vec<RawReference>>,
    base_path: Option<String>,
    allowed_extensions: Option<StringOrList>,
    spatial_extension: Option<String>,
    daemon: Option<RawDaemon>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMergin {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    project_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLocal {
    dest: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMinio {
    endpoint: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    bucket: Option<String>,
    bucket_subpath: Option<String>,
    secure: Option<bool>,
    region: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGoogleDrive {
    service_account_file: Option<String>,
    folder: Option<String>,
    share_with: Option<StringOrList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawReference {
    file: Option<String>,
    table: Option<String>,
    local_path_column: Option<String>,
    driver_path_column: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDaemon {
    sleep_time: Option<u64>,
}

/// Empty strings count as missing.
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawConfig {
    fn validate(self) -> Result<MediaSyncConfig> {
        let mergin = self.mergin.unwrap_or_default().validate()?;

        let project_working_dir = present(self.project_working_dir)
            .map(PathBuf::from)
            .ok_or_else(|| config_error("Missing project working directory"))?;

        let driver_name = present(self.driver);
        let driver = match driver_name.as_deref() {
            Some("local") => DriverSettings::Local(self.local.unwrap_or_default().validate()?),
            Some("minio") => DriverSettings::Minio(self.minio.unwrap_or_default().validate()?),
            Some("google_drive") => {
                DriverSettings::GoogleDrive(self.google_drive.unwrap_or_default().validate()?)
            }
            _ => return Err(config_error("Unsupported driver")),
        };

        let operation_mode = present(self.operation_mode)
            .ok_or_else(|| config_error("Unsupported operation mode"))?
            .parse()?;

        let allowed_extensions: Vec<String> = self
            .allowed_extensions
            .map(StringOrList::into_items)
            .unwrap_or_default()
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        if allowed_extensions.is_empty() {
            return Err(config_error("Allowed extensions can not be empty"));
        }

        let mut references = Vec::new();
        for (index, reference) in self.references.unwrap_or_default().into_iter().enumerate() {
            match reference.validate()? {
                Some(spec) => references.push(spec),
                None => warn!(index, "Skipping empty media reference entry"),
            }
        }

        let spatial_extension = match self.spatial_extension {
            None => Some(DEFAULT_SPATIAL_EXTENSION.to_string()),
            Some(name) => present(Some(name)),
        };

        let daemon = match self.daemon.and_then(|d| d.sleep_time) {
            Some(0) => return Err(config_error("Daemon sleep time must be positive")),
            Some(secs) => DaemonSettings {
                sleep_time: Duration::from_secs(secs),
            },
            None => DaemonSettings::default(),
        };

        Ok(MediaSyncConfig {
            mergin,
            project_working_dir,
            operation_mode,
            driver,
            allowed_extensions,
            base_path: present(self.base_path),
            references,
            spatial_extension,
            daemon,
        })
    }
}

impl RawMergin {
    fn validate(self) -> Result<MerginSettings> {
        match (
            present(self.username),
            self.password.filter(|p| !p.is_empty()),
            present(self.project_name),
        ) {
            (Some(username), Some(password), Some(project_name)) => Ok(MerginSettings {
                url: present(self.url)
                    .unwrap_or_else(|| DEFAULT_MERGIN_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                username,
                password,
                project_name,
            }),
            _ => Err(config_error("Incorrect mergin settings")),
        }
    }
}

impl RawLocal {
    fn validate(self) -> Result<LocalSettings> {
        present(self.dest)
            .map(|dest| LocalSettings {
                dest: PathBuf::from(dest),
            })
            .ok_or_else(|| config_error("Incorrect Local driver settings"))
    }
}

impl RawMinio {
    fn validate(self) -> Result<MinioSettings> {
        match (
            present(self.endpoint),
            present(self.access_key),
            present(self.secret_key),
            present(self.bucket),
        ) {
            (Some(endpoint), Some(access_key), Some(secret_key), Some(bucket)) => {
                Ok(MinioSettings {
                    endpoint,
                    access_key,
                    secret_key,
                    bucket,
                    bucket_subpath: present(self.bucket_subpath)
                        .map(|p| p.trim_matches('/').to_string())
                        .filter(|p| !p.is_empty()),
                    secure: self.secure.unwrap_or(false),
                    region: present(self.region),
                })
            }
            _ => Err(config_error("Incorrect MinIO driver settings")),
        }
    }
}

impl RawGoogleDrive {
    fn validate(self) -> Result<GoogleDriveSettings> {
        let (Some(service_account_file), Some(folder)) =
            (present(self.service_account_file), present(self.folder))
        else {
            return Err(config_error("Incorrect Google Drive driver settings"));
        };

        let share_with = match self.share_with {
            Some(entries) => valid_emails(entries.into_items())?,
            None => Vec::new(),
        };

        Ok(GoogleDriveSettings {
            service_account_file: PathBuf::from(service_account_file),
            folder,
            share_with,
        })
    }
}

fn valid_emails(candidates: Vec<String>) -> Result<Vec<String>> {
    let pattern = Regex::new(EMAIL_PATTERN)
        .map_err(|e| Error::Internal(format!("Invalid email pattern: {}", e)))?;

    Ok(candidates
        .into_iter()
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .filter(|email| {
            let valid = pattern.is_match(email);
            if !valid {
                warn!(
                    email = %crate::logging::redact_if_sensitive("email", email),
                    "Ignoring invalid share_with address"
                );
            }
            valid
        })
        .collect())
}

impl RawReference {
    /// `Ok(None)` for an entirely empty entry, an error for a partial one.
    fn validate(self) -> Result<Option<ReferenceSpec>> {
        let fields = (
            present(self.file),
            present(self.table),
            present(self.local_path_column),
            present(self.driver_path_column),
        );
        match fields {
            (Some(file), Some(table), Some(local_path_column), Some(driver_path_column)) => {
                Ok(Some(ReferenceSpec {
                    file,
                    table,
                    local_path_column,
                    driver_path_column,
                }))
            }
            (None, None, None, None) => Ok(None),
            _ => Err(config_error("Incorrect media reference settings")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
mergin:
  url: https://app.merginmaps.com/
  username: sync-bot
  password: secret
  project_name: test/mediasync
project_working_dir: /tmp/working_project
operation_mode: copy
driver: minio
minio:
  endpoint: localhost:9000
  access_key: EXAMPLEKEY
  secret_key: EXAMPLESECRET
  bucket: test
  bucket_subpath: /media/
references:
  - file: survey.gpkg
    table: notes
    local_path_column: photo
    driver_path_column: ext_url
allowed_extensions: [png, ".jpg"]
base_path: ""
"#;

    fn with(overrides: &[(&str, &str)]) -> Result<MediaSyncConfig> {
        let mut document = parse_document(VALID).unwrap();
        apply_env_overrides(
            &mut document,
            overrides
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        MediaSyncConfig::from_value(document)
    }

    fn message(result: Result<MediaSyncConfig>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_valid_config() {
        let config = MediaSyncConfig::from_yaml_str(VALID).unwrap();

        assert_eq!(config.mergin.url, "https://app.merginmaps.com");
        assert_eq!(config.mergin.project_name, "test/mediasync");
        assert_eq!(config.operation_mode, OperationMode::Copy);
        assert_eq!(config.allowed_extensions, vec!["png", "jpg"]);
        assert_eq!(config.base_path, None);
        assert_eq!(config.references.len(), 1);
        assert_eq!(config.references[0].driver_path_column, "ext_url");
        assert_eq!(
            config.spatial_extension.as_deref(),
            Some(DEFAULT_SPATIAL_EXTENSION)
        );
        assert_eq!(config.daemon.sleep_time, Duration::from_secs(10));

        let DriverSettings::Minio(minio) = config.driver else {
            panic!("expected minio driver");
        };
        assert_eq!(minio.bucket_subpath.as_deref(), Some("media"));
        assert!(!minio.secure);
    }

    #[test]
    fn test_invalid_settings_messages() {
        assert!(message(with(&[("MERGIN__USERNAME", "")]))
            .contains("Config error: Incorrect mergin settings"));
        assert!(message(with(&[("DRIVER", "ftp")])).contains("Config error: Unsupported driver"));
        assert!(message(with(&[("DRIVER", "local")]))
            .contains("Config error: Incorrect Local driver settings"));
        assert!(message(with(&[("MINIO__ENDPOINT", "")]))
            .contains("Config error: Incorrect MinIO driver settings"));
        assert!(message(with(&[("DRIVER", "google_drive")]))
            .contains("Config error: Incorrect Google Drive driver settings"));
        assert!(message(with(&[("ALLOWED_EXTENSIONS", "")]))
            .contains("Config error: Allowed extensions can not be empty"));
        assert!(message(with(&[("OPERATION_MODE", "")]))
            .contains("Config error: Unsupported operation mode"));
        assert!(message(with(&[("OPERATION_MODE", "Move")]))
            .contains("Config error: Unsupported operation mode"));
    }

    #[test]
    fn test_partial_reference_is_rejected() {
        let yaml = VALID.replace(
            "    table: notes\n    local_path_column: photo\n    driver_path_column: ext_url\n",
            "",
        );
        let err = MediaSyncConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err
            .to_string()
            .contains("Config error: Incorrect media reference settings"));
    }

    #[test]
    fn test_empty_references_are_allowed() {
        let yaml = VALID.replace(
            "  - file: survey.gpkg\n    table: notes\n    local_path_column: photo\n    driver_path_column: ext_url\n",
            "  - file:\n",
        );
        let config = MediaSyncConfig::from_yaml_str(&yaml).unwrap();
        assert!(config.references.is_empty());

        let without = VALID.split("references:").next().unwrap().to_string()
            + "allowed_extensions: png\n";
        let config = MediaSyncConfig::from_yaml_str(&without).unwrap();
        assert!(config.references.is_empty());
    }

    #[test]
    fn test_env_overrides_nested_and_top_level_keys() {
        let config = with(&[
            ("OPERATION_MODE", "move"),
            ("MINIO__SECURE", "true"),
            ("DAEMON__SLEEP_TIME", "60"),
            ("ALLOWED_EXTENSIONS", "png,jpg, tif"),
            ("BASE_PATH", "images"),
            ("UNRELATED__KEY", "ignored"),
            ("HOME", "/root"),
        ])
        .unwrap();

        assert_eq!(config.operation_mode, OperationMode::Move);
        assert_eq!(config.allowed_extensions, vec!["png", "jpg", "tif"]);
        assert_eq!(config.base_path.as_deref(), Some("images"));
        assert_eq!(config.daemon.sleep_time, Duration::from_secs(60));
        let DriverSettings::Minio(minio) = config.driver else {
            panic!("expected minio driver");
        };
        assert!(minio.secure);
    }

    #[test]
    fn test_google_drive_share_with_filters_invalid_emails() {
        let config = with(&[
            ("DRIVER", "google_drive"),
            ("GOOGLE_DRIVE__SERVICE_ACCOUNT_FILE", "/etc/media-sync/sa.json"),
            ("GOOGLE_DRIVE__FOLDER", "mergin-media"),
            (
                "GOOGLE_DRIVE__SHARE_WITH",
                "[alice@example.com, not-an-email, bob.smith+media@sub.example.org]",
            ),
        ])
        .unwrap();

        let DriverSettings::GoogleDrive(drive) = config.driver else {
            panic!("expected google drive driver");
        };
        assert_eq!(drive.folder, "mergin-media");
        assert_eq!(
            drive.share_with,
            vec!["alice@example.com", "bob.smith+media@sub.example.org"]
        );
    }

    #[test]
    fn test_empty_sections_are_tolerated() {
        let yaml = format!("{}local:\ngoogle_drive:\ndaemon:\n", VALID);
        let config = MediaSyncConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.driver.name(), "minio");
        assert_eq!(config.daemon, DaemonSettings::default());
    }

    #[test]
    fn test_spatial_extension_can_be_disabled() {
        let config = with(&[("SPATIAL_EXTENSION", "")]).unwrap();
        assert_eq!(config.spatial_extension, None);
    }

    #[test]
    fn test_password_is_not_printed() {
        let config = MediaSyncConfig::from_yaml_str(VALID).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("EXAMPLESECRET"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, VALID).unwrap();

        assert!(MediaSyncConfig::load(&path).is_ok());
        assert!(matches!(
            MediaSyncConfig::load(dir.path().join("missing.yaml")),
            Err(Error::Io(_))
        ));
    }
}
