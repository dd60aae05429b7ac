use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hash::HashAlgorithm;
use crate::secrets::{expand_home, SecretSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub preservation: PreservationSettings,
    pub repository: RepositorySettings,
    pub archivematica: ArchivematicaSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Config {
    /// `database_path` with `~` expanded, or the default location under the
    /// user's home.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match self.database_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Some(PathBuf::from(expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreservationSettings {
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    #[serde(default = "default_max_package_size_mb")]
    pub max_package_size_mb: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default)]
    pub enabled_collections: Vec<u64>,
    #[serde(default)]
    pub metadata_mapping: Vec<MetadataMapping>,
    #[serde(default)]
    pub required_metadata: Vec<String>,
    #[serde(default)]
    pub fixed_metadata: Vec<FixedMetadata>,
    #[serde(default = "default_true")]
    pub document_required: bool,
    /// Staging directory for generated packages.
    #[serde(default)]
    pub package_root: Option<String>,
    #[serde(default)]
    pub cleanup_policy: CleanupPolicy,
    #[serde(default = "default_identifier_prefix")]
    pub identifier_prefix: String,
    #[serde(default = "default_originating_system")]
    pub originating_system: String,
    #[serde(default = "default_transfer_type")]
    pub transfer_type: String,
}

impl Default for PreservationSettings {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::default(),
            max_package_size_mb: default_max_package_size_mb(),
            retry_attempts: default_retry_attempts(),
            enabled_collections: Vec::new(),
            metadata_mapping: Vec::new(),
            required_metadata: Vec::new(),
            fixed_metadata: Vec::new(),
            document_required: true,
            package_root: None,
            cleanup_policy: CleanupPolicy::default(),
            identifier_prefix: default_identifier_prefix(),
            originating_system: default_originating_system(),
            transfer_type: default_transfer_type(),
        }
    }
}

/// Maps a repository metadata field to a Dublin Core element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataMapping {
    pub field: String,
    pub element: String,
}

/// A constant element written into every package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedMetadata {
    pub element: String,
    pub value: String,
}

/// What happens to a partially written package directory when a build fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Leave the partial directory in place for inspection.
    #[default]
    Keep,
    RemoveOnFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    pub url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(flatten)]
    pub key: SecretSource,
    #[serde(default = "default_repository_timeout")]
    pub timeout_secs: u64,
    /// Public URL prefix of uploaded media, e.g. `https://site/wp-content/uploads/`.
    #[serde(default)]
    pub media_url_prefix: Option<String>,
    /// Local directory the media URL prefix maps to.
    #[serde(default)]
    pub media_root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivematicaSettings {
    pub url: String,
    pub user: String,
    #[serde(flatten)]
    pub key: SecretSource,
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
    /// Transfer source location registered in the storage service. When
    /// set, package paths are sent relative to that location.
    #[serde(default)]
    pub transfer_location_uuid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleFrequency {
    Hourly,
    #[serde(rename = "twicedaily")]
    TwiceDaily,
    #[default]
    Daily,
    Weekly,
}

impl ScheduleFrequency {
    pub fn interval(&self) -> Duration {
        match self {
            ScheduleFrequency::Hourly => Duration::from_secs(60 * 60),
            ScheduleFrequency::TwiceDaily => Duration::from_secs(12 * 60 * 60),
            ScheduleFrequency::Daily => Duration::from_secs(24 * 60 * 60),
            ScheduleFrequency::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default)]
    pub frequency: ScheduleFrequency,
    /// Overrides `frequency` when set.
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    #[serde(default = "default_poll_limit")]
    pub poll_limit: usize,
    #[serde(default = "default_stale_after")]
    pub stale_processing_after_secs: u64,
    /// Parallel queue workers; 0 picks one per CPU.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl ScheduleSettings {
    pub fn interval(&self) -> Duration {
        match self.interval_secs {
            Some(secs) => Duration::from_secs(secs),
            None => self.frequency.interval(),
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            frequency: ScheduleFrequency::default(),
            interval_secs: None,
            batch_limit: default_batch_limit(),
            poll_limit: default_poll_limit(),
            stale_processing_after_secs: default_stale_after(),
            worker_count: default_worker_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_true")]
    pub keep_critical: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            format: LogFormat::default(),
            retention_days: default_retention_days(),
            keep_critical: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_package_size_mb() -> u64 {
    1024
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_identifier_prefix() -> String {
    "tainacan".to_string()
}

fn default_originating_system() -> String {
    "Tainacan Repository".to_string()
}

fn default_transfer_type() -> String {
    "standard".to_string()
}

fn default_repository_timeout() -> u64 {
    30
}

fn default_backend_timeout() -> u64 {
    45
}

fn default_batch_limit() -> usize {
    20
}

fn default_poll_limit() -> usize {
    20
}

fn default_stale_after() -> u64 {
    3600
}

fn default_worker_count() -> usize {
    1
}

fn default_retention_days() -> u32 {
    90
}
