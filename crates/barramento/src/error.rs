use std::path::PathBuf;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Coarse classification of every failure the pipeline can surface.
///
/// Callers (CLI, cron wrappers, a future HTTP surface) branch on this
/// instead of matching error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    PackageGenerationFailed,
    BackendRequestFailed,
    StructureInvalid,
    SizeExceeded,
    InvalidTransition,
    Configuration,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::PackageGenerationFailed => "package_generation_failed",
            ErrorKind::BackendRequestFailed => "backend_request_failed",
            ErrorKind::StructureInvalid => "structure_invalid",
            ErrorKind::SizeExceeded => "size_exceeded",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PreservationError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Package generation failed: {0}")]
    Package(#[from] PackageError),

    #[error("Backend request failed: {0}")]
    Client(#[from] ClientError),

    #[error("Invalid status transition for item {item_id}: {from} -> {to}")]
    InvalidTransition {
        item_id: u64,
        from: String,
        to: String,
    },

    #[error("Integrity check failed: {0}")]
    Hash(#[from] HashError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl PreservationError {
    pub fn not_found(what: &'static str, id: impl ToString) -> Self {
        PreservationError::NotFound {
            what,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PreservationError::NotFound { .. } => ErrorKind::NotFound,
            PreservationError::Validation(e) => e.kind(),
            PreservationError::Package(PackageError::MainDocumentMissing { .. }) => {
                ErrorKind::NotFound
            }
            PreservationError::Package(_) => ErrorKind::PackageGenerationFailed,
            PreservationError::Client(ClientError::NotFound { .. }) => ErrorKind::NotFound,
            PreservationError::Client(_) => ErrorKind::BackendRequestFailed,
            PreservationError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            PreservationError::Hash(HashError::FileNotFound(_))
            | PreservationError::Hash(HashError::DirectoryNotFound(_)) => ErrorKind::NotFound,
            PreservationError::Hash(_) => ErrorKind::Storage,
            PreservationError::Config(_) => ErrorKind::Configuration,
            PreservationError::Database(_) => ErrorKind::Storage,
        }
    }

    /// Structured payload describing the failure, suitable for JSON output
    /// and for the audit log context.
    pub fn details(&self) -> serde_json::Value {
        match self {
            PreservationError::NotFound { what, id } => json!({ "what": what, "id": id }),
            PreservationError::Validation(ValidationError::Rejected { reasons }) => {
                json!({ "reasons": reasons })
            }
            PreservationError::Validation(ValidationError::Structure { violations }) => {
                json!({
                    "violations": violations.iter().map(|v| v.to_string()).collect::<Vec<_>>()
                })
            }
            PreservationError::Validation(ValidationError::PackageTooLarge {
                size_bytes,
                limit_mb,
            }) => json!({ "size_bytes": size_bytes, "limit_mb": limit_mb }),
            PreservationError::Client(ClientError::Status { status, message }) => {
                json!({ "status": status, "message": message })
            }
            PreservationError::InvalidTransition { item_id, from, to } => {
                json!({ "item_id": item_id, "from": from, "to": to })
            }
            other => json!({ "message": other.to_string() }),
        }
    }

    /// Reasons carried by a validation rejection, empty for every other error.
    pub fn reasons(&self) -> &[String] {
        match self {
            PreservationError::Validation(ValidationError::Rejected { reasons }) => reasons,
            _ => &[],
        }
    }
}

#[derive(Error, Debug)]
pub enum HashError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("No files found in directory: {0}")]
    NoFilesFound(PathBuf),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Failed to hash '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk directory '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Validation failed: {}", .reasons.join("; "))]
    Rejected { reasons: Vec<String> },

    #[error("Invalid package structure: {}", join_violations(.violations))]
    Structure { violations: Vec<StructureViolation> },

    #[error("Package size ({}) exceeds the maximum allowed ({limit_mb} MB)", size_label(.size_bytes))]
    PackageTooLarge { size_bytes: u64, limit_mb: u64 },

    #[error("Failed to inspect package '{path}': {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::Rejected { .. } => ErrorKind::ValidationFailed,
            ValidationError::Structure { .. } => ErrorKind::StructureInvalid,
            ValidationError::PackageTooLarge { .. } => ErrorKind::SizeExceeded,
            ValidationError::Inspect { .. } => ErrorKind::Storage,
        }
    }
}

/// One defect found while checking a package skeleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureViolation {
    MissingDirectory(String),
    MissingFile(String),
    EmptyObjectsDirectory,
}

impl std::fmt::Display for StructureViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureViolation::MissingDirectory(d) => write!(f, "missing directory '{}'", d),
            StructureViolation::MissingFile(p) => write!(f, "missing file '{}'", p),
            StructureViolation::EmptyObjectsDirectory => f.write_str("objects directory is empty"),
        }
    }
}

fn size_label(bytes: &u64) -> String {
    crate::hash::format_file_size(*bytes)
}

fn join_violations(violations: &[StructureViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Item {item_id} has no primary document to package")]
    MainDocumentMissing { item_id: u64 },

    #[error("Primary document not found on disk: {0}")]
    MainDocumentNotFound(PathBuf),

    #[error("Failed to copy '{from}' to '{to}': {source}")]
    FileCopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render {document}: {reason}")]
    Render {
        document: &'static str,
        reason: String,
    },

    #[error("Hashing failed: {0}")]
    Hash(#[from] HashError),

    #[error("Failed to record package: {0}")]
    Record(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{message} ({status})")]
    Status { status: u16, message: String },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Missing credentials for {service}")]
    MissingCredentials { service: &'static str },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret resolution failed for {field}: {source}")]
    Secret {
        field: &'static str,
        #[source]
        source: crate::secrets::SecretError,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, PreservationError>;
