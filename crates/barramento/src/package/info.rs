use std::path::PathBuf;

use serde::Serialize;

use crate::hash::HashAlgorithm;

/// A payload file copied into a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageFile {
    /// Absolute location on disk.
    pub path: PathBuf,
    /// Location relative to the package root, e.g. `objects/attachments/map.tif`.
    pub relative_path: String,
    pub size: u64,
    pub checksum: String,
    pub mime_type: String,
}

/// An attachment left out of a package because it could not be copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAttachment {
    pub source: String,
    pub reason: String,
}

/// Result of a successful package build.
#[derive(Debug, Clone, Serialize)]
pub struct PackageInfo {
    pub object_id: i64,
    pub sip_id: String,
    pub batch_id: String,
    pub path: PathBuf,
    /// Primary document first, then attachments in repository order.
    pub files: Vec<PackageFile>,
    pub hash: String,
    pub algorithm: HashAlgorithm,
    pub size: u64,
    pub skipped_attachments: Vec<SkippedAttachment>,
}
