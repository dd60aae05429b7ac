use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::schema::CleanupPolicy;
use crate::db::hash_repo::NewHashRow;
use crate::db::object_repo::{self, PackageRecord};
use crate::db::Database;
use crate::error::PackageError;
use crate::hash::{self, HashAlgorithm};
use crate::pipeline::config::PreservationConfig;
use crate::repository::{Item, ItemFile};
use crate::sanitize;

use super::dublin_core;
use super::info::{PackageFile, PackageInfo, SkippedAttachment};
use super::mets::MetsDocument;
use super::{
    ATTACHMENTS_DIR, DC_FILE, METADATA_DIR, METS_FILE, OBJECTS_DIR, SNAPSHOT_FILE,
    SUBMISSION_DOCS_DIR,
};

/// Assembles packages under the configured package root and records them.
pub struct PackageBuilder {
    config: Arc<PreservationConfig>,
    db: Database,
}

impl PackageBuilder {
    pub fn new(config: Arc<PreservationConfig>, db: Database) -> Self {
        Self { config, db }
    }

    /// Builds a package for `item` and records it as `sip_created`.
    ///
    /// A failed build leaves its partial directory in place unless the
    /// cleanup policy says otherwise.
    pub fn build(&self, item: &Item) -> Result<PackageInfo, PackageError> {
        let sip_id = new_id("sip");
        let batch_id = new_id("batch");
        let dir = self.config.package_root.join(&sip_id);

        match self.write_package(item, &sip_id, &batch_id, &dir) {
            Ok(info) => {
                info!(
                    item_id = item.id,
                    sip_id = %info.sip_id,
                    files = info.files.len(),
                    size = %hash::format_file_size(info.size),
                    "Package built"
                );
                Ok(info)
            }
            Err(e) => {
                self.discard(&dir);
                Err(e)
            }
        }
    }

    fn write_package(
        &self,
        item: &Item,
        sip_id: &str,
        batch_id: &str,
        dir: &Path,
    ) -> Result<PackageInfo, PackageError> {
        let algorithm = self.config.default_hash_algorithm;
        let objects_dir = dir.join(OBJECTS_DIR);
        let metadata_dir = dir.join(METADATA_DIR);
        let docs_dir = metadata_dir.join(SUBMISSION_DOCS_DIR);
        for d in [&objects_dir, &docs_dir] {
            create_dir(d)?;
        }

        let mut files = Vec::new();
        let mut skipped_attachments = Vec::new();

        match &item.document {
            Some(document) => {
                let source = document
                    .file_path
                    .as_deref()
                    .ok_or(PackageError::MainDocumentMissing { item_id: item.id })?;
                if !source.is_file() {
                    return Err(PackageError::MainDocumentNotFound(source.to_path_buf()));
                }
                files.push(copy_into(source, document, &objects_dir, OBJECTS_DIR, algorithm)?);
            }
            None if self.config.document_required => {
                return Err(PackageError::MainDocumentMissing { item_id: item.id });
            }
            None => {}
        }

        if !item.attachments.is_empty() {
            let attachments_dir = objects_dir.join(ATTACHMENTS_DIR);
            create_dir(&attachments_dir)?;
            let relative = format!("{}/{}", OBJECTS_DIR, ATTACHMENTS_DIR);

            for attachment in &item.attachments {
                match copy_attachment(attachment, &attachments_dir, &relative, algorithm) {
                    Ok(file) => files.push(file),
                    Err(skipped) => {
                        warn!(
                            item_id = item.id,
                            attachment = %skipped.source,
                            reason = %skipped.reason,
                            "Attachment skipped"
                        );
                        skipped_attachments.push(skipped);
                    }
                }
            }
        }

        let elements = dublin_core::describe(
            item,
            &self.config.metadata_mapping,
            &self.config.fixed_metadata,
            &self.config.identifier_prefix,
        );
        write_file(&metadata_dir.join(DC_FILE), &dublin_core::render(&elements)?)?;

        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mets = MetsDocument {
            created: &created,
            agent: &self.config.originating_system,
            label: &item.title,
            elements: &elements,
            files: &files,
            algorithm,
        }
        .render()?;
        write_file(&metadata_dir.join(METS_FILE), &mets)?;

        let snapshot = serde_json::to_string_pretty(item).map_err(|e| PackageError::Render {
            document: SNAPSHOT_FILE,
            reason: e.to_string(),
        })?;
        write_file(&docs_dir.join(SNAPSHOT_FILE), &snapshot)?;

        let package_hash = hash::hash_directory(dir, algorithm)?;
        let size = hash::directory_size(dir)?;
        debug!(sip_id, hash = %package_hash, "Package digest computed");

        let mut hashes: Vec<NewHashRow> = files
            .iter()
            .map(|f| NewHashRow {
                hash_type: algorithm.as_str().to_string(),
                hash_value: f.checksum.clone(),
                file_path: f.path.display().to_string(),
                file_size: f.size,
                is_package: false,
            })
            .collect();
        hashes.push(NewHashRow {
            hash_type: algorithm.as_str().to_string(),
            hash_value: package_hash.clone(),
            file_path: dir.display().to_string(),
            file_size: size,
            is_package: true,
        });

        let object_id = object_repo::record_package(
            &self.db,
            &PackageRecord {
                item_id: item.id,
                collection_id: item.collection_id,
                sip_id: sip_id.to_string(),
                batch_id: Some(batch_id.to_string()),
            },
            &hashes,
        )?;

        Ok(PackageInfo {
            object_id,
            sip_id: sip_id.to_string(),
            batch_id: batch_id.to_string(),
            path: dir.to_path_buf(),
            files,
            hash: package_hash,
            algorithm,
            size,
            skipped_attachments,
        })
    }

    fn discard(&self, dir: &Path) {
        if !dir.exists() {
            return;
        }
        match self.config.cleanup_policy {
            CleanupPolicy::Keep => {
                warn!(path = %dir.display(), "Build failed, partial package kept");
            }
            CleanupPolicy::RemoveOnFailure => {
                if let Err(e) = fs::remove_dir_all(dir) {
                    warn!(path = %dir.display(), error = %e, "Failed to remove partial package");
                }
            }
        }
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn create_dir(path: &Path) -> Result<(), PackageError> {
    fs::create_dir_all(path).map_err(|e| PackageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), PackageError> {
    fs::write(path, content).map_err(|e| PackageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

fn copy_attachment(
    attachment: &ItemFile,
    dest_dir: &Path,
    relative_dir: &str,
    algorithm: HashAlgorithm,
) -> Result<PackageFile, SkippedAttachment> {
    let label = attachment
        .file_path
        .as_deref()
        .map(sanitize::redact_path)
        .or_else(|| attachment.url.clone())
        .or_else(|| attachment.id.map(|id| format!("attachment {}", id)))
        .unwrap_or_else(|| "attachment".to_string());
    let skip = |reason: String| SkippedAttachment {
        source: label.clone(),
        reason,
    };

    let source = attachment
        .file_path
        .as_deref()
        .ok_or_else(|| skip("no local file".to_string()))?;
    if !source.is_file() {
        return Err(skip("file not found".to_string()));
    }
    copy_into(source, attachment, dest_dir, relative_dir, algorithm).map_err(|e| skip(e.to_string()))
}

/// Copies `source` into `dest_dir` under a name not yet taken there and
/// hashes the copy.
fn copy_into(
    source: &Path,
    file: &ItemFile,
    dest_dir: &Path,
    relative_dir: &str,
    algorithm: HashAlgorithm,
) -> Result<PackageFile, PackageError> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let dest = free_destination(dest_dir, &name).ok_or_else(|| PackageError::FileCopyFailed {
        from: source.to_path_buf(),
        to: dest_dir.join(&name),
        source: std::io::Error::from(std::io::ErrorKind::AlreadyExists),
    })?;

    let size = fs::copy(source, &dest).map_err(|e| PackageError::FileCopyFailed {
        from: source.to_path_buf(),
        to: dest.clone(),
        source: e,
    })?;
    let checksum = hash::hash_file(&dest, algorithm)?;

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(name);
    let mime_type = file
        .mime_type
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            mime_guess::from_path(source)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

    Ok(PackageFile {
        path: dest,
        relative_path: format!("{}/{}", relative_dir, file_name),
        size,
        checksum,
        mime_type,
    })
}

/// `name`, or `name_2`, `name_3`, ... when taken.
fn free_destination(dir: &Path, name: &str) -> Option<PathBuf> {
    let (base, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], Some(&name[dot..])),
        _ => (name, None),
    };

    (1..=1000).find_map(|counter| {
        let candidate = if counter == 1 {
            name.to_string()
        } else {
            match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            }
        };
        let path = dir.join(candidate);
        (!path.exists()).then_some(path)
    })
}
