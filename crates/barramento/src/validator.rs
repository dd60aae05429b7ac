//! Readiness checks for items and built packages.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::audit::AuditLog;
use crate::db::{object_repo, Database};
use crate::error::{StructureViolation, ValidationError};
use crate::hash;
use crate::package::{DC_FILE, METADATA_DIR, METS_FILE, OBJECTS_DIR, SUBMISSION_DOCS_DIR};
use crate::pipeline::config::PreservationConfig;
use crate::repository::Item;

pub struct Validator {
    config: Arc<PreservationConfig>,
    db: Database,
    audit: AuditLog,
}

impl Validator {
    pub fn new(config: Arc<PreservationConfig>, db: Database, audit: AuditLog) -> Self {
        Self { config, db, audit }
    }

    /// Checks that an item can be packaged. Every failing rule contributes
    /// one reason to the returned error.
    ///
    /// A document that is present must resolve to a local file even when
    /// documents are optional.
    pub fn validate_item(&self, item: &Item) -> Result<(), ValidationError> {
        let mut reasons = Vec::new();

        match item.document.as_ref() {
            None if self.config.document_required => {
                reasons.push("Item has no primary document".to_string())
            }
            None => {}
            Some(document) => match document.file_path.as_deref() {
                None => reasons.push("Primary document has no local file".to_string()),
                Some(path) if !path.is_file() => {
                    reasons.push("Primary document file not found".to_string())
                }
                Some(_) => {}
            },
        }

        for field in &self.config.required_metadata {
            let filled = item.metadata.get(field).is_some_and(|v| !v.is_empty());
            if !filled {
                let name = item
                    .metadata
                    .get(field)
                    .map(|v| v.name.clone())
                    .or_else(|| self.mapped_element(field))
                    .unwrap_or_else(|| field.clone());
                reasons.push(format!("Required metadata \"{}\" not filled", name));
            }
        }

        match object_repo::find_by_item(&self.db, item.id) {
            Ok(Some(existing)) => self.audit.info(
                "Item already has a preservation record",
                json!({
                    "item_id": item.id,
                    "collection_id": item.collection_id,
                    "preservation_status": existing.preservation_status,
                }),
            ),
            Ok(None) => {}
            Err(e) => log::warn!("Could not look up preservation record of item {}: {}", item.id, e),
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Rejected { reasons })
        }
    }

    pub fn is_collection_enabled(&self, collection_id: u64) -> bool {
        self.config.enabled_collections.contains(&collection_id)
    }

    pub fn validate_package_size(&self, path: &Path) -> Result<u64, ValidationError> {
        validate_package_size(path, self.config.max_package_size_mb)
    }

    fn mapped_element(&self, field: &str) -> Option<String> {
        self.config
            .metadata_mapping
            .iter()
            .find(|m| m.field == field)
            .map(|m| format!("field {} ({})", field, m.element))
    }
}

/// Checks the package skeleton: payload, metadata and submission
/// documentation directories, both metadata documents, and at least one
/// payload file.
pub fn validate_package_structure(path: &Path) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    let objects = path.join(OBJECTS_DIR);
    let metadata = path.join(METADATA_DIR);
    let docs = metadata.join(SUBMISSION_DOCS_DIR);

    for (dir, label) in [
        (&objects, OBJECTS_DIR.to_string()),
        (&metadata, METADATA_DIR.to_string()),
        (&docs, format!("{}/{}", METADATA_DIR, SUBMISSION_DOCS_DIR)),
    ] {
        if !dir.is_dir() {
            violations.push(StructureViolation::MissingDirectory(label));
        }
    }

    for file in [DC_FILE, METS_FILE] {
        if !metadata.join(file).is_file() {
            violations.push(StructureViolation::MissingFile(format!(
                "{}/{}",
                METADATA_DIR, file
            )));
        }
    }

    if objects.is_dir() {
        let has_payload = hash::list_files(&objects)
            .map(|files| !files.is_empty())
            .unwrap_or(false);
        if !has_payload {
            violations.push(StructureViolation::EmptyObjectsDirectory);
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Structure { violations })
    }
}

/// Total package size in bytes, or `PackageTooLarge` above `max_mb`.
pub fn validate_package_size(path: &Path, max_mb: u64) -> Result<u64, ValidationError> {
    let size = hash::directory_size(path).map_err(|e| ValidationError::Inspect {
        path: path.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    })?;

    if size > max_mb.saturating_mul(1024 * 1024) {
        return Err(ValidationError::PackageTooLarge {
            size_bytes: size,
            limit_mb: max_mb,
        });
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::db::log_repo::LogFilter;
    use crate::db::object_repo::PackageRecord;
    use crate::repository::{ItemFile, MetadataValue};
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn validator(db: Database) -> Validator {
        validator_with(db, true)
    }

    fn validator_with(db: Database, document_required: bool) -> Validator {
        let config = load_config_from_str(&format!(
            r#"{{
                "version": "1.0",
                "preservation": {{
                    "document_required": {},
                    "enabled_collections": [7],
                    "required_metadata": ["12", "15"],
                    "metadata_mapping": [{{ "field": "15", "element": "subject" }}]
                }},
                "repository": {{ "url": "https://acervo.example.org" }},
                "archivematica": {{ "url": "https://am.example.org", "user": "demo", "api_key": "k" }}
            }}"#,
            document_required
        ))
        .unwrap();
        let audit = AuditLog::new(db.clone(), false);
        Validator::new(Arc::new(PreservationConfig::from_config(&config)), db, audit)
    }

    fn item(document: Option<ItemFile>) -> Item {
        let mut metadata = BTreeMap::new();
        metadata.insert("12".to_string(), MetadataValue::new("Author", json!("Machado")));
        metadata.insert("15".to_string(), MetadataValue::new("Subject", json!(["romance"])));
        Item {
            id: 42,
            title: "Dom Casmurro".to_string(),
            description: String::new(),
            collection_id: 7,
            document,
            attachments: Vec::new(),
            metadata,
            url: None,
            creation_date: None,
            modification_date: None,
        }
    }

    fn document(tmp: &TempDir) -> ItemFile {
        let path = tmp.path().join("livro.pdf");
        fs::write(&path, b"%PDF").unwrap();
        ItemFile {
            file_path: Some(path),
            ..ItemFile::default()
        }
    }

    #[test]
    fn test_valid_item_passes() {
        let tmp = TempDir::new().unwrap();
        let v = validator(Database::open_in_memory().unwrap());
        assert!(v.validate_item(&item(Some(document(&tmp)))).is_ok());
    }

    #[test]
    fn test_all_reasons_collected() {
        let v = validator(Database::open_in_memory().unwrap());
        let mut item = item(None);
        item.metadata.insert("12".to_string(), MetadataValue::new("Author", json!("  ")));
        item.metadata.remove("15");

        match v.validate_item(&item) {
            Err(ValidationError::Rejected { reasons }) => {
                assert_eq!(
                    reasons,
                    vec![
                        "Item has no primary document".to_string(),
                        "Required metadata \"Author\" not filled".to_string(),
                        "Required metadata \"field 15 (subject)\" not filled".to_string(),
                    ]
                );
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_document_file_must_exist() {
        let v = validator(Database::open_in_memory().unwrap());
        let item = item(Some(ItemFile {
            file_path: Some("/nonexistent/livro.pdf".into()),
            ..ItemFile::default()
        }));
        let err = v.validate_item(&item).unwrap_err();
        assert!(err.to_string().contains("Primary document file not found"));
    }

    #[test]
    fn test_optional_document_still_needs_local_file() {
        let v = validator_with(Database::open_in_memory().unwrap(), false);
        assert!(v.validate_item(&item(None)).is_ok());

        let remote = item(Some(ItemFile {
            url: Some("https://acervo.example.org/video".to_string()),
            ..ItemFile::default()
        }));
        match v.validate_item(&remote) {
            Err(ValidationError::Rejected { reasons }) => {
                assert_eq!(reasons, vec!["Primary document has no local file".to_string()]);
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let missing = item(Some(ItemFile {
            file_path: Some("/nonexistent/livro.pdf".into()),
            ..ItemFile::default()
        }));
        let err = v.validate_item(&missing).unwrap_err();
        assert!(err.to_string().contains("Primary document file not found"));
    }

    #[test]
    fn test_prior_record_does_not_block() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        object_repo::record_package(
            &db,
            &PackageRecord {
                item_id: 42,
                collection_id: 7,
                sip_id: "sip-old".to_string(),
                batch_id: None,
            },
            &[],
        )
        .unwrap();
        let v = validator(db.clone());
        assert!(v.validate_item(&item(Some(document(&tmp)))).is_ok());

        let filter = LogFilter {
            item_id: Some(42),
            ..LogFilter::default()
        };
        let (rows, _) = crate::db::log_repo::query(&db, &filter).unwrap();
        let note = rows
            .iter()
            .find(|r| r.message == "Item already has a preservation record")
            .unwrap();
        assert_eq!(note.level, "info");
        assert_eq!(note.collection_id, Some(7));
    }

    #[test]
    fn test_collection_enabled() {
        let v = validator(Database::open_in_memory().unwrap());
        assert!(v.is_collection_enabled(7));
        assert!(!v.is_collection_enabled(8));
    }

    fn skeleton(root: &Path) {
        fs::create_dir_all(root.join("objects")).unwrap();
        fs::create_dir_all(root.join("metadata/submissionDocumentation")).unwrap();
        fs::write(root.join("metadata/dc.xml"), "<metadata/>").unwrap();
        fs::write(root.join("metadata/mets.xml"), "<mets/>").unwrap();
    }

    #[test]
    fn test_structure_reports_every_violation() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("objects/attachments")).unwrap();

        match validate_package_structure(tmp.path()) {
            Err(ValidationError::Structure { violations }) => {
                assert_eq!(
                    violations,
                    vec![
                        StructureViolation::MissingDirectory("metadata".to_string()),
                        StructureViolation::MissingDirectory(
                            "metadata/submissionDocumentation".to_string()
                        ),
                        StructureViolation::MissingFile("metadata/dc.xml".to_string()),
                        StructureViolation::MissingFile("metadata/mets.xml".to_string()),
                        StructureViolation::EmptyObjectsDirectory,
                    ]
                );
            }
            other => panic!("expected structure error, got {:?}", other),
        }
    }

    #[test]
    fn test_structure_accepts_complete_skeleton() {
        let tmp = TempDir::new().unwrap();
        skeleton(tmp.path());
        fs::write(tmp.path().join("objects/livro.pdf"), b"%PDF").unwrap();
        assert!(validate_package_structure(tmp.path()).is_ok());
    }

    #[test]
    fn test_package_size_limit() {
        let tmp = TempDir::new().unwrap();
        skeleton(tmp.path());
        fs::write(tmp.path().join("objects/big.bin"), vec![0u8; 1024 * 1024 + 1]).unwrap();

        let err = validate_package_size(tmp.path(), 1).unwrap_err();
        assert!(matches!(err, ValidationError::PackageTooLarge { limit_mb: 1, .. }));
        assert!(validate_package_size(tmp.path(), 2).unwrap() > 1024 * 1024);
    }
}
