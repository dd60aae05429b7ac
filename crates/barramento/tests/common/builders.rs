//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use barramento::config::{CleanupPolicy, FixedMetadata, MetadataMapping};
use barramento::repository::{Item, ItemFile, MetadataValue};
use barramento::{HashAlgorithm, PreservationConfig};
use serde_json::Value;

/// Field id of the author metadata used throughout the tests.
pub const AUTHOR_FIELD: &str = "12";

/// Builder for `PreservationConfig` with test-friendly defaults: collection
/// 7 enabled, the author field mapped to `creator` and required.
pub struct ConfigBuilder {
    config: PreservationConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PreservationConfig {
                default_hash_algorithm: HashAlgorithm::Sha256,
                max_package_size_mb: 1024,
                retry_attempts: 3,
                enabled_collections: BTreeSet::from([7]),
                metadata_mapping: vec![MetadataMapping {
                    field: AUTHOR_FIELD.to_string(),
                    element: "creator".to_string(),
                }],
                required_metadata: vec![AUTHOR_FIELD.to_string()],
                fixed_metadata: vec![FixedMetadata {
                    element: "dc:rights".to_string(),
                    value: "Public domain".to_string(),
                }],
                scheduled_batch_limit: 20,
                document_required: true,
                package_root: PathBuf::from("/tmp/barramento-packages"),
                cleanup_policy: CleanupPolicy::Keep,
                identifier_prefix: "tainacan".to_string(),
                originating_system: "Tainacan Repository".to_string(),
                transfer_type: "standard".to_string(),
                poll_limit: 20,
                stale_processing_after: Duration::from_secs(3600),
                worker_count: 1,
                debug_mode: false,
            },
        }
    }

    pub fn package_root(mut self, root: &Path) -> Self {
        self.config.package_root = root.to_path_buf();
        self
    }

    pub fn max_package_size_mb(mut self, mb: u64) -> Self {
        self.config.max_package_size_mb = mb;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn enabled_collections(mut self, ids: &[u64]) -> Self {
        self.config.enabled_collections = ids.iter().copied().collect();
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn scheduled_batch_limit(mut self, limit: usize) -> Self {
        self.config.scheduled_batch_limit = limit;
        self
    }

    pub fn cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.config.cleanup_policy = policy;
        self
    }

    pub fn document_required(mut self, required: bool) -> Self {
        self.config.document_required = required;
        self
    }

    pub fn build(self) -> PreservationConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for repository items.
pub struct ItemBuilder {
    item: Item,
}

impl ItemBuilder {
    pub fn new(id: u64, collection_id: u64) -> Self {
        Self {
            item: Item {
                id,
                title: format!("Item {}", id),
                description: String::new(),
                collection_id,
                document: None,
                attachments: Vec::new(),
                metadata: BTreeMap::new(),
                url: Some(format!("https://acervo.example.org/items/{}", id)),
                creation_date: Some("2024-03-01T10:00:00".to_string()),
                modification_date: None,
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.item.title = title.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.item.description = description.to_string();
        self
    }

    pub fn document(mut self, path: &Path) -> Self {
        self.item.document = Some(ItemFile {
            file_path: Some(path.to_path_buf()),
            ..ItemFile::default()
        });
        self
    }

    /// Document that only exists at a URL, like an embedded video.
    pub fn remote_document(mut self, url: &str) -> Self {
        self.item.document = Some(ItemFile {
            url: Some(url.to_string()),
            ..ItemFile::default()
        });
        self
    }

    pub fn attachment(mut self, path: &Path) -> Self {
        self.item.attachments.push(ItemFile {
            file_path: Some(path.to_path_buf()),
            ..ItemFile::default()
        });
        self
    }

    pub fn metadata(mut self, field_id: &str, name: &str, value: Value) -> Self {
        self.item
            .metadata
            .insert(field_id.to_string(), MetadataValue::new(name, value));
        self
    }

    pub fn author(self, author: &str) -> Self {
        self.metadata(AUTHOR_FIELD, "Author", Value::String(author.to_string()))
    }

    pub fn build(self) -> Item {
        self.item
    }
}
