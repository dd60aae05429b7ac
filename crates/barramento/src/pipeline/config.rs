use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::schema::{CleanupPolicy, FixedMetadata, MetadataMapping};
use crate::config::Config;
use crate::hash::HashAlgorithm;
use crate::secrets::expand_home;

/// Runtime settings injected into every pipeline component.
#[derive(Debug, Clone)]
pub struct PreservationConfig {
    pub default_hash_algorithm: HashAlgorithm,
    pub max_package_size_mb: u64,
    pub retry_attempts: u32,
    pub enabled_collections: BTreeSet<u64>,
    pub metadata_mapping: Vec<MetadataMapping>,
    pub required_metadata: Vec<String>,
    pub fixed_metadata: Vec<FixedMetadata>,
    pub scheduled_batch_limit: usize,
    pub document_required: bool,
    pub package_root: PathBuf,
    pub cleanup_policy: CleanupPolicy,
    pub identifier_prefix: String,
    pub originating_system: String,
    pub transfer_type: String,
    pub poll_limit: usize,
    pub stale_processing_after: Duration,
    pub worker_count: usize,
    pub debug_mode: bool,
}

impl PreservationConfig {
    pub fn from_config(config: &Config) -> Self {
        let p = &config.preservation;

        let mut seen = BTreeSet::new();
        let required_metadata = p
            .required_metadata
            .iter()
            .filter(|field| seen.insert(field.as_str()))
            .cloned()
            .collect();

        Self {
            default_hash_algorithm: p.hash_algorithm,
            max_package_size_mb: p.max_package_size_mb,
            retry_attempts: p.retry_attempts,
            enabled_collections: p.enabled_collections.iter().copied().collect(),
            metadata_mapping: p.metadata_mapping.clone(),
            required_metadata,
            fixed_metadata: p.fixed_metadata.clone(),
            scheduled_batch_limit: config.schedule.batch_limit,
            document_required: p.document_required,
            package_root: p
                .package_root
                .as_deref()
                .map(|root| PathBuf::from(expand_home(root)))
                .unwrap_or_else(default_package_root),
            cleanup_policy: p.cleanup_policy,
            identifier_prefix: p.identifier_prefix.clone(),
            originating_system: p.originating_system.clone(),
            transfer_type: p.transfer_type.clone(),
            poll_limit: config.schedule.poll_limit,
            stale_processing_after: Duration::from_secs(
                config.schedule.stale_processing_after_secs,
            ),
            // 0 means one worker per CPU
            worker_count: match config.schedule.worker_count {
                0 => num_cpus::get().max(1),
                n => n,
            },
            debug_mode: config.logging.debug_mode,
        }
    }
}

/// `~/.barramento/packages`, or the system temp dir when there is no home.
pub fn default_package_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".barramento").join("packages"))
        .unwrap_or_else(|| std::env::temp_dir().join("barramento-packages"))
}
