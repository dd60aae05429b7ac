//! Result payloads returned to the CLI and other callers.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::object_repo::ObjectRow;

use super::error::PipelineWarning;
use super::state::PreservationStatus;

/// Outcome of `process_item`.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub item_id: u64,
    pub collection_id: u64,
    pub sip_id: String,
    pub transfer_uuid: String,
    pub status: PreservationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueReport {
    pub collection_id: u64,
    pub total_items: usize,
    pub added_to_queue: usize,
    pub skipped: usize,
    pub batch_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailStatus {
    Success,
    Failed,
}

/// Per-entry line of a queue pass.
#[derive(Debug, Clone, Serialize)]
pub struct QueueDetail {
    pub item_id: u64,
    pub collection_id: u64,
    pub status: DetailStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sip_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueReport {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub details: Vec<QueueDetail>,
}

impl QueueReport {
    pub fn push(&mut self, detail: QueueDetail) {
        self.processed += 1;
        match detail.status {
            DetailStatus::Success => self.successful += 1,
            DetailStatus::Failed => self.failed += 1,
        }
        self.details.push(detail);
    }
}

/// What one poll did to one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Advanced {
        from: PreservationStatus,
        to: PreservationStatus,
    },
    /// Still in progress; the object was re-stamped.
    Waiting,
    /// Nothing was written.
    Unchanged { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PollDetail {
    pub object_id: i64,
    pub item_id: u64,
    #[serde(flatten)]
    pub outcome: PollOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PollReport {
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub details: Vec<PollDetail>,
}

impl PollReport {
    pub fn record(&mut self, object: &ObjectRow, outcome: PollOutcome) {
        self.checked += 1;
        match outcome {
            PollOutcome::Advanced { .. } => self.updated += 1,
            PollOutcome::Waiting | PollOutcome::Unchanged { .. } => self.unchanged += 1,
        }
        self.details.push(PollDetail {
            object_id: object.id,
            item_id: object.item_id,
            outcome,
        });
    }

    pub fn record_failure(&mut self, object: &ObjectRow, message: String) {
        self.checked += 1;
        self.failed += 1;
        self.details.push(PollDetail {
            object_id: object.id,
            item_id: object.item_id,
            outcome: PollOutcome::Unchanged { reason: message },
        });
    }
}

/// Current state of one object.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub object_id: i64,
    pub item_id: u64,
    pub collection_id: u64,
    pub status: String,
    pub transfer_status: Option<String>,
    pub ingest_status: Option<String>,
    pub sip_id: Option<String>,
    pub aip_id: Option<String>,
    pub dip_id: Option<String>,
    pub archivematica_url: Option<String>,
    pub message: Option<String>,
    pub last_update: Option<String>,
}

impl From<ObjectRow> for StatusReport {
    fn from(row: ObjectRow) -> Self {
        Self {
            object_id: row.id,
            item_id: row.item_id,
            collection_id: row.collection_id,
            status: row.preservation_status,
            transfer_status: row.transfer_status,
            ingest_status: row.ingest_status,
            sip_id: row.sip_id,
            aip_id: row.aip_id,
            dip_id: row.dip_id,
            archivematica_url: row.archivematica_url,
            message: row.status_message,
            last_update: row.last_status_update,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HashCheck {
    pub hash_id: i64,
    pub file_path: String,
    pub is_package: bool,
    pub algorithm: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub object_id: i64,
    pub item_id: u64,
    pub verified_at: String,
    pub valid: usize,
    pub invalid: usize,
    pub missing: usize,
    pub records: Vec<HashCheck>,
}

impl IntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.invalid == 0 && self.missing == 0 && self.valid > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// `completed`, or `no_collections` when nothing is enabled.
    pub status: &'static str,
    pub recovered: usize,
    pub collections: Vec<EnqueueReport>,
    pub queue: QueueReport,
    pub transfers: PollReport,
    pub ingests: PollReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<u64>,
    pub total_objects: u64,
    pub objects: BTreeMap<String, u64>,
    pub queue: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self { ok: true, error: None },
            Err(e) => Self {
                ok: false,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub repository: ConnectionStatus,
    pub backend: ConnectionStatus,
}
