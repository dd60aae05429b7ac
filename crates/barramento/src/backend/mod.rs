//! The preservation system packages are handed to.

pub mod archivematica;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub use archivematica::ArchivematicaClient;

/// Transfer, ingest and storage operations of the preservation backend.
///
/// Every call is a blocking request with a bounded timeout. Transport and
/// non-2xx failures come back as `ClientError`; callers treat them as
/// retryable.
pub trait PreservationBackend: Send + Sync {
    fn start_transfer(
        &self,
        package_path: &Path,
        transfer_type: &str,
        accession: &str,
    ) -> Result<TransferReceipt, ClientError>;

    fn get_transfer_status(&self, uuid: &str) -> Result<StageStatus, ClientError>;

    fn get_ingest_status(&self, uuid: &str) -> Result<StageStatus, ClientError>;

    fn get_aip_info(&self, uuid: &str) -> Result<AipInfo, ClientError>;

    fn test_connection(&self) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub uuid: String,
}

/// Status of a transfer or an ingest as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    #[serde(default)]
    pub status: String,
    /// Set on a completed transfer: the SIP the ingest will run under.
    #[serde(default)]
    pub sip_uuid: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StageStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AipInfo {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}
